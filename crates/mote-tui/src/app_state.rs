//! AppState — shared read-only data passed to all components during render/event.
//!
//! Components read this for session state, but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use std::sync::Arc;

use mote_client::snapshot::{LinkState, PlaybackSnapshot};

/// Cover-art bytes as delivered by the session, tagged with their epoch.
#[derive(Clone, Debug)]
pub struct CoverArt {
    pub epoch: u64,
    pub data: Arc<Vec<u8>>,
}

/// The full shared state of the application.
/// Components read this; only the App event-loop writes to it.
pub struct AppState {
    /// Latest reconciled snapshot from the session store.
    pub snapshot: PlaybackSnapshot,
    pub link: LinkState,
    /// Host of the current (or in-flight) connection attempt.
    pub host: Option<String>,
    /// Cover art for `snapshot.art_epoch`, once it has arrived.
    pub art: Option<CoverArt>,
    /// True while polling is suspended (terminal unfocused).
    pub suspended: bool,
}

impl AppState {
    pub fn connected(&self) -> bool {
        self.link == LinkState::Connected
    }
}
