use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::protocol;

/// Connection state of the session.  Drives whether the poll scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Probing,
    Connected,
}

/// The reconciled now-playing view.  `rev` is a monotonically increasing
/// counter incremented on every write; the UI uses it to detect changes.
///
/// `art_epoch` increments exactly once per title change (including the first
/// fetch after connecting, when the stored title is still empty) and never
/// otherwise.  It keys the cover-art URL, so bumping it invalidates any
/// URL-keyed image cache without an explicit cache-clear call.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSnapshot {
    pub rev: u64,
    pub title: String,
    pub duration_secs: Option<f64>,
    pub position_secs: Option<f64>,
    pub is_playing: bool,
    pub art_epoch: u64,
    pub use_fallback_art: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistentState {
    pub last_host: Option<String>,
}

/// Single source of truth for the now-playing view.
///
/// Only the session event loop writes here; everything else holds a clone of
/// the `Arc` and reads.  Last-connected-host persistence rides along in the
/// same store so the connect screen can pre-fill the address field.
pub struct SnapshotStore {
    state: Arc<RwLock<PlaybackSnapshot>>,
    persistent: RwLock<PersistentState>,
    state_file: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_file: PathBuf) -> Self {
        let persistent = Self::load_persistent(&state_file);
        Self {
            state: Arc::new(RwLock::new(PlaybackSnapshot::default())),
            persistent: RwLock::new(persistent),
            state_file,
        }
    }

    pub async fn get_state(&self) -> PlaybackSnapshot {
        self.state.read().await.clone()
    }

    /// Apply a `/title` response.  The incoming value is compared against the
    /// stored one *before* the overwrite: a differing title bumps the art
    /// epoch and clears the fallback flag, then the title itself is stored.
    /// Returns true when the epoch was bumped.
    pub async fn apply_title(&self, title: String) -> bool {
        let mut state = self.state.write().await;
        let changed = state.title != title;
        if changed {
            state.art_epoch += 1;
            state.use_fallback_art = false;
        }
        state.title = title;
        state.rev += 1;
        changed
    }

    /// Apply a `/duration` response.  Non-numeric bodies store as unknown.
    pub async fn apply_duration(&self, raw: &str) {
        let mut state = self.state.write().await;
        state.duration_secs = protocol::parse_seconds(raw);
        state.rev += 1;
    }

    /// Apply a `/position` response.  Non-numeric bodies store as unknown.
    pub async fn apply_position(&self, raw: &str) {
        let mut state = self.state.write().await;
        state.position_secs = protocol::parse_seconds(raw);
        state.rev += 1;
    }

    /// Apply an `/is_playing` response.  Returns the new playing flag so the
    /// session can decide whether to chase it with a position fetch.
    pub async fn apply_is_playing(&self, raw: &str) -> bool {
        let playing = protocol::parse_flag(raw);
        let mut state = self.state.write().await;
        state.is_playing = playing;
        state.rev += 1;
        playing
    }

    /// An art fetch for the current epoch failed; show the placeholder until
    /// the next title change clears it.
    pub async fn mark_art_failed(&self) {
        let mut state = self.state.write().await;
        state.use_fallback_art = true;
        state.rev += 1;
    }

    /// Clear playback fields on disconnect.  The art epoch survives so it
    /// stays monotonic across reconnects and never repeats a cache key.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        let art_epoch = state.art_epoch;
        let rev = state.rev;
        *state = PlaybackSnapshot {
            rev: rev + 1,
            art_epoch,
            ..PlaybackSnapshot::default()
        };
    }

    pub async fn last_host(&self) -> Option<String> {
        self.persistent.read().await.last_host.clone()
    }

    /// Remember the last successfully probed host.
    pub async fn set_last_host(&self, host: &str) -> anyhow::Result<()> {
        {
            let mut persistent = self.persistent.write().await;
            persistent.last_host = Some(host.to_string());
        }
        self.save().await
    }

    async fn save(&self) -> anyhow::Result<()> {
        let persistent = self.persistent.read().await.clone();

        if let Some(parent) = self.state_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&persistent)?;
        tokio::fs::write(&self.state_file, json).await?;
        Ok(())
    }

    fn load_persistent(state_file: &PathBuf) -> PersistentState {
        if let Ok(content) = std::fs::read_to_string(state_file) {
            if let Ok(persistent) = serde_json::from_str::<PersistentState>(&content) {
                return persistent;
            }
        }
        PersistentState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SnapshotStore {
        SnapshotStore::new(std::env::temp_dir().join("mote-snapshot-test.json"))
    }

    #[tokio::test]
    async fn test_first_title_bumps_epoch_from_zero() {
        let store = store();
        assert_eq!(store.get_state().await.art_epoch, 0);

        let bumped = store.apply_title("Song A".to_string()).await;
        assert!(bumped);
        let state = store.get_state().await;
        assert_eq!(state.art_epoch, 1);
        assert_eq!(state.title, "Song A");
    }

    #[tokio::test]
    async fn test_epoch_increments_once_per_change_never_on_repeat() {
        let store = store();
        store.apply_title("Song A".to_string()).await;
        store.apply_title("Song A".to_string()).await;
        store.apply_title("Song A".to_string()).await;
        assert_eq!(store.get_state().await.art_epoch, 1);

        store.apply_title("Song B".to_string()).await;
        assert_eq!(store.get_state().await.art_epoch, 2);

        store.apply_title("Song A".to_string()).await;
        assert_eq!(store.get_state().await.art_epoch, 3);
    }

    #[tokio::test]
    async fn test_title_change_clears_fallback_art() {
        let store = store();
        store.apply_title("Song A".to_string()).await;
        store.mark_art_failed().await;
        assert!(store.get_state().await.use_fallback_art);

        // Same title again: flag stays.
        store.apply_title("Song A".to_string()).await;
        assert!(store.get_state().await.use_fallback_art);

        // Differing title: flag clears, epoch bumps.
        store.apply_title("Song B".to_string()).await;
        let state = store.get_state().await;
        assert!(!state.use_fallback_art);
        assert_eq!(state.art_epoch, 2);
    }

    #[tokio::test]
    async fn test_non_numeric_duration_is_unknown() {
        let store = store();
        store.apply_duration("180").await;
        assert_eq!(store.get_state().await.duration_secs, Some(180.0));

        store.apply_duration("abc").await;
        assert_eq!(store.get_state().await.duration_secs, None);
    }

    #[tokio::test]
    async fn test_is_playing_parses_strictly() {
        let store = store();
        assert!(store.apply_is_playing("true").await);
        assert!(store.get_state().await.is_playing);

        assert!(!store.apply_is_playing("paused").await);
        assert!(!store.get_state().await.is_playing);
    }

    #[tokio::test]
    async fn test_reset_keeps_epoch_monotonic() {
        let store = store();
        store.apply_title("Song A".to_string()).await;
        store.apply_title("Song B".to_string()).await;
        store.apply_duration("200").await;
        store.reset().await;

        let state = store.get_state().await;
        assert_eq!(state.title, "");
        assert_eq!(state.duration_secs, None);
        assert!(!state.is_playing);
        assert_eq!(state.art_epoch, 2);

        // Reconnecting to the same track still yields a fresh cache key.
        store.apply_title("Song B".to_string()).await;
        assert_eq!(store.get_state().await.art_epoch, 3);
    }

    #[tokio::test]
    async fn test_rev_increases_on_writes() {
        let store = store();
        let r0 = store.get_state().await.rev;
        store.apply_position("12").await;
        let r1 = store.get_state().await.rev;
        assert!(r1 > r0);
    }
}
