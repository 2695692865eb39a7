//! SessionCore — single-owner event loop for all mutable session state.
//!
//! Everything that wants to touch the connection or the snapshot sends a
//! `SessionEvent` into this loop.  SessionCore owns the `SnapshotStore`
//! writer side, the `PlayerClient` handle, and the poll scheduler task
//! exclusively; fetches run in spawned tasks and report back as events, so
//! every snapshot write happens on this loop.
//!
//! After each event that changes visible state, SessionCore broadcasts a
//! `SessionUpdate` to all listeners via a `tokio::sync::broadcast` channel.
//!
//! Each connection attempt gets a fresh `generation` number.  Completions
//! stamped with an older generation are dropped on arrival, so responses
//! from a torn-down connection can never write into a newer session.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::PlayerClient;
use crate::protocol::PlayerCommand;
use crate::snapshot::{LinkState, SnapshotStore};

// ── SessionEvent ──────────────────────────────────────────────────────────────

/// Which poll quantity a fetch completion carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Duration,
    Position,
    IsPlaying,
}

/// All inputs into the SessionCore loop.
#[derive(Debug)]
pub enum SessionEvent {
    /// Connect to a host: probe it, and start polling on success.
    Connect { host: String },
    /// Tear the session down and return to the disconnected state.
    Disconnect,
    /// Host went to the background: stop future poll ticks.
    Suspend,
    /// Host came back to the foreground: restart polling if connected.
    Resume,
    /// Fire-and-forget playback command.
    Command(PlayerCommand),
    /// Absolute seek in seconds.
    SeekTo(f64),
    /// Probe completed (spawned task).
    ProbeDone {
        generation: u64,
        host: String,
        ok: bool,
    },
    /// Poll scheduler tick.
    Tick { generation: u64 },
    /// A poll fetch completed (spawned task).
    FieldFetched {
        generation: u64,
        field: Field,
        raw: String,
    },
    /// A poll fetch failed.  Logged and otherwise ignored.
    FieldFailed {
        generation: u64,
        field: Field,
        error: String,
    },
    /// Cover-art bytes arrived for an epoch.
    ArtFetched {
        generation: u64,
        epoch: u64,
        bytes: Vec<u8>,
    },
    /// Cover-art fetch failed for an epoch.
    ArtFailed { generation: u64, epoch: u64 },
    /// Shutdown requested.
    Shutdown,
}

// ── SessionUpdate ─────────────────────────────────────────────────────────────

/// Broadcast from SessionCore to listeners (the TUI).
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The snapshot changed; receivers should fetch from the store.
    StateUpdated,
    /// The link state changed.
    LinkChanged(LinkState),
    /// The probe failed.  Carries the attempted host so the UI can put it
    /// back into the address field for a retry.
    ProbeFailed { host: String },
    /// Fresh cover-art bytes for the given epoch.
    ArtUpdated { epoch: u64, bytes: Arc<Vec<u8>> },
}

// ── SessionCore ───────────────────────────────────────────────────────────────

pub struct SessionCore {
    config: Config,
    store: Arc<SnapshotStore>,
    client: Option<Arc<PlayerClient>>,
    link: LinkState,
    /// Bumped on every connect/disconnect; stamps all spawned completions.
    generation: u64,
    /// Cancellation token of the live poll scheduler.  `None` when idle.
    poll_cancel: Option<CancellationToken>,
    /// True while the host signalled background; gates scheduler start.
    suspended: bool,
    /// Channel to feed spawned-task completions back into our own loop.
    event_tx: mpsc::Sender<SessionEvent>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl SessionCore {
    pub fn new(
        config: Config,
        update_tx: broadcast::Sender<SessionUpdate>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let store = Arc::new(SnapshotStore::new(config.session.state_file.clone()));
        Self {
            config,
            store,
            client: None,
            link: LinkState::Disconnected,
            generation: 0,
            poll_cancel: None,
            suspended: false,
            event_tx,
            update_tx,
        }
    }

    /// Borrow the snapshot store (for reads by the UI).
    pub fn store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Run the session event loop.  Returns when a `Shutdown` event is
    /// received or the event channel is closed.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<SessionEvent>) -> anyhow::Result<()> {
        info!("SessionCore: starting event loop");

        loop {
            let evt = event_rx.recv().await;
            match evt {
                None => {
                    info!("SessionCore: event channel closed, shutting down");
                    break;
                }
                Some(SessionEvent::Shutdown) => {
                    info!("SessionCore: shutdown requested");
                    break;
                }
                Some(evt) => self.handle_event(evt).await,
            }
        }

        self.stop_poller();
        Ok(())
    }

    async fn handle_event(&mut self, evt: SessionEvent) {
        match evt {
            SessionEvent::Connect { host } => self.connect(host).await,
            SessionEvent::Disconnect => self.disconnect().await,
            SessionEvent::Suspend => self.suspend(),
            SessionEvent::Resume => self.resume(),
            SessionEvent::Command(cmd) => self.dispatch_command(cmd),
            SessionEvent::SeekTo(secs) => self.dispatch_seek(secs),
            SessionEvent::ProbeDone {
                generation,
                host,
                ok,
            } => self.probe_done(generation, host, ok).await,
            SessionEvent::Tick { generation } => self.tick(generation),
            SessionEvent::FieldFetched {
                generation,
                field,
                raw,
            } => self.field_fetched(generation, field, raw).await,
            SessionEvent::FieldFailed {
                generation,
                field,
                error,
            } => {
                if generation == self.generation {
                    debug!("poll fetch {:?} failed: {}", field, error);
                }
            }
            SessionEvent::ArtFetched {
                generation,
                epoch,
                bytes,
            } => self.art_fetched(generation, epoch, bytes).await,
            SessionEvent::ArtFailed { generation, epoch } => {
                self.art_failed(generation, epoch).await
            }
            // Handled in run() before dispatch.
            SessionEvent::Shutdown => {}
        }
    }

    // ── connect / disconnect ──────────────────────────────────────────────────

    async fn connect(&mut self, host: String) {
        let host = host.trim().to_string();
        if host.is_empty() {
            warn!("SessionCore: ignoring connect to blank host");
            return;
        }

        // A new attempt invalidates everything in flight.
        self.stop_poller();
        self.generation += 1;
        self.set_link(LinkState::Probing);

        let client = match PlayerClient::new(&host, &self.config.server) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                warn!("SessionCore: failed to build client for {}: {}", host, e);
                self.set_link(LinkState::Disconnected);
                let _ = self.update_tx.send(SessionUpdate::ProbeFailed { host });
                return;
            }
        };
        self.client = Some(Arc::clone(&client));

        info!("SessionCore: probing {}", host);
        let generation = self.generation;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let ok = match client.probe().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("probe {} failed: {}", client.host(), e);
                    false
                }
            };
            let _ = tx
                .send(SessionEvent::ProbeDone {
                    generation,
                    host,
                    ok,
                })
                .await;
        });
    }

    async fn probe_done(&mut self, generation: u64, host: String, ok: bool) {
        if generation != self.generation {
            debug!("SessionCore: dropping stale probe result for {}", host);
            return;
        }

        if ok {
            info!("SessionCore: {} reachable, connected", host);
            self.set_link(LinkState::Connected);
            if let Err(e) = self.store.set_last_host(&host).await {
                warn!("failed to persist last host: {}", e);
            }
            if !self.suspended {
                self.start_poller();
            }
        } else {
            info!("SessionCore: {} unreachable", host);
            self.client = None;
            self.set_link(LinkState::Disconnected);
            let _ = self.update_tx.send(SessionUpdate::ProbeFailed { host });
        }
    }

    async fn disconnect(&mut self) {
        if self.link == LinkState::Disconnected {
            return;
        }
        info!("SessionCore: disconnecting");
        self.stop_poller();
        self.generation += 1;
        self.client = None;
        self.store.reset().await;
        let _ = self.update_tx.send(SessionUpdate::StateUpdated);
        self.set_link(LinkState::Disconnected);
    }

    // ── suspend / resume ──────────────────────────────────────────────────────

    fn suspend(&mut self) {
        if self.suspended {
            return;
        }
        debug!("SessionCore: suspended, stopping poll scheduler");
        self.suspended = true;
        // Future ticks stop; in-flight fetches are allowed to land.
        self.stop_poller();
    }

    fn resume(&mut self) {
        if !self.suspended {
            return;
        }
        debug!("SessionCore: resumed");
        self.suspended = false;
        if self.link == LinkState::Connected {
            self.start_poller();
        }
    }

    // ── poll scheduler ────────────────────────────────────────────────────────

    /// Start the interval scheduler, cancelling any prior instance first so
    /// at most one loop is ever ticking.
    fn start_poller(&mut self) {
        self.stop_poller();

        let cancel = CancellationToken::new();
        self.poll_cancel = Some(cancel.clone());

        let generation = self.generation;
        let interval = std::time::Duration::from_millis(self.config.polling.interval_ms);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            // First tick fires immediately: the user sees data without
            // waiting out one interval.
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(SessionEvent::Tick { generation }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn stop_poller(&mut self) {
        if let Some(cancel) = self.poll_cancel.take() {
            cancel.cancel();
        }
    }

    /// One poll tick: fetch title, playing flag, and duration independently
    /// and concurrently.  Position is not fetched here — it is chased from
    /// the `is_playing` result, and only while the player reports playing.
    fn tick(&mut self, generation: u64) {
        if generation != self.generation || self.link != LinkState::Connected {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };

        self.spawn_fetch(Arc::clone(&client), generation, Field::Title);
        self.spawn_fetch(Arc::clone(&client), generation, Field::IsPlaying);
        self.spawn_fetch(client, generation, Field::Duration);
    }

    fn spawn_fetch(&self, client: Arc<PlayerClient>, generation: u64, field: Field) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = match field {
                Field::Title => client.title().await,
                Field::Duration => client.duration().await,
                Field::Position => client.position().await,
                Field::IsPlaying => client.is_playing().await,
            };
            let evt = match result {
                Ok(raw) => SessionEvent::FieldFetched {
                    generation,
                    field,
                    raw,
                },
                Err(e) => SessionEvent::FieldFailed {
                    generation,
                    field,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(evt).await;
        });
    }

    // ── reconciler ────────────────────────────────────────────────────────────

    async fn field_fetched(&mut self, generation: u64, field: Field, raw: String) {
        if generation != self.generation {
            debug!("SessionCore: dropping stale {:?} result", field);
            return;
        }

        match field {
            Field::Title => {
                let epoch_bumped = self.store.apply_title(raw).await;
                if epoch_bumped {
                    let state = self.store.get_state().await;
                    info!(
                        "track changed: {:?} (art epoch {})",
                        state.title, state.art_epoch
                    );
                    self.spawn_art_fetch(generation, state.art_epoch);
                }
            }
            Field::Duration => self.store.apply_duration(&raw).await,
            Field::Position => self.store.apply_position(&raw).await,
            Field::IsPlaying => {
                let playing = self.store.apply_is_playing(&raw).await;
                if playing {
                    if let Some(client) = self.client.clone() {
                        self.spawn_fetch(client, generation, Field::Position);
                    }
                }
            }
        }
        let _ = self.update_tx.send(SessionUpdate::StateUpdated);
    }

    // ── cover art ─────────────────────────────────────────────────────────────

    fn spawn_art_fetch(&self, generation: u64, epoch: u64) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let evt = match client.art(epoch).await {
                Ok(bytes) => SessionEvent::ArtFetched {
                    generation,
                    epoch,
                    bytes,
                },
                Err(e) => {
                    warn!("art fetch (epoch {}) failed: {}", epoch, e);
                    SessionEvent::ArtFailed { generation, epoch }
                }
            };
            let _ = tx.send(evt).await;
        });
    }

    async fn art_fetched(&mut self, generation: u64, epoch: u64, bytes: Vec<u8>) {
        if generation != self.generation {
            return;
        }
        // The track may have changed again while the image was in flight.
        if self.store.get_state().await.art_epoch != epoch {
            debug!("SessionCore: dropping art for superseded epoch {}", epoch);
            return;
        }
        let _ = self.update_tx.send(SessionUpdate::ArtUpdated {
            epoch,
            bytes: Arc::new(bytes),
        });
    }

    async fn art_failed(&mut self, generation: u64, epoch: u64) {
        if generation != self.generation {
            return;
        }
        if self.store.get_state().await.art_epoch != epoch {
            return;
        }
        self.store.mark_art_failed().await;
        let _ = self.update_tx.send(SessionUpdate::StateUpdated);
    }

    // ── commands ──────────────────────────────────────────────────────────────

    /// Fire-and-forget: the snapshot is never touched here.  The next poll
    /// tick observes whatever the command did.
    fn dispatch_command(&self, cmd: PlayerCommand) {
        let Some(client) = self.client.clone() else {
            debug!("SessionCore: dropping command {} while disconnected", cmd);
            return;
        };
        info!("SessionCore: command {}", cmd);
        tokio::spawn(async move {
            if let Err(e) = client.send(cmd).await {
                warn!("command {} failed: {}", cmd, e);
            }
        });
    }

    fn dispatch_seek(&self, secs: f64) {
        let Some(client) = self.client.clone() else {
            return;
        };
        info!("SessionCore: seek to {:.1}s", secs);
        tokio::spawn(async move {
            if let Err(e) = client.seek_to(secs).await {
                warn!("seek failed: {}", e);
            }
        });
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    fn set_link(&mut self, link: LinkState) {
        if self.link != link {
            info!("SessionCore: link {:?} → {:?}", self.link, link);
            self.link = link;
            let _ = self.update_tx.send(SessionUpdate::LinkChanged(link));
        }
    }
}
