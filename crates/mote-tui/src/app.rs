//! App — component-based event loop.
//!
//! Architecture:
//! - `App` owns all components and `AppState` (shared read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws each frame, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Session events flow out through a separate `cmd_tx` channel.
//!
//! Terminal focus drives the session's suspend/resume: an unfocused terminal
//! is this client's equivalent of a backgrounded app, so future poll ticks
//! stop until focus returns.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use mote_client::session::{SessionEvent, SessionUpdate};
use mote_client::snapshot::{LinkState, PlaybackSnapshot, SnapshotStore};

use crate::{
    action::Action,
    app_state::{AppState, CoverArt},
    component::Component,
    components::{connect::ConnectScreen, help_overlay::HelpOverlay, player::PlayerScreen},
    widgets::{
        status_bar,
        toast::{Severity, ToastManager},
    },
};

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Snapshot(PlaybackSnapshot),
    Link(LinkState),
    ProbeFailed(String),
    Art(CoverArt),
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    // ── Shared state (passed read-only to components) ─────────────────────────
    state: AppState,

    // ── Components ────────────────────────────────────────────────────────────
    connect: ConnectScreen,
    player: PlayerScreen,
    help_overlay: HelpOverlay,

    // ── Session bookkeeping ───────────────────────────────────────────────────
    cmd_tx: mpsc::Sender<SessionEvent>,
    store: Arc<SnapshotStore>,

    /// Whether to quit on next iteration.
    should_quit: bool,

    /// Toast notification manager.
    toast: ToastManager,
}

impl App {
    pub async fn new(cmd_tx: mpsc::Sender<SessionEvent>, store: Arc<SnapshotStore>) -> Self {
        let last_host = store.last_host().await;

        let state = AppState {
            snapshot: PlaybackSnapshot::default(),
            link: LinkState::Disconnected,
            host: None,
            art: None,
            suspended: false,
        };

        Self {
            state,
            connect: ConnectScreen::new(last_host),
            player: PlayerScreen::new(),
            help_overlay: HelpOverlay::new(),
            cmd_tx,
            store,
            should_quit: false,
            toast: ToastManager::new(),
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut update_rx: broadcast::Receiver<SessionUpdate>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: session updates (SessionCore → AppMessage) ───────
        let up_tx = tx.clone();
        let up_store = self.store.clone();
        tokio::spawn(async move {
            loop {
                match update_rx.recv().await {
                    Ok(update) => {
                        let msg = match update {
                            SessionUpdate::StateUpdated => {
                                let snapshot = up_store.get_state().await;
                                AppMessage::Snapshot(snapshot)
                            }
                            SessionUpdate::LinkChanged(link) => AppMessage::Link(link),
                            SessionUpdate::ProbeFailed { host } => AppMessage::ProbeFailed(host),
                            SessionUpdate::ArtUpdated { epoch, bytes } => {
                                AppMessage::Art(CoverArt { epoch, data: bytes })
                            }
                        };
                        if up_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("update receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // ── Periodic timers ───────────────────────────────────────────────────
        // Toast expiry check + spinner animation: 100ms for smooth braille animation
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                }
                _ = ui_tick.tick() => {
                    self.toast.tick();
                    needs_redraw = true;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        let _ = self.cmd_tx.send(SessionEvent::Shutdown).await;
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableFocusChange)?;
        terminal.show_cursor()?;
        Ok(())
    }

    // ── Message handling ──────────────────────────────────────────────────────

    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(ev) => self.handle_terminal_event(ev).await,
            AppMessage::Snapshot(snapshot) => {
                self.state.snapshot = snapshot;
                true
            }
            AppMessage::Link(link) => {
                self.state.link = link;
                match link {
                    LinkState::Connected => {
                        self.toast.resolve_spinner(
                            Severity::Success,
                            "connected",
                            Duration::from_secs(3),
                        );
                    }
                    LinkState::Disconnected => {
                        self.state.art = None;
                    }
                    LinkState::Probing => {}
                }
                true
            }
            AppMessage::ProbeFailed(host) => {
                info!("probe failed for {}", host);
                self.toast.resolve_spinner(
                    Severity::Error,
                    format!("connection failed: {}", host),
                    Duration::from_secs(5),
                );
                // Put the attempted host back so a retry is one keypress away.
                self.connect.restore_host(&host);
                self.state.host = None;
                true
            }
            AppMessage::Art(art) => {
                self.state.art = Some(art);
                true
            }
        }
    }

    async fn handle_terminal_event(&mut self, ev: Event) -> bool {
        match ev {
            Event::Key(key) => self.handle_key(key).await,
            Event::FocusLost => {
                debug!("terminal focus lost, suspending poll");
                self.state.suspended = true;
                let _ = self.cmd_tx.send(SessionEvent::Suspend).await;
                true
            }
            Event::FocusGained => {
                debug!("terminal focus gained, resuming poll");
                self.state.suspended = false;
                let _ = self.cmd_tx.send(SessionEvent::Resume).await;
                true
            }
            Event::Resize(_, _) => true,
            _ => false,
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }

        // Ctrl-C quits from anywhere.
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return true;
        }

        let actions = if self.help_overlay.visible {
            self.help_overlay.handle_key(key, &self.state)
        } else if self.state.connected() {
            self.player.handle_key(key, &self.state)
        } else {
            self.connect.handle_key(key, &self.state)
        };

        for action in actions {
            self.dispatch(action).await;
        }
        true
    }

    // ── Action dispatch ───────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        match action {
            Action::ConnectTo(host) => {
                self.state.host = Some(host.clone());
                self.toast.spinner(format!("probing {}…", host));
                let _ = self.cmd_tx.send(SessionEvent::Connect { host }).await;
            }
            Action::Disconnect => {
                if let Some(host) = self.state.host.take() {
                    self.connect.restore_host(&host);
                }
                self.state.art = None;
                self.toast.info("disconnected");
                let _ = self.cmd_tx.send(SessionEvent::Disconnect).await;
            }
            Action::Dispatch(cmd) => {
                let _ = self.cmd_tx.send(SessionEvent::Command(cmd)).await;
            }
            Action::SeekBy(delta) => {
                // Seek needs a known timeline on both ends.
                let snapshot = &self.state.snapshot;
                if let (Some(pos), Some(dur)) = (snapshot.position_secs, snapshot.duration_secs) {
                    let target = (pos + delta).clamp(0.0, dur);
                    let _ = self.cmd_tx.send(SessionEvent::SeekTo(target)).await;
                }
            }
            Action::ToggleHelp => {
                self.help_overlay.toggle();
            }
            Action::Quit => {
                self.should_quit = true;
            }
        }
    }

    // ── Draw ──────────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        if self.state.connected() {
            self.player.draw(frame, rows[0], &self.state);
        } else {
            self.connect.draw(frame, rows[0], &self.state);
        }

        status_bar::draw_separator(frame, rows[1]);
        status_bar::draw_keys_bar(frame, rows[2], self.state.link, self.state.suspended);

        self.help_overlay.draw(frame, rows[0], &self.state);
        self.toast.draw(frame, area);
    }
}
