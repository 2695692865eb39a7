//! End-to-end session tests against a mock player served over loopback.
//!
//! The mock implements the player's control API surface (plain-text bodies,
//! fixed endpoints) and records every request path it sees, so the tests can
//! assert not just the reconciled snapshot but also which fetches the
//! scheduler actually issued.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use tokio::sync::{broadcast, mpsc};

use mote_client::config::Config;
use mote_client::protocol::PlayerCommand;
use mote_client::session::{SessionCore, SessionEvent, SessionUpdate};
use mote_client::snapshot::{LinkState, SnapshotStore};

// ── mock player ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct PlayerFixture {
    title: String,
    duration: String,
    position: String,
    is_playing: String,
    art_ok: bool,
    hits: Vec<String>,
}

#[derive(Clone, Default)]
struct MockPlayer(Arc<Mutex<PlayerFixture>>);

impl MockPlayer {
    fn set(&self, f: impl FnOnce(&mut PlayerFixture)) {
        f(&mut self.0.lock().unwrap());
    }

    fn hits(&self) -> Vec<String> {
        self.0.lock().unwrap().hits.clone()
    }

    fn hit_count(&self, path: &str) -> usize {
        self.hits().iter().filter(|h| h.starts_with(path)).count()
    }
}

async fn serve_mock() -> (SocketAddr, MockPlayer) {
    let player = MockPlayer::default();
    player.set(|f| f.art_ok = true);

    let app = Router::new()
        .route("/ping", get(|State(p): State<MockPlayer>| async move {
            p.set(|f| f.hits.push("ping".into()));
            "pong"
        }))
        .route("/title", get(|State(p): State<MockPlayer>| async move {
            p.set(|f| f.hits.push("title".into()));
            p.0.lock().unwrap().title.clone()
        }))
        .route("/duration", get(|State(p): State<MockPlayer>| async move {
            p.set(|f| f.hits.push("duration".into()));
            p.0.lock().unwrap().duration.clone()
        }))
        .route("/position", get(|State(p): State<MockPlayer>| async move {
            p.set(|f| f.hits.push("position".into()));
            p.0.lock().unwrap().position.clone()
        }))
        .route("/is_playing", get(|State(p): State<MockPlayer>| async move {
            p.set(|f| f.hits.push("is_playing".into()));
            p.0.lock().unwrap().is_playing.clone()
        }))
        .route(
            "/art",
            get(|State(p): State<MockPlayer>, RawQuery(q): RawQuery| async move {
                let ok = {
                    let mut f = p.0.lock().unwrap();
                    f.hits.push(format!("art?{}", q.unwrap_or_default()));
                    f.art_ok
                };
                if ok {
                    (StatusCode::OK, vec![0x89u8, b'P', b'N', b'G']).into_response()
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }),
        )
        .route("/play", get(command_hit))
        .route("/pause", get(command_hit))
        .route("/play_pause", get(command_hit))
        .route("/play_next", get(command_hit))
        .route("/play_prev", get(command_hit))
        .route(
            "/position/:secs",
            put(|State(p): State<MockPlayer>, Path(secs): Path<String>| async move {
                p.set(|f| f.hits.push(format!("position/{}", secs)));
                StatusCode::OK
            }),
        )
        .with_state(player.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock player");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, player)
}

async fn command_hit(
    State(p): State<MockPlayer>,
    uri: axum::http::Uri,
) -> StatusCode {
    p.set(|f| f.hits.push(uri.path().trim_start_matches('/').to_string()));
    StatusCode::OK
}

// ── harness ───────────────────────────────────────────────────────────────────

struct Harness {
    player: MockPlayer,
    store: Arc<SnapshotStore>,
    event_tx: mpsc::Sender<SessionEvent>,
    update_rx: broadcast::Receiver<SessionUpdate>,
    host: String,
    _tmp: tempfile::TempDir,
}

async fn start_session(port: u16, player: MockPlayer) -> Harness {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.server.port = port;
    config.server.probe_timeout_secs = 2;
    config.server.request_timeout_secs = 2;
    config.polling.interval_ms = 40;
    config.session.state_file = tmp.path().join("session.json");

    let (update_tx, update_rx) = broadcast::channel::<SessionUpdate>(1024);
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(1024);

    let core = SessionCore::new(config, update_tx, event_tx.clone());
    let store = core.store();
    tokio::spawn(async move {
        let _ = core.run(event_rx).await;
    });

    Harness {
        player,
        store,
        event_tx,
        update_rx,
        host: "127.0.0.1".to_string(),
        _tmp: tmp,
    }
}

impl Harness {
    async fn connect(&self) {
        self.event_tx
            .send(SessionEvent::Connect {
                host: self.host.clone(),
            })
            .await
            .expect("send connect");
    }

    /// Wait until an update matching `pred` arrives.
    async fn wait_update(&mut self, pred: impl Fn(&SessionUpdate) -> bool) -> SessionUpdate {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.update_rx.recv().await {
                    Ok(u) if pred(&u) => return u,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("update channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for update")
    }
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_polls_and_reconciles_snapshot() {
    let (addr, player) = serve_mock().await;
    player.set(|f| {
        f.title = "Song A".into();
        f.duration = "180".into();
        f.position = "42.5".into();
        f.is_playing = "true".into();
    });

    let mut h = start_session(addr.port(), player).await;
    h.connect().await;

    h.wait_update(|u| matches!(u, SessionUpdate::LinkChanged(LinkState::Connected)))
        .await;

    let store = h.store.clone();
    eventually("snapshot fully reconciled", || {
        let store = store.clone();
        async move {
            let s = store.get_state().await;
            s.title == "Song A"
                && s.duration_secs == Some(180.0)
                && s.is_playing
                && s.position_secs == Some(42.5)
                && s.art_epoch == 1
        }
    })
    .await;

    // Position was chased from the playing flag within the tick.
    assert!(h.player.hit_count("position") > 0);
}

#[tokio::test]
async fn paused_player_never_fetches_position() {
    let (addr, player) = serve_mock().await;
    player.set(|f| {
        f.title = "Song A".into();
        f.duration = "180".into();
        f.position = "42".into();
        f.is_playing = "false".into();
    });

    let mut h = start_session(addr.port(), player.clone()).await;
    h.connect().await;
    h.wait_update(|u| matches!(u, SessionUpdate::LinkChanged(LinkState::Connected)))
        .await;

    // Let several full ticks land.
    let p = player.clone();
    eventually("several is_playing fetches", || {
        let p = p.clone();
        async move { p.hit_count("is_playing") >= 4 }
    })
    .await;

    assert_eq!(player.hit_count("position"), 0);
}

#[tokio::test]
async fn probe_failure_reports_host_and_disconnects() {
    // Reserve a port with no listener behind it.
    let dead = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = dead.local_addr().unwrap().port();
    drop(dead);

    let mut h = start_session(port, MockPlayer::default()).await;
    h.connect().await;

    h.wait_update(|u| matches!(u, SessionUpdate::LinkChanged(LinkState::Probing)))
        .await;
    let update = h
        .wait_update(|u| matches!(u, SessionUpdate::ProbeFailed { .. }))
        .await;
    match update {
        SessionUpdate::ProbeFailed { host } => assert_eq!(host, "127.0.0.1"),
        _ => unreachable!(),
    }
    h.wait_update(|u| matches!(u, SessionUpdate::LinkChanged(LinkState::Disconnected)))
        .await;
}

#[tokio::test]
async fn title_change_busts_art_cache_and_failure_sets_fallback() {
    let (addr, player) = serve_mock().await;
    player.set(|f| {
        f.title = "Song A".into();
        f.duration = "180".into();
        f.is_playing = "false".into();
    });

    let mut h = start_session(addr.port(), player.clone()).await;
    h.connect().await;

    // First title fetch bumps the epoch from 0 to 1 and loads art.
    let update = h
        .wait_update(|u| matches!(u, SessionUpdate::ArtUpdated { .. }))
        .await;
    match update {
        SessionUpdate::ArtUpdated { epoch, bytes } => {
            assert_eq!(epoch, 1);
            assert!(!bytes.is_empty());
        }
        _ => unreachable!(),
    }
    assert!(h.player.hits().iter().any(|hit| hit == "art?hash=1"));

    // Track change with a broken art endpoint: epoch bumps, fallback sets.
    player.set(|f| {
        f.title = "Song B".into();
        f.art_ok = false;
    });
    let store = h.store.clone();
    eventually("fallback art after failed fetch", || {
        let store = store.clone();
        async move {
            let s = store.get_state().await;
            s.art_epoch == 2 && s.use_fallback_art
        }
    })
    .await;
    assert!(h.player.hits().iter().any(|hit| hit == "art?hash=2"));

    // Next track change clears the fallback flag again.
    player.set(|f| {
        f.title = "Song C".into();
        f.art_ok = true;
    });
    let store = h.store.clone();
    eventually("fallback cleared by title change", || {
        let store = store.clone();
        async move {
            let s = store.get_state().await;
            s.art_epoch == 3 && !s.use_fallback_art
        }
    })
    .await;
}

#[tokio::test]
async fn commands_are_fire_and_forget() {
    let (addr, player) = serve_mock().await;
    player.set(|f| {
        f.title = "Song A".into();
        f.is_playing = "false".into();
    });

    let mut h = start_session(addr.port(), player.clone()).await;
    h.connect().await;
    h.wait_update(|u| matches!(u, SessionUpdate::LinkChanged(LinkState::Connected)))
        .await;

    h.event_tx
        .send(SessionEvent::Command(PlayerCommand::PlayPause))
        .await
        .unwrap();
    h.event_tx
        .send(SessionEvent::Command(PlayerCommand::PlayNext))
        .await
        .unwrap();
    h.event_tx.send(SessionEvent::SeekTo(30.0)).await.unwrap();

    let p = player.clone();
    eventually("command endpoints hit", || {
        let p = p.clone();
        async move {
            p.hit_count("play_pause") > 0
                && p.hit_count("play_next") > 0
                && p.hit_count("position/30") > 0
        }
    })
    .await;
}

#[tokio::test]
async fn suspend_stops_polling_and_resume_restarts_it() {
    let (addr, player) = serve_mock().await;
    player.set(|f| {
        f.title = "Song A".into();
        f.duration = "180".into();
        f.is_playing = "false".into();
    });

    let mut h = start_session(addr.port(), player.clone()).await;
    h.connect().await;
    h.wait_update(|u| matches!(u, SessionUpdate::LinkChanged(LinkState::Connected)))
        .await;

    let p = player.clone();
    eventually("polling active", || {
        let p = p.clone();
        async move { p.hit_count("title") >= 2 }
    })
    .await;

    h.event_tx.send(SessionEvent::Suspend).await.unwrap();
    // Let in-flight fetches land, then confirm the tick rate is zero.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let settled = player.hit_count("title");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(player.hit_count("title"), settled);

    h.event_tx.send(SessionEvent::Resume).await.unwrap();
    let p = player.clone();
    eventually("polling resumed", || {
        let p = p.clone();
        async move { p.hit_count("title") > settled }
    })
    .await;
}

#[tokio::test]
async fn non_numeric_duration_reads_as_unknown() {
    let (addr, player) = serve_mock().await;
    player.set(|f| {
        f.title = "Song A".into();
        f.duration = "abc".into();
        f.is_playing = "false".into();
    });

    let mut h = start_session(addr.port(), player).await;
    h.connect().await;
    h.wait_update(|u| matches!(u, SessionUpdate::LinkChanged(LinkState::Connected)))
        .await;

    let store = h.store.clone();
    eventually("title applied", || {
        let store = store.clone();
        async move { store.get_state().await.title == "Song A" }
    })
    .await;
    assert_eq!(h.store.get_state().await.duration_secs, None);
}
