mod action;
mod app;
mod app_state;
mod component;
mod components;
mod theme;
mod widgets;

use tokio::sync::{broadcast, mpsc};

use mote_client::session::{SessionCore, SessionEvent, SessionUpdate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = mote_client::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("tui.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("m0te log: {}", log_path.display());

    tracing::info!("m0te starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = mote_client::config::Config::load().unwrap_or_default();

    // ── Update channel (SessionCore → TUI) ───────────────────────────────────
    let (update_tx, update_rx) = broadcast::channel::<SessionUpdate>(1024);

    // ── SessionEvent channel (TUI → SessionCore) ─────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(1024);

    // ── Build SessionCore ────────────────────────────────────────────────────
    let session = SessionCore::new(config, update_tx, event_tx.clone());
    let store = session.store();

    // ── Spawn SessionCore event loop ─────────────────────────────────────────
    tokio::spawn(async move {
        if let Err(e) = session.run(event_rx).await {
            tracing::error!("SessionCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(event_tx, store).await;
    app.run(update_rx).await?;

    Ok(())
}
