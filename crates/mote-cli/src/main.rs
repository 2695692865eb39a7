//! motectl — one-shot command-line control of a media player host.
//!
//! ```text
//! motectl 192.168.1.20 toggle
//! motectl 192.168.1.20 metadata
//! ```
//! Exit code 1 on any failed request, so shell scripts can branch on
//! reachability (`motectl <host> ping && …`).

use anyhow::Context;
use clap::{Parser, Subcommand};

use mote_client::config::Config;
use mote_client::http::PlayerClient;
use mote_client::protocol::{self, PlayerCommand};

#[derive(Parser)]
#[command(name = "motectl", about = "Remote-control a media player over its HTTP API")]
struct Cli {
    /// Player host (IP address or name).
    host: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Check that the player is reachable.
    Ping,
    /// Start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Toggle play/pause.
    Toggle,
    /// Skip to the next track.
    Next,
    /// Skip to the previous track.
    Prev,
    /// Print the playing flag.
    Status,
    /// Print the playback position in seconds.
    Position,
    /// Seek to an absolute position in seconds.
    Seek { secs: f64 },
    /// Print title, duration, and artist.
    Metadata,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();
    let client = PlayerClient::new(&cli.host, &config.server).context("failed to build client")?;

    match cli.command {
        Cmd::Ping => {
            client.probe().await.context("player unreachable")?;
            println!("ok");
        }
        Cmd::Play => client.send(PlayerCommand::Play).await?,
        Cmd::Pause => client.send(PlayerCommand::Pause).await?,
        Cmd::Toggle => client.send(PlayerCommand::PlayPause).await?,
        Cmd::Next => client.send(PlayerCommand::PlayNext).await?,
        Cmd::Prev => client.send(PlayerCommand::PlayPrev).await?,
        Cmd::Status => {
            let raw = client.is_playing().await?;
            println!("playing: {}", protocol::parse_flag(&raw));
        }
        Cmd::Position => {
            let raw = client.position().await?;
            match protocol::parse_seconds(&raw) {
                Some(secs) => println!("{}", secs),
                None => println!("unknown"),
            }
        }
        Cmd::Seek { secs } => client.seek_to(secs).await?,
        Cmd::Metadata => {
            println!("title: {}", client.title().await?);
            match protocol::parse_seconds(&client.duration().await?) {
                Some(secs) => println!("duration: {}", secs),
                None => println!("duration: unknown"),
            }
            println!("artist: {}", client.artist().await?);
        }
    }

    Ok(())
}
