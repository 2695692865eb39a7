//! Owned HTTP client for one player host.
//!
//! One `PlayerClient` is constructed per connection attempt and handed to the
//! session by reference-counted handle; there is no process-wide request
//! queue.  All calls are single attempts — the poll loop provides the retry
//! cadence, and commands are fire-and-forget by contract.

use std::time::Duration;

use crate::config::ServerConfig;
use crate::protocol::{self, PlayerCommand};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
}

pub struct PlayerClient {
    http: reqwest::Client,
    host: String,
    port: u16,
    probe_timeout: Duration,
}

impl PlayerClient {
    pub fn new(host: &str, server: &ServerConfig) -> Result<Self, ClientError> {
        let user_agent = format!("mote/{}", env!("CARGO_PKG_VERSION"));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.request_timeout_secs))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            http,
            host: host.to_string(),
            port: server.port,
            probe_timeout: Duration::from_secs(server.probe_timeout_secs),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// One-shot reachability check.  Any 2xx counts as reachable; the body is
    /// ignored.  No retry — the caller decides whether to ask again.
    pub async fn probe(&self) -> Result<(), ClientError> {
        let url = protocol::endpoint_url(&self.host, self.port, "ping");
        let resp = self
            .http
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await?;
        Self::check(resp.status())
    }

    pub async fn title(&self) -> Result<String, ClientError> {
        self.get_text("title").await
    }

    pub async fn duration(&self) -> Result<String, ClientError> {
        self.get_text("duration").await
    }

    pub async fn position(&self) -> Result<String, ClientError> {
        self.get_text("position").await
    }

    pub async fn is_playing(&self) -> Result<String, ClientError> {
        self.get_text("is_playing").await
    }

    pub async fn artist(&self) -> Result<String, ClientError> {
        self.get_text("artist").await
    }

    /// Fetch the cover-art bytes for the given art epoch.
    pub async fn art(&self, epoch: u64) -> Result<Vec<u8>, ClientError> {
        let url = protocol::art_url(&self.host, self.port, epoch);
        let resp = self.http.get(&url).send().await?;
        Self::check(resp.status())?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Issue a playback command.  The response body is ignored; the next poll
    /// tick observes the effect.
    pub async fn send(&self, cmd: PlayerCommand) -> Result<(), ClientError> {
        let url = protocol::endpoint_url(&self.host, self.port, cmd.endpoint());
        let resp = self.http.get(&url).send().await?;
        Self::check(resp.status())
    }

    /// Seek to an absolute position in seconds.
    pub async fn seek_to(&self, secs: f64) -> Result<(), ClientError> {
        let path = format!("position/{}", secs);
        let url = protocol::endpoint_url(&self.host, self.port, &path);
        let resp = self.http.put(&url).send().await?;
        Self::check(resp.status())
    }

    async fn get_text(&self, path: &str) -> Result<String, ClientError> {
        let url = protocol::endpoint_url(&self.host, self.port, path);
        let resp = self.http.get(&url).send().await?;
        Self::check(resp.status())?;
        Ok(resp.text().await?)
    }

    fn check(status: reqwest::StatusCode) -> Result<(), ClientError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Status(status))
        }
    }
}
