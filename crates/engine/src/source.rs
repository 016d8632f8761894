//! Where roster snapshots, choices and the manifest come from.

use crate::config::Config;
use protocol::{Choices, Manifest, ProtocolError, RosterSnapshot};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// Errors from fetching external inputs. All of them are transient from the
/// engine's point of view.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Payload(#[from] ProtocolError),
}

/// Supplies the inputs of a presence cycle.
pub trait PresenceSource: Send + Sync {
    /// Current chat roster.
    fn roster(&self) -> impl Future<Output = Result<RosterSnapshot, SourceError>> + Send;

    /// Externally chosen variants (only asked for in bot mode).
    fn choices(&self) -> impl Future<Output = Result<Choices, SourceError>> + Send;
}

/// Fetches everything over HTTP (or from local files for relative
/// locations).
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    roster_url: String,
    choices_url: String,
}

impl HttpSource {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(config)?,
            roster_url: config.roster.snapshot_url(),
            choices_url: config.choices.choices_url.clone(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn roster_url(&self) -> &str {
        &self.roster_url
    }
}

impl PresenceSource for HttpSource {
    async fn roster(&self) -> Result<RosterSnapshot, SourceError> {
        let text = load_text(&self.client, &self.roster_url, false).await?;
        Ok(RosterSnapshot::from_json(&text)?)
    }

    async fn choices(&self) -> Result<Choices, SourceError> {
        let text = load_text(&self.client, &self.choices_url, true).await?;
        Ok(Choices::from_json(&text)?)
    }
}

/// HTTP client honoring the configured request timeout.
pub fn build_client(config: &Config) -> Result<reqwest::Client, SourceError> {
    let mut builder = reqwest::Client::builder();
    if config.roster.request_timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(config.roster.request_timeout_secs));
    }
    Ok(builder.build()?)
}

/// Load the asset manifest.
pub async fn load_manifest(client: &reqwest::Client, location: &str) -> Result<Manifest, SourceError> {
    let text = load_text(client, location, true).await?;
    Ok(Manifest::from_json(&text)?)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Read `location`, either a URL or a local path. Remote requests can carry
/// a cache-busting `_` parameter.
pub async fn load_text(
    client: &reqwest::Client,
    location: &str,
    bust_cache: bool,
) -> Result<String, SourceError> {
    if !is_remote(location) {
        debug!("Reading {}", location);
        return tokio::fs::read_to_string(location)
            .await
            .map_err(|source| SourceError::Io {
                path: location.to_string(),
                source,
            });
    }

    debug!("Fetching {}", location);
    let mut request = client.get(location);
    if bust_cache {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        request = request.query(&[("_", millis.to_string())]);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: location.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}
