//! Remote tab catalog client
//!
//! One best-effort GET against a Songsterr-style JSON endpoint. No
//! retry, no pagination, no caching; the caller decides what to do
//! with an empty result list.

use serde::Deserialize;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Default tab catalog endpoint
pub const DEFAULT_CATALOG_URL: &str = "https://www.songsterr.com/a/ra/songs.json";

/// Errors from the lookup client
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The query could not be turned into a request
    #[error("invalid lookup request: {0}")]
    InvalidRequest(String),
    /// Transport-level failure (DNS, TLS, connection, non-2xx status)
    #[error("catalog request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The catalog answered with a body we cannot decode
    #[error("malformed catalog response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One candidate tab from the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct TabResult {
    /// Catalog-side song id
    pub id: i64,
    /// Song title
    pub title: String,
    /// Performing artist
    pub artist: TabArtist,
    /// Instruments the catalog has tabs for
    #[serde(rename = "tabTypes", default)]
    pub tab_types: Vec<String>,
}

/// Artist object nested in a catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct TabArtist {
    pub name: String,
}

/// Client for the remote tab catalog
pub struct TabLookupClient {
    catalog_url: String,
}

impl TabLookupClient {
    /// Client against the default public catalog
    pub fn new() -> Self {
        Self::with_catalog_url(DEFAULT_CATALOG_URL)
    }

    /// Client against a specific catalog endpoint
    pub fn with_catalog_url(catalog_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
        }
    }

    /// Look up candidate tabs for a song (blocking).
    ///
    /// Blocks the calling thread on a single async request; run it
    /// from a background thread when a UI thread is involved.
    pub fn lookup(&self, song: &str, artist: &str) -> Result<Vec<TabResult>, LookupError> {
        let url = self.request_url(song, artist)?;
        let rt = Runtime::new()
            .map_err(|e| LookupError::InvalidRequest(format!("async runtime: {}", e)))?;
        rt.block_on(self.fetch(&url))
    }

    /// Build the percent-encoded request URL
    fn request_url(&self, song: &str, artist: &str) -> Result<String, LookupError> {
        let query = format!("{} {}", artist.trim(), song.trim());
        if query.trim().is_empty() {
            return Err(LookupError::InvalidRequest(
                "song and artist are both empty".to_string(),
            ));
        }
        let pattern = urlencoding::encode(&query).into_owned();
        Ok(format!("{}?pattern={}", self.catalog_url, pattern))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<TabResult>, LookupError> {
        debug!("Querying tab catalog: {}", url);
        let response = reqwest::get(url).await?.error_for_status()?;
        let body = response.text().await?;
        let tabs = parse_response(&body)?;
        info!("Catalog returned {} candidate tabs", tabs.len());
        Ok(tabs)
    }
}

impl Default for TabLookupClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a catalog response body
fn parse_response(body: &str) -> Result<Vec<TabResult>, LookupError> {
    Ok(serde_json::from_str(body)?)
}
