//! Music catalogue search (iTunes Search API)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::ProviderError;
use crate::models::Track;

const ITUNES_BASE_URL: &str = "https://itunes.apple.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait MusicSearch: Send + Sync {
    /// Tracks matching a free-text term, best match first
    async fn search_tracks(&self, term: &str, limit: usize) -> Result<Vec<Track>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    track_name: Option<String>,
    artist_name: Option<String>,
    preview_url: Option<String>,
    track_view_url: Option<String>,
}

pub struct ItunesClient {
    http: reqwest::Client,
    base_url: String,
}

impl ItunesClient {
    pub fn new() -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: ITUNES_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MusicSearch for ItunesClient {
    async fn search_tracks(&self, term: &str, limit: usize) -> Result<Vec<Track>, ProviderError> {
        debug!(term, limit, "iTunes track search");

        let limit = limit.to_string();
        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("term", term),
                ("media", "music"),
                ("entity", "song"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), &body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| {
                Some(Track {
                    title: r.track_name?,
                    artist: r.artist_name?,
                    preview_url: r.preview_url,
                    store_url: r.track_view_url,
                })
            })
            .collect())
    }
}
