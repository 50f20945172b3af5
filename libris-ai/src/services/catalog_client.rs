//! Book and movie catalogue search
//!
//! Books come from Open Library (no key). Movies come from TMDB, which needs
//! an API key; without one the movie search reports `NotConfigured`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::ProviderError;
use crate::models::MediaType;

const OPEN_LIBRARY_BASE_URL: &str = "https://openlibrary.org";
const OPEN_LIBRARY_COVERS_URL: &str = "https://covers.openlibrary.org/b/id";
const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_URL: &str = "https://image.tmdb.org/t/p/w342";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const SEARCH_LIMIT: usize = 10;

/// One catalogue search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogHit {
    pub media_type: MediaType,
    pub title: String,
    pub creator: String,
    pub external_id: String,
    pub year: Option<i32>,
    pub cover_url: Option<String>,
    pub overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenLibraryResponse {
    #[serde(default)]
    docs: Vec<OpenLibraryDoc>,
}

#[derive(Debug, Deserialize)]
struct OpenLibraryDoc {
    key: String,
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    first_publish_year: Option<i32>,
    cover_i: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TmdbResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: i64,
    title: String,
    release_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
}

pub struct CatalogClient {
    http: reqwest::Client,
    open_library_url: String,
    tmdb_url: String,
    tmdb_api_key: Option<String>,
}

impl CatalogClient {
    pub fn new(tmdb_api_key: Option<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("libris/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http,
            open_library_url: OPEN_LIBRARY_BASE_URL.to_string(),
            tmdb_url: TMDB_BASE_URL.to_string(),
            tmdb_api_key: tmdb_api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn with_open_library_url(mut self, url: &str) -> Self {
        self.open_library_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_tmdb_url(mut self, url: &str) -> Self {
        self.tmdb_url = url.trim_end_matches('/').to_string();
        self
    }

    pub async fn search(&self, query: &str, media: MediaType) -> Result<Vec<CatalogHit>, ProviderError> {
        match media {
            MediaType::Book => self.search_books(query).await,
            MediaType::Movie => self.search_movies(query).await,
        }
    }

    pub async fn search_books(&self, query: &str) -> Result<Vec<CatalogHit>, ProviderError> {
        debug!(query, "Open Library search");

        let limit = SEARCH_LIMIT.to_string();
        let response = self
            .http
            .get(format!("{}/search.json", self.open_library_url))
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), &body));
        }

        let parsed: OpenLibraryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parsed
            .docs
            .into_iter()
            .map(|doc| CatalogHit {
                media_type: MediaType::Book,
                title: doc.title,
                creator: doc.author_name.join(", "),
                external_id: doc.key,
                year: doc.first_publish_year,
                cover_url: doc.cover_i.map(|id| format!("{}/{}-M.jpg", OPEN_LIBRARY_COVERS_URL, id)),
                overview: None,
            })
            .collect())
    }

    pub async fn search_movies(&self, query: &str) -> Result<Vec<CatalogHit>, ProviderError> {
        let api_key = self
            .tmdb_api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("TMDB API key".to_string()))?;

        debug!(query, "TMDB movie search");

        let response = self
            .http
            .get(format!("{}/search/movie", self.tmdb_url))
            .query(&[("query", query), ("api_key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), &body));
        }

        let parsed: TmdbResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|movie| CatalogHit {
                media_type: MediaType::Movie,
                title: movie.title,
                creator: String::new(),
                external_id: movie.id.to_string(),
                year: movie
                    .release_date
                    .as_deref()
                    .and_then(|d| d.get(..4))
                    .and_then(|y| y.parse().ok()),
                cover_url: movie.poster_path.map(|p| format!("{}{}", TMDB_IMAGE_URL, p)),
                overview: movie.overview.filter(|o| !o.is_empty()),
            })
            .collect())
    }
}
