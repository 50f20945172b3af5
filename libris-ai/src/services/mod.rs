//! External provider clients
//!
//! Each provider sits behind a trait so the workflow can run against
//! in-process fakes in tests.

pub mod blob_store;
pub mod catalog_client;
pub mod image_client;
pub mod llm_client;
pub mod music_client;
pub mod prompts;
pub mod response_parser;

pub use blob_store::{BlobStore, FsBlobStore};
pub use catalog_client::{CatalogClient, CatalogHit};
pub use image_client::{GeneratedImage, ImageGenerator, OpenAiImageClient};
pub use llm_client::{OpenAiTextClient, TextGenerator, TextPrompt};
pub use music_client::{ItunesClient, MusicSearch};

use thiserror::Error;

use response_parser::truncate_diagnostic;

/// Longest provider body kept inside an error
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Build an `Api` error from a non-success response body
    pub fn api(status: u16, body: &str) -> Self {
        ProviderError::Api(status, truncate_diagnostic(body, MAX_ERROR_BODY_CHARS))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}
