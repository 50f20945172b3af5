//! Image generation client (OpenAI-compatible images endpoint)

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::ProviderError;
use crate::config::SharedApiKey;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Decoded image bytes with a file extension
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

pub struct OpenAiImageClient {
    http: reqwest::Client,
    api_key: SharedApiKey,
    base_url: String,
    model: String,
}

impl OpenAiImageClient {
    pub fn new(api_key: SharedApiKey) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        let api_key = self
            .api_key
            .get()
            .await
            .ok_or_else(|| ProviderError::NotConfigured("AI API key".to_string()))?;

        let request = ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: "1024x1024",
            response_format: "b64_json",
        };

        debug!(model = %self.model, "Image generation request");

        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), &body));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let encoded = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| ProviderError::Parse("no image payload in response".to_string()))?;

        decode_image_payload(&encoded)
    }
}

/// Decode a base64 image, either plain or as a `data:` URL
pub fn decode_image_payload(payload: &str) -> Result<GeneratedImage, ProviderError> {
    let trimmed = payload.trim();

    let (declared_ext, encoded) = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| ProviderError::Parse("malformed data URL".to_string()))?;
            (extension_for_mime(meta.split(';').next().unwrap_or("")), data)
        }
        None => (None, trimmed),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProviderError::Parse(format!("invalid base64 image: {}", e)))?;

    if bytes.is_empty() {
        return Err(ProviderError::Parse("empty image payload".to_string()));
    }

    let extension = declared_ext.unwrap_or_else(|| sniff_extension(&bytes));
    Ok(GeneratedImage { bytes, extension })
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "png"
    }
}
