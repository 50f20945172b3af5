//! Settings API endpoint
//!
//! Provides POST /api/settings/ai_api_key so a key can be configured at
//! runtime without restarting the service.

use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/settings/ai_api_key
///
/// **Request:** `{"api_key": "sk-..."}`
///
/// The key is written to the database (authoritative), mirrored to the TOML
/// file when one is in use, and takes effect for the next provider call.
///
/// **Errors:**
/// - 400 Bad Request: empty or whitespace-only key
/// - 500 Internal Server Error: database write failure
pub async fn set_ai_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if !crate::config::is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    crate::config::store_ai_api_key(
        &state.db,
        &state.api_key,
        payload.api_key,
        state.toml_path.as_deref(),
    )
    .await
    .map_err(|e| ApiError::Internal(format!("Failed to save API key: {}", e)))?;

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "AI API key saved".to_string(),
    }))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/ai_api_key", post(set_ai_api_key))
}
