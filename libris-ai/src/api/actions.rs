//! Paid action endpoints

use axum::{extract::State, routing::post, Json, Router};

use crate::actions::{ActionOutcome, Recommendation, RecommendRequest, SoundtrackRequest, SoundtrackResult};
use crate::{ApiResult, AppState};

/// POST /api/actions/recommend
///
/// **Errors:**
/// - 402 Payment Required: balance below the action cost (no provider call)
/// - 502 Bad Gateway: provider failure or unusable answer (nothing charged)
pub async fn recommend(
    State(state): State<AppState>,
    Json(req): Json<RecommendRequest>,
) -> ApiResult<Json<ActionOutcome<Vec<Recommendation>>>> {
    Ok(Json(state.actions.recommend(&req).await?))
}

/// POST /api/actions/soundtrack
pub async fn soundtrack(
    State(state): State<AppState>,
    Json(req): Json<SoundtrackRequest>,
) -> ApiResult<Json<ActionOutcome<SoundtrackResult>>> {
    Ok(Json(state.actions.soundtrack(&req).await?))
}

pub fn action_routes() -> Router<AppState> {
    Router::new()
        .route("/api/actions/recommend", post(recommend))
        .route("/api/actions/soundtrack", post(soundtrack))
}
