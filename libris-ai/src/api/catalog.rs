//! Catalogue search proxy
//!
//! Free action: no credits are checked or charged.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::models::MediaType;
use crate::services::CatalogHit;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_media")]
    pub media: MediaType,
}

fn default_media() -> MediaType {
    MediaType::Book
}

/// GET /api/catalog/search?q=dune&media=book
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<CatalogHit>>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query is required".to_string()));
    }

    Ok(Json(state.catalog.search(query, params.media).await?))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/api/catalog/search", get(search))
}
