//! Item and enrichment trigger endpoints
//!
//! The only write paths into the pipeline from outside: creating an item
//! (optionally queueing its default kinds) and requesting one kind. Neither
//! calls a provider; the poller picks the pending slots up on its next tick.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use libris_common::events::LibrisEvent;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::enrichments::{self, RequestOutcome};
use crate::db::items;
use crate::models::{EnrichmentKind, EnrichmentSlot, EnrichmentStatus, Item, NewItem};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub item: Item,
    pub enrichments: Vec<EnrichmentSlot>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    /// Rerun a completed slot
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// "queued", "already_queued" or "already_completed"
    pub outcome: &'static str,
    pub slot: EnrichmentSlot,
}

/// POST /api/items
pub async fn create_item(
    State(state): State<AppState>,
    Json(new): Json<NewItem>,
) -> ApiResult<(StatusCode, Json<ItemResponse>)> {
    if new.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    if new.owner_id.trim().is_empty() {
        return Err(ApiError::BadRequest("owner_id is required".to_string()));
    }

    let now = state.clock.now();
    let item = Item::new(&new, now);
    items::insert_item(&state.db, &item).await?;

    info!(item_id = %item.id, media = %item.media_type, "Item created");
    state.event_bus.emit_lossy(LibrisEvent::ItemCreated {
        item_id: item.id,
        owner_id: item.owner_id.clone(),
        timestamp: now,
    });

    if new.auto_enrich {
        for kind in EnrichmentKind::auto_kinds(item.media_type) {
            let outcome = enrichments::request_slot(
                &state.db,
                item.id,
                kind,
                false,
                state.settings.reanalyze_existing,
                now,
            )
            .await?;
            if matches!(outcome, RequestOutcome::Queued { .. }) {
                state.writer.notify(&item, kind, EnrichmentStatus::Pending, None);
            }
        }
    }

    let enrichments = enrichments::list_slots(&state.db, item.id).await?;
    Ok((StatusCode::CREATED, Json(ItemResponse { item, enrichments })))
}

/// GET /api/items/:id
pub async fn get_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ItemResponse>> {
    let item = load_item(&state, id).await?;
    let enrichments = enrichments::list_slots(&state.db, id).await?;
    Ok(Json(ItemResponse { item, enrichments }))
}

/// DELETE /api/items/:id
pub async fn delete_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if items::delete_item(&state.db, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("item {}", id)))
    }
}

/// GET /api/items/:id/enrichments/:kind
///
/// A slot that was never requested is reported with status `none`.
pub async fn get_enrichment(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, String)>,
) -> ApiResult<Json<EnrichmentSlot>> {
    let kind = parse_kind(&kind)?;
    load_item(&state, id).await?;

    let slot = enrichments::load_slot(&state.db, id, kind)
        .await?
        .unwrap_or_else(|| EnrichmentSlot::absent(id, kind));
    Ok(Json(slot))
}

/// POST /api/items/:id/enrichments/:kind
///
/// **Request:** `{"force": false}` (body optional)
pub async fn trigger_enrichment(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, String)>,
    body: Option<Json<TriggerRequest>>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let kind = parse_kind(&kind)?;
    let force = body.map(|Json(b)| b.force).unwrap_or(false);

    let item = load_item(&state, id).await?;
    if !kind.applies_to(item.media_type) {
        return Err(ApiError::BadRequest(format!(
            "{} does not apply to a {}",
            kind, item.media_type
        )));
    }

    let outcome = enrichments::request_slot(
        &state.db,
        id,
        kind,
        force,
        state.settings.reanalyze_existing,
        state.clock.now(),
    )
    .await?;

    let (code, label) = match outcome {
        RequestOutcome::Queued { from } => {
            info!(item_id = %id, kind = %kind, from = %from, "Enrichment queued");
            state.writer.notify(&item, kind, EnrichmentStatus::Pending, None);
            (StatusCode::ACCEPTED, "queued")
        }
        RequestOutcome::AlreadyQueued(_) => (StatusCode::OK, "already_queued"),
        RequestOutcome::AlreadyCompleted => (StatusCode::OK, "already_completed"),
    };

    let slot = enrichments::load_slot(&state.db, id, kind)
        .await?
        .unwrap_or_else(|| EnrichmentSlot::absent(id, kind));

    Ok((code, Json(TriggerResponse { outcome: label, slot })))
}

async fn load_item(state: &AppState, id: Uuid) -> ApiResult<Item> {
    items::load_item(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {}", id)))
}

fn parse_kind(raw: &str) -> ApiResult<EnrichmentKind> {
    raw.parse().map_err(ApiError::BadRequest)
}

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/api/items", post(create_item))
        .route("/api/items/:id", get(get_item).delete(delete_item))
        .route(
            "/api/items/:id/enrichments/:kind",
            get(get_enrichment).post(trigger_enrichment),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("relation_graph").unwrap(), EnrichmentKind::RelationGraph);
        assert!(matches!(parse_kind("horoscope"), Err(ApiError::BadRequest(_))));
    }
}
