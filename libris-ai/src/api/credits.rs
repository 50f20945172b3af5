//! Credit balance endpoints
//!
//! Top-ups are mock purchases: the package is granted without payment.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::ledger::TopUpPackage;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct BootstrapResponse {
    pub user_id: String,
    pub balance: i64,
    pub granted: bool,
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub package: TopUpPackage,
}

/// GET /api/users/:user_id/credits
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.ledger.balance(&user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

/// POST /api/users/:user_id/bootstrap
///
/// Called on first sign-in; grants the starter credits at most once.
pub async fn bootstrap(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<BootstrapResponse>> {
    let outcome = state
        .ledger
        .bootstrap(&user_id, state.settings.starter_credits)
        .await?;
    Ok(Json(BootstrapResponse {
        user_id,
        balance: outcome.balance,
        granted: outcome.granted,
    }))
}

/// POST /api/users/:user_id/credits/topup
///
/// **Request:** `{"package": "small" | "medium" | "large"}`
pub async fn top_up(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<TopUpRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.ledger.top_up(&user_id, req.package).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

pub fn credit_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/:user_id/credits", get(get_balance))
        .route("/api/users/:user_id/bootstrap", post(bootstrap))
        .route("/api/users/:user_id/credits/topup", post(top_up))
}
