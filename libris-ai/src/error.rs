//! Error types for libris-ai HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::actions::ActionError;
use crate::ledger::LedgerError;
use crate::services::ProviderError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Paid action rejected for lack of credits (402)
    #[error("Insufficient credits: balance {balance}, cost {cost}")]
    InsufficientCredits { balance: i64, cost: i64 },

    /// Upstream provider failed or answered nonsense (502)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// libris-common error
    #[error("Common error: {0}")]
    Common(#[from] libris_common::Error),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { balance, cost } => {
                ApiError::InsufficientCredits { balance, cost }
            }
            LedgerError::InvalidAmount(amount) => {
                ApiError::BadRequest(format!("invalid credit amount {}", amount))
            }
            LedgerError::Database(e) => ApiError::Common(e),
        }
    }
}

impl From<ActionError> for ApiError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Ledger(e) => e.into(),
            ActionError::Provider(e) => ApiError::Provider(e),
            ActionError::InvalidRequest(msg) => ApiError::BadRequest(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, extra) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::InsufficientCredits { balance, cost } => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_CREDITS",
                "Not enough credits for this action. Top up to continue.".to_string(),
                Some(json!({ "balance": balance, "cost": cost })),
            ),
            ApiError::Provider(ProviderError::NotConfigured(what)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                format!("{} is not configured", what),
                None,
            ),
            ApiError::Provider(ref err) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                crate::services::response_parser::truncate_diagnostic(
                    &err.to_string(),
                    crate::services::response_parser::DIAGNOSTIC_MAX_CHARS,
                ),
                None,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
                None,
            ),
            ApiError::Common(libris_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None)
            }
            ApiError::Common(libris_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
                None,
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let (Some(obj), Some(serde_json::Value::Object(fields))) = (error.as_object_mut(), extra) {
            obj.extend(fields);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
