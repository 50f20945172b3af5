//! Credit-gated AI actions
//!
//! Flow for every action: check the balance (reject before any provider
//! call), call the provider, and deduct only when a result is delivered.
//! An off-topic request is answered without charge.

pub mod recommend;
pub mod soundtrack;

pub use recommend::{Recommendation, RecommendRequest};
pub use soundtrack::{SoundtrackRequest, SoundtrackResult};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::ledger::{CreditLedger, LedgerError};
use crate::services::{MusicSearch, ProviderError, TextGenerator};

/// Upper bound on the provider calls of one action
pub const ACTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Response of a paid action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome<T> {
    Delivered { result: T, balance: i64 },
    /// The model judged the request out of scope; nothing was charged
    OffTopic { message: String, balance: i64 },
}

pub struct PaidActions {
    ledger: Arc<CreditLedger>,
    text: Arc<dyn TextGenerator>,
    music: Arc<dyn MusicSearch>,
    cost: i64,
}

impl PaidActions {
    pub fn new(
        ledger: Arc<CreditLedger>,
        text: Arc<dyn TextGenerator>,
        music: Arc<dyn MusicSearch>,
        cost: i64,
    ) -> Self {
        Self {
            ledger,
            text,
            music,
            cost,
        }
    }

    pub fn cost(&self) -> i64 {
        self.cost
    }
}

/// Run a provider future under `ACTION_TIMEOUT`
async fn bounded<T>(fut: impl std::future::Future<Output = Result<T, ProviderError>>) -> Result<T, ProviderError> {
    tokio::time::timeout(ACTION_TIMEOUT, fut)
        .await
        .map_err(|_| ProviderError::Timeout)?
}
