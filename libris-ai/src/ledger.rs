//! Credit ledger
//!
//! Per-user integer balance guarding paid actions. `deduct` is a single
//! guarded UPDATE, so the stored balance never goes negative. The paid
//! action flow (check, call provider, deduct) is not atomic as a whole: two
//! concurrent actions by one user can both pass the check, in which case the
//! second deduct is rejected after its provider call already ran.

use libris_common::events::{EventBus, LibrisEvent};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::db::users;
use crate::utils::retry_on_lock;
use crate::workflow::Clock;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient credits: balance {balance}, cost {cost}")]
    InsufficientCredits { balance: i64, cost: i64 },

    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i64),

    #[error(transparent)]
    Database(#[from] libris_common::Error),
}

/// Mock purchase packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopUpPackage {
    Small,
    Medium,
    Large,
}

impl TopUpPackage {
    pub fn credits(&self) -> i64 {
        match self {
            TopUpPackage::Small => 10,
            TopUpPackage::Medium => 50,
            TopUpPackage::Large => 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BootstrapOutcome {
    pub balance: i64,
    /// False when the starter grant had already been applied (or was not due)
    pub granted: bool,
}

pub struct CreditLedger {
    db: SqlitePool,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    max_lock_wait_ms: u64,
}

impl CreditLedger {
    pub fn new(db: SqlitePool, event_bus: EventBus, clock: Arc<dyn Clock>, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            event_bus,
            clock,
            max_lock_wait_ms,
        }
    }

    /// Current balance; an unknown user or absent balance reads as 0
    pub async fn balance(&self, user_id: &str) -> Result<i64, LedgerError> {
        Ok(users::load_credits(&self.db, user_id)
            .await?
            .and_then(|u| u.credits)
            .unwrap_or(0))
    }

    /// Fail with `InsufficientCredits` when `balance < cost`; no state change
    pub async fn check_and_reserve(&self, user_id: &str, cost: i64) -> Result<i64, LedgerError> {
        if cost < 0 {
            return Err(LedgerError::InvalidAmount(cost));
        }
        let balance = self.balance(user_id).await?;
        if balance < cost {
            return Err(LedgerError::InsufficientCredits { balance, cost });
        }
        Ok(balance)
    }

    /// `balance -= cost` if covered; returns the new balance
    pub async fn deduct(&self, user_id: &str, cost: i64) -> Result<i64, LedgerError> {
        if cost < 0 {
            return Err(LedgerError::InvalidAmount(cost));
        }

        let updated = retry_on_lock("deduct credits", self.max_lock_wait_ms, || {
            users::deduct(&self.db, user_id, cost)
        })
        .await?;

        match updated {
            Some(balance) => {
                info!(user_id, cost, balance, "Credits deducted");
                self.emit(user_id, balance, -cost);
                Ok(balance)
            }
            None => Err(LedgerError::InsufficientCredits {
                balance: self.balance(user_id).await?,
                cost,
            }),
        }
    }

    /// `balance += amount`; returns the new balance
    pub async fn grant(&self, user_id: &str, amount: i64) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let now = self.clock.now();
        let balance = retry_on_lock("grant credits", self.max_lock_wait_ms, || {
            users::grant(&self.db, user_id, amount, now)
        })
        .await?;

        info!(user_id, amount, balance, "Credits granted");
        self.emit(user_id, balance, amount);
        Ok(balance)
    }

    pub async fn top_up(&self, user_id: &str, package: TopUpPackage) -> Result<i64, LedgerError> {
        self.grant(user_id, package.credits()).await
    }

    /// First-time grant of the starting balance, applied exactly once
    pub async fn bootstrap(&self, user_id: &str, starting: i64) -> Result<BootstrapOutcome, LedgerError> {
        if starting < 0 {
            return Err(LedgerError::InvalidAmount(starting));
        }

        let now = self.clock.now();
        let granted = retry_on_lock("starter grant", self.max_lock_wait_ms, || {
            users::grant_starter(&self.db, user_id, starting, now)
        })
        .await?;

        match granted {
            Some(balance) => {
                info!(user_id, balance, "Starter credits granted");
                self.emit(user_id, balance, starting);
                Ok(BootstrapOutcome { balance, granted: true })
            }
            None => Ok(BootstrapOutcome {
                balance: self.balance(user_id).await?,
                granted: false,
            }),
        }
    }

    fn emit(&self, user_id: &str, balance: i64, delta: i64) {
        self.event_bus.emit_lossy(LibrisEvent::CreditsChanged {
            user_id: user_id.to_string(),
            balance,
            delta,
            timestamp: self.clock.now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::workflow::SystemClock;

    async fn ledger() -> CreditLedger {
        CreditLedger::new(test_pool().await, EventBus::new(16), Arc::new(SystemClock), 1000)
    }

    #[test]
    fn test_package_sizes() {
        assert_eq!(TopUpPackage::Small.credits(), 10);
        assert_eq!(TopUpPackage::Medium.credits(), 50);
        assert_eq!(TopUpPackage::Large.credits(), 120);
    }

    #[tokio::test]
    async fn test_unknown_user_has_zero_balance() {
        let ledger = ledger().await;
        assert_eq!(ledger.balance("nobody").await.unwrap(), 0);
        assert!(matches!(
            ledger.check_and_reserve("nobody", 1).await,
            Err(LedgerError::InsufficientCredits { balance: 0, cost: 1 })
        ));
    }

    #[tokio::test]
    async fn test_rejects_invalid_amounts() {
        let ledger = ledger().await;
        assert!(matches!(ledger.grant("u", 0).await, Err(LedgerError::InvalidAmount(0))));
        assert!(matches!(ledger.deduct("u", -1).await, Err(LedgerError::InvalidAmount(-1))));
    }

    #[tokio::test]
    async fn test_deduct_emits_credit_event() {
        let ledger = ledger().await;
        let mut rx = ledger.event_bus.subscribe();

        ledger.grant("u", 3).await.unwrap();
        ledger.deduct("u", 1).await.unwrap();

        let granted = rx.recv().await.unwrap();
        let deducted = rx.recv().await.unwrap();
        assert!(matches!(granted, LibrisEvent::CreditsChanged { balance: 3, delta: 3, .. }));
        assert!(matches!(deducted, LibrisEvent::CreditsChanged { balance: 2, delta: -1, .. }));
    }
}
