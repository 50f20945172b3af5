//! Enrichment status state machine
//!
//! Every enrichment kind shares one lifecycle:
//!
//! ```text
//! none ──▶ pending ──▶ processing ──▶ completed
//!             ▲             │
//!             │             ▼
//!             └──────── failed
//! ```
//!
//! `failed → pending` and `completed → pending` only happen on an explicit
//! user trigger; nothing in the pipeline retries on its own. The only
//! automatic correction is the reaper's `processing → failed`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of one enrichment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    /// Not requested (no slot row)
    None,
    /// Queued for the next poller pass
    Pending,
    /// Claimed by a poller pass; external call in flight
    Processing,
    /// Result persisted
    Completed,
    /// External call or parse failed, or the claim went stale
    Failed,
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid enrichment transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: EnrichmentStatus,
    pub to: EnrichmentStatus,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::None => "none",
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::Processing => "processing",
            EnrichmentStatus::Completed => "completed",
            EnrichmentStatus::Failed => "failed",
        }
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(&self, next: EnrichmentStatus) -> bool {
        use EnrichmentStatus::*;
        matches!(
            (self, next),
            (None, Pending)
                | (Failed, Pending)
                | (Completed, Pending)
                | (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition_to(&self, next: EnrichmentStatus) -> Result<EnrichmentStatus, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: *self, to: next })
        }
    }
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrichmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(EnrichmentStatus::None),
            "pending" => Ok(EnrichmentStatus::Pending),
            "processing" => Ok(EnrichmentStatus::Processing),
            "completed" => Ok(EnrichmentStatus::Completed),
            "failed" => Ok(EnrichmentStatus::Failed),
            other => Err(format!("unknown enrichment status '{}'", other)),
        }
    }
}
