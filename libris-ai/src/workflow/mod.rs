//! Asynchronous enrichment pipeline
//!
//! Timer-driven: each tick, per kind, the reaper fails abandoned claims and
//! the poller claims a bounded batch of pending slots, resolves them through
//! the global cache or an external caller, and hands the outcome to the
//! result writer. Failed slots are never retried automatically.

pub mod cache_resolver;
pub mod clock;
pub mod enrichers;
pub mod poller;
pub mod reaper;
pub mod result_writer;

pub use cache_resolver::{natural_key, CacheDecision, CacheEntry, CacheResolver};
pub use clock::{Clock, ManualClock, SystemClock};
pub use enrichers::{default_enrichers, Enricher, EnricherSet, Providers};
pub use poller::{EnrichmentPoller, TickReport};
pub use reaper::StaleClaimReaper;
pub use result_writer::{CacheWrite, ResultWriter, WriteOutcome};

use std::time::Duration;
use thiserror::Error;

use crate::services::response_parser::{truncate_diagnostic, DIAGNOSTIC_MAX_CHARS};
use crate::services::ProviderError;

/// Note recorded by the reaper on abandoned claims
pub const STALE_NOTE: &str = "timeout";

/// Failure of one enrichment attempt
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("empty result")]
    EmptyResult,

    #[error("blob store error: {0}")]
    Blob(String),

    #[error("not applicable to {0}")]
    NotApplicable(String),

    #[error("no enricher registered")]
    Unsupported,
}

impl EnrichError {
    /// Short note persisted on the failed slot
    pub fn diagnostic(&self) -> String {
        truncate_diagnostic(&self.to_string(), DIAGNOSTIC_MAX_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_is_bounded() {
        let err = EnrichError::Provider(ProviderError::Api(500, "x".repeat(300)));
        let note = err.diagnostic();
        assert!(note.starts_with("API error 500"));
        assert!(note.chars().count() <= DIAGNOSTIC_MAX_CHARS);
    }

    #[test]
    fn test_timeout_diagnostic() {
        assert_eq!(EnrichError::TimedOut(Duration::from_secs(15)).diagnostic(), "timed out after 15s");
    }
}
