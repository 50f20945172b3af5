//! Stale-claim reaper
//!
//! Fails slots left in `processing` longer than their kind's stale timeout
//! (worker crashed or hung before writing a terminal status). This is the
//! only automatic status correction in the pipeline.

use chrono::Duration as ChronoDuration;
use libris_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use super::clock::Clock;
use super::result_writer::ResultWriter;
use super::STALE_NOTE;
use crate::config::PipelineSettings;
use crate::db::enrichments;
use crate::models::{EnrichmentKind, EnrichmentStatus};

pub struct StaleClaimReaper {
    db: SqlitePool,
    writer: Arc<ResultWriter>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
}

impl StaleClaimReaper {
    pub fn new(db: SqlitePool, writer: Arc<ResultWriter>, clock: Arc<dyn Clock>, settings: PipelineSettings) -> Self {
        Self {
            db,
            writer,
            clock,
            settings,
        }
    }

    /// Fail every stale claim of `kind`; returns how many were failed
    ///
    /// Pages through candidates `batch_size` at a time until a short page.
    pub async fn sweep(&self, kind: EnrichmentKind) -> Result<usize> {
        let timeout = ChronoDuration::from_std(self.settings.stale_timeout(kind))
            .map_err(|e| Error::Internal(format!("stale timeout out of range: {}", e)))?;
        let cutoff = self.clock.now() - timeout;
        let page_size = self.settings.batch_size.max(1);

        let mut reaped = 0;
        loop {
            let page = enrichments::list_stale(&self.db, kind, cutoff, page_size).await?;

            for item_id in &page {
                // Re-checks the cutoff, so a slot re-claimed meanwhile is left alone
                if enrichments::fail_if_stale(&self.db, *item_id, kind, cutoff, STALE_NOTE, self.clock.now()).await? {
                    reaped += 1;
                    warn!(item_id = %item_id, %kind, "Failed stale enrichment claim");
                    self.writer
                        .notify_by_id(*item_id, kind, EnrichmentStatus::Failed, Some(STALE_NOTE.to_string()))
                        .await?;
                }
            }

            if page.len() < page_size as usize {
                break;
            }
        }

        if reaped > 0 {
            debug!(%kind, reaped, "Reaper sweep finished");
        }
        Ok(reaped)
    }
}
