//! Job poller
//!
//! One tick per kind: sweep stale claims, then take up to `batch_size`
//! pending slots and process them one at a time. Every slot is claimed
//! (`pending → processing`) before its external call, and every claimed slot
//! gets a terminal write. A failure on one slot never stops the batch.

use libris_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cache_resolver::{CacheDecision, CacheResolver};
use super::clock::Clock;
use super::enrichers::EnricherSet;
use super::reaper::StaleClaimReaper;
use super::result_writer::{CacheWrite, ResultWriter, WriteOutcome};
use super::EnrichError;
use crate::config::PipelineSettings;
use crate::db::{enrichments, items};
use crate::models::{EnrichmentKind, EnrichmentStatus};

/// Counts from one tick of one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reaped: usize,
    pub claimed: usize,
    pub completed: usize,
    pub cache_hits: usize,
    pub failed: usize,
    /// Lost the claim race, or the item vanished / the slot moved on
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotOutcome {
    Completed { from_cache: bool },
    Failed,
    Skipped,
}

pub struct EnrichmentPoller {
    db: SqlitePool,
    settings: PipelineSettings,
    clock: Arc<dyn Clock>,
    enrichers: EnricherSet,
    cache: CacheResolver,
    writer: Arc<ResultWriter>,
    reaper: StaleClaimReaper,
}

impl EnrichmentPoller {
    pub fn new(
        db: SqlitePool,
        settings: PipelineSettings,
        clock: Arc<dyn Clock>,
        enrichers: EnricherSet,
        writer: Arc<ResultWriter>,
    ) -> Self {
        let cache = CacheResolver::new(db.clone(), clock.clone());
        let reaper = StaleClaimReaper::new(db.clone(), writer.clone(), clock.clone(), settings.clone());
        Self {
            db,
            settings,
            clock,
            enrichers,
            cache,
            writer,
            reaper,
        }
    }

    /// Run one tick per kind until `cancel` fires
    ///
    /// Kinds tick independently; a slow batch of one kind never delays another.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            batch_size = self.settings.batch_size,
            "Enrichment poller started"
        );

        let mut tasks = JoinSet::new();
        for kind in EnrichmentKind::ALL {
            let poller = self.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let mut interval = tokio::time::interval(poller.settings.poll_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            if let Err(e) = poller.run_tick(kind).await {
                                error!(%kind, error = %e, "Enrichment tick failed");
                            }
                        }
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}
        info!("Enrichment poller stopped");
    }

    /// Reaper sweep followed by one batch of `kind`
    pub async fn run_tick(&self, kind: EnrichmentKind) -> Result<TickReport> {
        let mut report = TickReport::default();

        match self.reaper.sweep(kind).await {
            Ok(n) => report.reaped = n,
            Err(e) => warn!(%kind, error = %e, "Reaper sweep failed"),
        }

        let batch = enrichments::list_pending(&self.db, kind, self.settings.batch_size).await?;
        if batch.is_empty() {
            return Ok(report);
        }

        debug!(%kind, size = batch.len(), "Processing enrichment batch");

        for item_id in batch {
            match self.process_slot(kind, item_id).await {
                Ok(SlotOutcome::Completed { from_cache }) => {
                    report.claimed += 1;
                    report.completed += 1;
                    if from_cache {
                        report.cache_hits += 1;
                    }
                }
                Ok(SlotOutcome::Failed) => {
                    report.claimed += 1;
                    report.failed += 1;
                }
                Ok(SlotOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(item_id = %item_id, %kind, error = %e, "Enrichment slot errored");
                    report.failed += 1;
                }
            }
        }

        info!(
            %kind,
            completed = report.completed,
            cache_hits = report.cache_hits,
            failed = report.failed,
            skipped = report.skipped,
            "Enrichment batch finished"
        );
        Ok(report)
    }

    async fn process_slot(&self, kind: EnrichmentKind, item_id: Uuid) -> Result<SlotOutcome> {
        if !enrichments::claim(&self.db, item_id, kind, self.clock.now()).await? {
            debug!(item_id = %item_id, %kind, "Claim lost to another pass");
            return Ok(SlotOutcome::Skipped);
        }

        match self.resolve_claimed(kind, item_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // Never leave a claimed slot in processing
                let note = crate::services::response_parser::truncate_diagnostic(
                    &format!("internal error: {}", e),
                    crate::services::response_parser::DIAGNOSTIC_MAX_CHARS,
                );
                self.writer.fail(item_id, kind, &note).await?;
                Err(e)
            }
        }
    }

    async fn resolve_claimed(&self, kind: EnrichmentKind, item_id: Uuid) -> Result<SlotOutcome> {
        let Some(item) = items::load_item(&self.db, item_id).await? else {
            return Ok(SlotOutcome::Skipped);
        };
        self.writer.notify(&item, kind, EnrichmentStatus::Processing, None);

        if !kind.applies_to(item.media_type) {
            let err = EnrichError::NotApplicable(item.media_type.to_string());
            return self.record_failure(item_id, kind, &err).await;
        }

        let force_refresh = enrichments::load_slot(&self.db, item_id, kind)
            .await?
            .map(|s| s.force_refresh)
            .unwrap_or(false);

        let entry = match self.cache.resolve(kind, &item, force_refresh).await? {
            CacheDecision::Hit { key, payload } => {
                let outcome = self.writer.complete(item_id, kind, &payload, CacheWrite::Link(&key)).await?;
                return Ok(Self::completion(outcome, true));
            }
            CacheDecision::Miss(entry) => Some(entry),
            CacheDecision::NotCacheable => None,
        };

        let Some(enricher) = self.enrichers.get(&kind) else {
            return self.record_failure(item_id, kind, &EnrichError::Unsupported).await;
        };

        let timeout = self.settings.call_timeout(kind);
        let attempt = match tokio::time::timeout(timeout, enricher.enrich(&item)).await {
            Ok(result) => result,
            Err(_) => Err(EnrichError::TimedOut(timeout)),
        };

        match attempt {
            Ok(payload) => {
                let cache = match &entry {
                    Some(entry) => CacheWrite::Publish(entry),
                    None => CacheWrite::Skip,
                };
                match self.writer.complete(item_id, kind, &payload, cache).await {
                    Ok(outcome) => Ok(Self::completion(outcome, false)),
                    Err(e) => {
                        warn!(item_id = %item_id, %kind, error = %e, "Result write failed");
                        self.writer.fail(item_id, kind, "result write failed").await?;
                        Ok(SlotOutcome::Failed)
                    }
                }
            }
            Err(err) => {
                if let Some(entry) = &entry {
                    if let Err(e) = self.cache.record_failure(kind, entry).await {
                        warn!(key = %entry.key, error = %e, "Could not mark cache row failed");
                    }
                }
                self.record_failure(item_id, kind, &err).await
            }
        }
    }

    async fn record_failure(&self, item_id: Uuid, kind: EnrichmentKind, err: &EnrichError) -> Result<SlotOutcome> {
        warn!(item_id = %item_id, %kind, error = %err, "Enrichment call failed");
        Ok(match self.writer.fail(item_id, kind, &err.diagnostic()).await? {
            WriteOutcome::Written => SlotOutcome::Failed,
            WriteOutcome::NotFound | WriteOutcome::Superseded(_) => SlotOutcome::Skipped,
        })
    }

    fn completion(outcome: WriteOutcome, from_cache: bool) -> SlotOutcome {
        match outcome {
            WriteOutcome::Written => SlotOutcome::Completed { from_cache },
            WriteOutcome::NotFound | WriteOutcome::Superseded(_) => SlotOutcome::Skipped,
        }
    }
}
