//! Global cache resolver
//!
//! Cached kinds check the shared `work_cache` table before any external call.
//! A row with a non-empty result is copied onto the requesting item; otherwise
//! the caller computes and the writer publishes the new result under the
//! same natural key.

use libris_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use super::clock::Clock;
use crate::db::work_cache::{self, CacheIdentity};
use crate::models::{CacheScope, EnrichmentKind, EnrichmentPayload, Item};

/// Owned identity of a cache row about to be published
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub title: String,
    pub creator: Option<String>,
    pub external_id: Option<String>,
}

impl CacheEntry {
    pub fn identity(&self) -> CacheIdentity<'_> {
        CacheIdentity {
            natural_key: &self.key,
            title: &self.title,
            creator: self.creator.as_deref(),
            external_id: self.external_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheDecision {
    /// Reuse a previously computed result; no external call
    Hit { key: String, payload: EnrichmentPayload },
    /// Compute, then publish under this entry
    Miss(CacheEntry),
    /// Kind is not shared across owners, or the item has no usable key
    NotCacheable,
}

pub struct CacheResolver {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl CacheResolver {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Decide how `item` gets its `kind` result
    ///
    /// `bypass_read` skips the lookup (forced reanalysis) but still returns a
    /// `Miss` so the fresh result is republished.
    pub async fn resolve(&self, kind: EnrichmentKind, item: &Item, bypass_read: bool) -> Result<CacheDecision> {
        let Some(scope) = kind.cache_scope() else {
            return Ok(CacheDecision::NotCacheable);
        };
        let Some(key) = natural_key(scope, item) else {
            return Ok(CacheDecision::NotCacheable);
        };

        if !bypass_read {
            if let Some(row) = work_cache::lookup(&self.db, kind, &key).await? {
                if let Some(value) = row.result {
                    match EnrichmentPayload::from_value(kind, value) {
                        Ok(payload) if !payload.is_empty() => {
                            debug!(item_id = %item.id, %kind, key = %key, "Cache hit");
                            return Ok(CacheDecision::Hit { key, payload });
                        }
                        Ok(_) => debug!(key = %key, "Cache row holds an empty result"),
                        Err(e) => warn!(key = %key, error = %e, "Ignoring undecodable cache row"),
                    }
                }
            }
        }

        let entry = CacheEntry {
            key,
            title: item.title.clone(),
            creator: Some(item.creator.clone()).filter(|c| !c.is_empty()),
            external_id: item.external_id.clone(),
        };
        work_cache::mark_in_flight(&self.db, kind, entry.identity(), self.clock.now()).await?;

        debug!(item_id = %item.id, %kind, key = %entry.key, "Cache miss");
        Ok(CacheDecision::Miss(entry))
    }

    /// Mark the cache row failed if no computation has filled it
    pub async fn record_failure(&self, kind: EnrichmentKind, entry: &CacheEntry) -> Result<()> {
        work_cache::mark_failed_if_empty(&self.db, kind, &entry.key, self.clock.now()).await
    }
}

/// Natural key of a work for a cache scope
///
/// Components are normalized (trimmed, whitespace collapsed, lowercased),
/// escaped, and joined with `|`. `None` when the title is blank.
pub fn natural_key(scope: CacheScope, item: &Item) -> Option<String> {
    let title = normalize(&item.title);
    if title.is_empty() {
        return None;
    }

    let qualifier = match scope {
        CacheScope::TitleAndFirstAuthor => normalize(first_author(&item.creator)),
        CacheScope::TitleAndExternalId => item
            .external_id
            .as_deref()
            .map(normalize)
            .unwrap_or_default(),
    };

    let mut key = escape_component(&title);
    if !qualifier.is_empty() {
        key.push('|');
        key.push_str(&escape_component(&qualifier));
    }
    Some(key)
}

/// First name from a creator list ("A, B", "A & B", "A and B", "A; B")
pub fn first_author(creator: &str) -> &str {
    let mut end = creator.len();
    for sep in [",", "&", ";", " and "] {
        if let Some(pos) = creator.find(sep) {
            end = end.min(pos);
        }
    }
    creator[..end].trim()
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn escape_component(value: &str) -> String {
    value.replace('\\', "\\\\").replace('|', "\\|")
}
