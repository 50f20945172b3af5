//! Configuration resolution for libris-ai
//!
//! Provides multi-tier configuration resolution with Database → ENV → TOML
//! priority for the provider API key, and pipeline settings from TOML with
//! compiled defaults.

use libris_common::config::{PipelineConfig, TomlConfig};
use libris_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::models::EnrichmentKind;

pub const AI_API_KEY_ENV: &str = "LIBRIS_AI_API_KEY";
pub const TMDB_API_KEY_ENV: &str = "LIBRIS_TMDB_API_KEY";

/// Provider API key shared by every client; replaced at runtime by the settings endpoint
#[derive(Clone, Default)]
pub struct SharedApiKey(Arc<RwLock<Option<String>>>);

impl SharedApiKey {
    pub fn new(key: Option<String>) -> Self {
        Self(Arc::new(RwLock::new(key.filter(|k| is_valid_key(k)))))
    }

    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }

    pub async fn set(&self, key: String) {
        *self.0.write().await = Some(key);
    }

    pub async fn is_configured(&self) -> bool {
        self.0.read().await.is_some()
    }
}

/// Enrichment pipeline tuning
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Poller tick (60 s)
    pub poll_interval: Duration,
    /// Slots claimed per kind per tick, also the reaper page size (5)
    pub batch_size: u32,
    /// Honour forced reruns of cached kinds that already hold a result
    pub reanalyze_existing: bool,
    /// Starter balance granted once to new users
    pub starter_credits: i64,
    /// Cost of one paid action
    pub action_cost: i64,
    /// Replaces every per-kind call timeout when set
    pub call_timeout_override: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            batch_size: 5,
            reanalyze_existing: false,
            starter_credits: 5,
            action_cost: 1,
            call_timeout_override: None,
        }
    }
}

impl PipelineSettings {
    pub fn from_toml(config: &PipelineConfig) -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: config
                .poll_interval_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            batch_size: config.batch_size.filter(|n| *n > 0).unwrap_or(defaults.batch_size),
            reanalyze_existing: config.reanalyze_existing.unwrap_or(defaults.reanalyze_existing),
            starter_credits: config
                .starter_credits
                .filter(|n| *n >= 0)
                .unwrap_or(defaults.starter_credits),
            action_cost: config.action_cost.filter(|n| *n > 0).unwrap_or(defaults.action_cost),
            call_timeout_override: None,
        }
    }

    pub fn call_timeout(&self, kind: EnrichmentKind) -> Duration {
        self.call_timeout_override.unwrap_or_else(|| kind.call_timeout())
    }

    pub fn stale_timeout(&self, kind: EnrichmentKind) -> Duration {
        kind.stale_timeout()
    }
}

/// Resolve the generative provider API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML. Returns `None` when unset everywhere;
/// the service still starts and enrichment slots fail with a configuration
/// note until a key is supplied.
pub async fn resolve_ai_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_ai_api_key(db).await?;
    if let Some(key) = &db_key {
        if is_valid_key(key) {
            sources.push("database");
        }
    }

    // Tier 2: Environment variable
    let env_key = std::env::var(AI_API_KEY_ENV).ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 3: TOML config
    let toml_key = toml_config.ai.api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    if sources.len() > 1 {
        warn!(
            "AI API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key.filter(|k| is_valid_key(k)) {
        info!("AI API key loaded from database");
        return Ok(Some(key));
    }

    if let Some(key) = env_key.filter(|k| is_valid_key(k)) {
        info!("AI API key loaded from environment variable");
        return Ok(Some(key));
    }

    if let Some(key) = toml_key.filter(|k| is_valid_key(k)) {
        info!("AI API key loaded from TOML config");
        return Ok(Some(key.clone()));
    }

    warn!(
        "AI API key not configured; set it via POST /api/settings/ai_api_key, {} or the TOML file",
        AI_API_KEY_ENV
    );
    Ok(None)
}

/// TMDB key: ENV → TOML
pub fn resolve_tmdb_api_key(toml_config: &TomlConfig) -> Option<String> {
    std::env::var(TMDB_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k))
        .or_else(|| toml_config.tmdb_api_key.clone().filter(|k| is_valid_key(k)))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Write settings back to the TOML file
///
/// HashMap keys: "ai_api_key". The database stays authoritative, so a
/// failed TOML write is logged and ignored.
pub async fn sync_settings_to_toml(
    settings: HashMap<String, String>,
    toml_path: &Path,
) -> Result<()> {
    let mut config = libris_common::config::load_toml_config(toml_path)?;

    if let Some(key) = settings.get(crate::db::settings::AI_API_KEY) {
        config.ai.api_key = Some(key.clone());
    }

    match libris_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(())
        }
    }
}

/// Store a new API key in the database (and TOML), then activate it
pub async fn store_ai_api_key(
    db: &Pool<Sqlite>,
    active: &SharedApiKey,
    key: String,
    toml_path: Option<&Path>,
) -> Result<()> {
    let key = key.trim().to_string();
    if !is_valid_key(&key) {
        return Err(Error::InvalidInput("API key cannot be empty".to_string()));
    }

    crate::db::settings::set_ai_api_key(db, key.clone()).await?;

    if let Some(path) = toml_path {
        let mut settings = HashMap::new();
        settings.insert(crate::db::settings::AI_API_KEY.to_string(), key.clone());
        sync_settings_to_toml(settings, path).await?;
    }

    active.set(key).await;
    info!("AI API key updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_pipeline_defaults() {
        let settings = PipelineSettings::from_toml(&PipelineConfig::default());
        assert_eq!(settings, PipelineSettings::default());
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.batch_size, 5);
        assert!(!settings.reanalyze_existing);
    }

    #[test]
    fn test_pipeline_rejects_nonsense_values() {
        let config = PipelineConfig {
            poll_interval_secs: Some(0),
            batch_size: Some(0),
            reanalyze_existing: Some(true),
            starter_credits: Some(-3),
            action_cost: Some(2),
        };
        let settings = PipelineSettings::from_toml(&config);
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.batch_size, 5);
        assert!(settings.reanalyze_existing);
        assert_eq!(settings.starter_credits, 5);
        assert_eq!(settings.action_cost, 2);
    }

    #[test]
    fn test_call_timeout_override() {
        let mut settings = PipelineSettings::default();
        assert_eq!(settings.call_timeout(EnrichmentKind::Quote), Duration::from_secs(15));
        settings.call_timeout_override = Some(Duration::from_millis(50));
        assert_eq!(settings.call_timeout(EnrichmentKind::Characters), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_shared_key_ignores_blank_initial_value() {
        let key = SharedApiKey::new(Some("  ".to_string()));
        assert!(!key.is_configured().await);
        key.set("sk-live".to_string()).await;
        assert_eq!(key.get().await.as_deref(), Some("sk-live"));
    }
}
