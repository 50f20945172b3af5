//! libris-ai library interface
//!
//! Enrichment pipeline, credit ledger and HTTP surface of the Libris
//! cataloging back end. Exposed as a library for integration testing; the
//! `libris-ai` binary wires it together.

pub mod actions;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use libris_common::events::EventBus;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::actions::PaidActions;
use crate::config::{PipelineSettings, SharedApiKey};
use crate::ledger::CreditLedger;
use crate::services::CatalogClient;
use crate::workflow::{default_enrichers, Clock, EnrichmentPoller, Providers, ResultWriter};

/// Everything needed to assemble the application state
pub struct AppDeps {
    pub settings: PipelineSettings,
    pub providers: Providers,
    pub catalog: CatalogClient,
    pub api_key: SharedApiKey,
    pub blob_dir: PathBuf,
    /// TOML file that key updates are mirrored to (None in tests)
    pub toml_path: Option<PathBuf>,
    pub clock: Arc<dyn Clock>,
    pub max_lock_wait_ms: u64,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus relayed over SSE
    pub event_bus: EventBus,
    pub settings: PipelineSettings,
    pub clock: Arc<dyn Clock>,
    pub writer: Arc<ResultWriter>,
    pub ledger: Arc<CreditLedger>,
    pub actions: Arc<PaidActions>,
    pub catalog: Arc<CatalogClient>,
    pub providers: Providers,
    pub api_key: SharedApiKey,
    pub blob_dir: PathBuf,
    pub toml_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, deps: AppDeps) -> Self {
        let writer = Arc::new(ResultWriter::new(
            db.clone(),
            event_bus.clone(),
            deps.clock.clone(),
            deps.max_lock_wait_ms,
        ));
        let ledger = Arc::new(CreditLedger::new(
            db.clone(),
            event_bus.clone(),
            deps.clock.clone(),
            deps.max_lock_wait_ms,
        ));
        let actions = Arc::new(PaidActions::new(
            ledger.clone(),
            deps.providers.text.clone(),
            deps.providers.music.clone(),
            deps.settings.action_cost,
        ));

        Self {
            db,
            event_bus,
            settings: deps.settings,
            clock: deps.clock,
            writer,
            ledger,
            actions,
            catalog: Arc::new(deps.catalog),
            providers: deps.providers,
            api_key: deps.api_key,
            blob_dir: deps.blob_dir,
            toml_path: deps.toml_path,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Poller sharing this state's writer, clock and providers
    pub fn build_poller(&self) -> EnrichmentPoller {
        EnrichmentPoller::new(
            self.db.clone(),
            self.settings.clone(),
            self.clock.clone(),
            default_enrichers(&self.providers),
            self.writer.clone(),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let blobs = ServeDir::new(&state.blob_dir);

    Router::new()
        .merge(api::item_routes())
        .merge(api::credit_routes())
        .merge(api::action_routes())
        .merge(api::catalog_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .nest_service("/files", blobs)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
