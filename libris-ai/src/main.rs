//! libris-ai - enrichment pipeline and credit service
//!
//! Serves the item, enrichment, credit and paid-action API plus the SSE
//! event relay, and runs the enrichment poller in the background.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libris_common::config::{config_file_path, load_toml_config, RootFolderInitializer, RootFolderResolver};
use libris_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libris_ai::config::{resolve_ai_api_key, resolve_tmdb_api_key, PipelineSettings, SharedApiKey};
use libris_ai::services::{CatalogClient, FsBlobStore, ItunesClient, OpenAiImageClient, OpenAiTextClient};
use libris_ai::workflow::{Providers, SystemClock};
use libris_ai::{AppDeps, AppState};

const MODULE_NAME: &str = "libris-ai";

/// Command-line arguments for libris-ai
#[derive(Parser, Debug)]
#[command(name = "libris-ai")]
#[command(about = "Catalogue enrichment and credit service for Libris")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "LIBRIS_AI_PORT")]
    port: u16,

    /// Root folder holding the database and generated images
    #[arg(short, long, env = "LIBRIS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1", env = "LIBRIS_AI_HOST")]
    host: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "libris_ai=info,libris_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting libris-ai v{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    // Root folder: CLI → ENV → TOML → compiled default
    let root_folder = args
        .root_folder
        .clone()
        .unwrap_or_else(|| RootFolderResolver::new(MODULE_NAME).resolve());
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let db = libris_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let toml_path = config_file_path(MODULE_NAME);
    let toml_config = match toml_path.as_deref() {
        Some(path) => load_toml_config(path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable config file: {}", e);
            Default::default()
        }),
        None => Default::default(),
    };

    let settings = PipelineSettings::from_toml(&toml_config.pipeline);
    let max_lock_wait_ms = libris_ai::db::settings::get_max_lock_wait_ms(&db).await?;

    let api_key = SharedApiKey::new(resolve_ai_api_key(&db, &toml_config).await?);

    let mut text = OpenAiTextClient::new(api_key.clone())?;
    let mut images = OpenAiImageClient::new(api_key.clone())?;
    if let Some(url) = toml_config.ai.base_url.as_deref() {
        text = text.with_base_url(url);
        images = images.with_base_url(url);
    }
    if let Some(model) = toml_config.ai.text_model.as_deref() {
        text = text.with_model(model);
    }
    if let Some(model) = toml_config.ai.image_model.as_deref() {
        images = images.with_model(model);
    }

    let blob_dir = initializer.blob_path();
    let providers = Providers {
        text: Arc::new(text),
        images: Arc::new(images),
        music: Arc::new(ItunesClient::new()?),
        blobs: Arc::new(FsBlobStore::new(blob_dir.clone())),
    };
    let catalog = CatalogClient::new(resolve_tmdb_api_key(&toml_config))?;

    let event_bus = EventBus::new(256);

    let state = AppState::new(
        db,
        event_bus,
        AppDeps {
            settings,
            providers,
            catalog,
            api_key,
            blob_dir,
            toml_path,
            clock: Arc::new(SystemClock),
            max_lock_wait_ms,
        },
    );

    let cancel = CancellationToken::new();
    let poller = Arc::new(state.build_poller());
    let poller_task = tokio::spawn(poller.run(cancel.clone()));

    let app = libris_ai::build_router(state);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Err(e) = poller_task.await {
        warn!("Poller task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
