//! camkey-resolver - Camelot key lookup service
//!
//! Serves `POST /lookup` for the page overlay: title + artist in, Camelot key
//! out. Lookups are cached in the SQLite database in the root folder and
//! executed one at a time.

use anyhow::{Context, Result};
use camkey_common::config::{default_config_path, load_toml_config, resolve_root_folder, DATABASE_FILE};
use camkey_resolver::cache::{CacheStorage, KeyCache, MemoryCacheStorage, SqliteCacheStorage};
use camkey_resolver::config::{resolve_getsongbpm_api_key, ResolverSettings, SharedApiKey};
use camkey_resolver::queue::LookupQueue;
use camkey_resolver::resolver::KeyResolver;
use camkey_resolver::transport::ReqwestTransport;
use camkey_resolver::AppState;
use clap::Parser;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for camkey-resolver
#[derive(Parser, Debug)]
#[command(name = "camkey-resolver")]
#[command(about = "Camelot key lookup service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "CAMKEY_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "CAMKEY_CONFIG")]
    config: Option<PathBuf>,

    /// Keep the cache in memory only; credential changes are not persisted
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_path = args.config.clone().or_else(default_config_path);
    let toml_config = match &toml_path {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Default::default(),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&toml_config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting camkey-resolver");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = ResolverSettings::from(&toml_config);

    let (db, storage): (Option<SqlitePool>, Arc<dyn CacheStorage>) = if args.ephemeral {
        warn!("Ephemeral mode: cache and credential changes are not persisted");
        (None, Arc::new(MemoryCacheStorage::new()) as Arc<dyn CacheStorage>)
    } else {
        let root_folder =
            resolve_root_folder(args.root_folder.as_deref(), "CAMKEY_ROOT_FOLDER", &toml_config);
        let db_path = root_folder.join(DATABASE_FILE);
        info!("Database: {}", db_path.display());

        let pool = camkey_common::db::init_database(&db_path)
            .await
            .context("Failed to initialize database")?;
        let storage: Arc<dyn CacheStorage> = Arc::new(SqliteCacheStorage::new(pool.clone()));
        (Some(pool), storage)
    };

    let api_key = SharedApiKey::new(
        resolve_getsongbpm_api_key(db.as_ref(), &toml_config)
            .await
            .context("Failed to resolve GetSongBPM API key")?,
    );

    let transport = Arc::new(
        ReqwestTransport::new(settings.http_timeout).context("Failed to build HTTP client")?,
    );
    let resolver = Arc::new(KeyResolver::new(
        transport,
        KeyCache::new(storage),
        api_key.clone(),
        &settings,
    ));
    let queue = LookupQueue::start(resolver);

    let toml_backup = if args.ephemeral { None } else { toml_path };
    let state = AppState::new(queue, api_key, db, toml_backup);
    let app = camkey_resolver::build_router(state).layer(TraceLayer::new_for_http());

    let port = args.port.unwrap_or(toml_config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Filter used when RUST_LOG is unset
///
/// A bare level from the TOML applies to this service and the HTTP layer; any
/// other value is taken as a full filter directive.
fn default_filter(level: &str) -> String {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    let level = level.trim().to_ascii_lowercase();

    if LEVELS.contains(&level.as_str()) {
        format!(
            "camkey_resolver={0},camkey_common={0},tower_http={0}",
            level
        )
    } else {
        level
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install terminate handler: {}", e);
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
