//! camkey-resolver library interface
//!
//! Resolves a song title and artist to a Camelot key code using GetSongBPM,
//! falling back to MusicBrainz + AcousticBrainz, with a persistent cache and a
//! single serial lookup queue.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod key_theory;
pub mod queue;
pub mod rate_limiter;
pub mod resolver;
pub mod services;
pub mod text_match;
pub mod transport;

pub use crate::error::{ApiError, ApiResult};

use crate::config::SharedApiKey;
use crate::queue::LookupQueue;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The process-wide lookup queue
    pub queue: LookupQueue,
    /// Current GetSongBPM credential
    pub api_key: SharedApiKey,
    /// Database pool; `None` for ephemeral runs
    pub db: Option<SqlitePool>,
    /// TOML file the credential is mirrored to
    pub toml_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        queue: LookupQueue,
        api_key: SharedApiKey,
        db: Option<SqlitePool>,
        toml_path: Option<PathBuf>,
    ) -> Self {
        Self {
            queue,
            api_key,
            db,
            toml_path,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::lookup_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .with_state(state)
}
