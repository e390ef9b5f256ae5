//! Configuration resolution for camkey-resolver
//!
//! The GetSongBPM credential is resolved with Database → ENV → TOML priority.
//! No credential is not an error: the primary provider is simply skipped.

use camkey_common::config::{write_toml_config, TomlConfig};
use camkey_common::Result;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Environment variable carrying the GetSongBPM credential
pub const GETSONGBPM_API_KEY_ENV: &str = "CAMKEY_GETSONGBPM_API_KEY";

/// Runtime tuning for the resolver, derived from the bootstrap TOML
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Minimum spacing between MusicBrainz/AcousticBrainz requests
    pub musicbrainz_interval: Duration,
    /// Timeout for every outbound provider request
    pub http_timeout: Duration,
}

impl From<&TomlConfig> for ResolverSettings {
    fn from(config: &TomlConfig) -> Self {
        Self {
            musicbrainz_interval: Duration::from_millis(config.musicbrainz_interval_ms),
            http_timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}

/// Process-wide handle to the current GetSongBPM credential
///
/// Read on every lookup, so a credential set through the settings endpoint is
/// used by the next resolution without a restart.
#[derive(Debug, Clone, Default)]
pub struct SharedApiKey {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedApiKey {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial.filter(|k| is_valid_key(k)))),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Replace the credential; blank values clear it
    pub async fn set(&self, key: Option<String>) {
        *self.inner.write().await = key.filter(|k| is_valid_key(k));
    }
}

/// Resolve GetSongBPM credential from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML. `db` is `None` for ephemeral runs.
pub async fn resolve_getsongbpm_api_key(
    db: Option<&Pool<Sqlite>>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = match db {
        Some(db) => crate::db::settings::get_getsongbpm_api_key(db)
            .await?
            .filter(|k| is_valid_key(k)),
        None => None,
    };
    let env_key = std::env::var(GETSONGBPM_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .getsongbpm_api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "GetSongBPM API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match sources.first() {
        Some(source) => info!("GetSongBPM API key loaded from {}", source),
        None => warn!(
            "GetSongBPM API key not configured; lookups will use MusicBrainz/AcousticBrainz only. \
             Set it via POST /api/settings/getsongbpm_api_key, {} or the TOML config.",
            GETSONGBPM_API_KEY_ENV
        ),
    }

    Ok(db_key.or(env_key).or(toml_key))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Mirror the credential into the TOML file (best-effort backup)
///
/// Failures are logged, never returned: the database is authoritative.
pub fn sync_api_key_to_toml(key: Option<String>, toml_path: &Path) {
    let mut config = match camkey_common::config::load_toml_config(toml_path) {
        Ok(config) => config,
        Err(e) => {
            warn!("TOML read failed, credential not mirrored: {}", e);
            return;
        }
    };

    config.getsongbpm_api_key = key;

    match write_toml_config(&config, toml_path) {
        Ok(()) => info!("Settings synced to TOML: {}", toml_path.display()),
        Err(e) => warn!("TOML write failed (database write succeeded): {}", e),
    }
}
