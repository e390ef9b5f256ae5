//! Bootstrap configuration and root folder resolution
//!
//! The TOML file only carries bootstrap concerns (root folder, port, logging,
//! outbound HTTP tuning) plus an optional GetSongBPM credential. Runtime
//! credential changes are written to the database `settings` table, which wins
//! over the TOML value.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default HTTP port for the resolver service
pub const DEFAULT_PORT: u16 = 5790;

/// Default outbound request timeout
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default spacing between MusicBrainz/AcousticBrainz requests
pub const DEFAULT_MUSICBRAINZ_INTERVAL_MS: u64 = 1100;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "camkey.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// GetSongBPM credential (lowest-priority source)
    #[serde(default)]
    pub getsongbpm_api_key: Option<String>,

    /// Timeout applied to every outbound provider request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Minimum spacing between MusicBrainz/AcousticBrainz requests
    #[serde(default = "default_musicbrainz_interval_ms")]
    pub musicbrainz_interval_ms: u64,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: DEFAULT_PORT,
            logging: LoggingConfig::default(),
            getsongbpm_api_key: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            musicbrainz_interval_ms: DEFAULT_MUSICBRAINZ_INTERVAL_MS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error, or an EnvFilter directive)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_musicbrainz_interval_ms() -> u64 {
    DEFAULT_MUSICBRAINZ_INTERVAL_MS
}

/// Default config file location (`<config dir>/camkey/camkey.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("camkey").join("camkey.toml"))
}

/// Load the TOML config from `path`
///
/// A missing file yields the built-in defaults; a present but malformed file
/// is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write the TOML config to `path`, creating parent directories
///
/// Writes to a sibling temp file first and renames it into place.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("camkey"))
        .unwrap_or_else(|| PathBuf::from("./camkey_data"))
}
