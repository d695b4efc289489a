//! Configuration loading and resolution
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ORDR_CONFIG`)
//! 3. OS-dependent default (`<config_dir>/ordr/<service>.toml`)
//!
//! A missing config file is not fatal: a warning is logged and compiled
//! defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ORDR_CONFIG";

/// Environment variable overriding the network API URL
pub const NETWORK_API_URL_ENV_VAR: &str = "ORDR_NETWORK_API_URL";

/// Default upper bound for the remote order fetch (seconds)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 120;

/// Default interval between synthetic progress ticks (milliseconds)
pub const DEFAULT_PROGRESS_TICK_MS: u64 = 500;

/// Default number of reports held by the in-memory report cache
pub const DEFAULT_REPORT_CACHE_CAPACITY: usize = 64;

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5731";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Optional log file path (stdout when unset)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Service configuration as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Base URL of the external order/booking API
    pub network_api_url: Option<String>,
    /// Upper bound for one remote order fetch
    pub fetch_timeout_secs: u64,
    /// Synthetic progress tick interval while fetching
    pub progress_tick_ms: u64,
    /// Capacity of the in-memory report cache
    pub report_cache_capacity: usize,
    /// Directory holding uploaded documents as JSON grids
    pub documents_dir: Option<PathBuf>,
    /// SQLite database holding persisted reports
    pub database_path: Option<PathBuf>,
    /// HTTP listen address
    pub listen_addr: String,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            network_api_url: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            progress_tick_ms: DEFAULT_PROGRESS_TICK_MS,
            report_cache_capacity: DEFAULT_REPORT_CACHE_CAPACITY,
            documents_dir: None,
            database_path: None,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Directory for uploaded documents, falling back to the data dir
    pub fn documents_dir_or_default(&self, service_name: &str) -> PathBuf {
        self.documents_dir
            .clone()
            .unwrap_or_else(|| default_data_dir(service_name).join("documents"))
    }

    /// Database path, falling back to the data dir
    pub fn database_path_or_default(&self, service_name: &str) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| default_data_dir(service_name).join("ordr.db"))
    }
}

/// Resolve the config file path
///
/// Returns the first candidate in priority order; the file may not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>, service_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("ordr").join(format!("{}.toml", service_name)))
        .unwrap_or_else(|| PathBuf::from(format!("./{}.toml", service_name)))
}

/// Load TOML config, degrading to defaults when the file is missing
///
/// A file that exists but fails to parse is an error: silently replacing a
/// broken config with defaults would hide operator mistakes.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write TOML config (creates parent directories)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Resolve the network API URL
///
/// **Priority:** ENV → TOML
pub fn resolve_network_api_url(toml_config: &TomlConfig) -> Result<String> {
    let env_url = std::env::var(NETWORK_API_URL_ENV_VAR)
        .ok()
        .filter(|v| is_valid_value(v));
    let toml_url = toml_config
        .network_api_url
        .as_ref()
        .filter(|v| is_valid_value(v));

    if env_url.is_some() && toml_url.is_some() {
        warn!(
            "Network API URL found in environment and TOML. Using environment (highest priority)."
        );
    }

    if let Some(url) = env_url {
        info!("Network API URL loaded from environment variable");
        return Ok(url.trim().to_string());
    }

    if let Some(url) = toml_url {
        info!("Network API URL loaded from TOML config");
        return Ok(url.trim().to_string());
    }

    Err(Error::Config(format!(
        "Network API URL not configured. Please configure using one of:\n\
         1. Environment: {}=https://network.example/api/orders\n\
         2. TOML config: network_api_url = \"https://network.example/api/orders\"",
        NETWORK_API_URL_ENV_VAR
    )))
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn default_data_dir(service_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ordr").join(service_name))
        .unwrap_or_else(|| PathBuf::from("./ordr_data").join(service_name))
}
