//! Configuration file parser for feedmill.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! All fields use `#[serde(default)]` so any subset of keys can be
//! specified; unknown keys are silently ignored by serde.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Service configuration.
///
/// Defaults: 10s fetch timeout, 10 MiB response ceiling, 15 minute refresh
/// interval, 30 requests per identity per 60s window.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP surface binds to.
    pub bind_addr: String,

    /// SQLite database path (`:memory:` for ephemeral runs).
    pub database_path: String,

    /// Origins echoed back for CORS. Empty means no cross-origin access;
    /// a wildcard is never used.
    pub allowed_origins: Vec<String>,

    /// Hard wall-clock budget for one feed fetch, in seconds.
    pub fetch_timeout_secs: u64,

    /// Response size ceiling in bytes.
    pub max_response_bytes: usize,

    /// A feed is due for refresh once its last fetch is older than this.
    pub refresh_interval_minutes: u64,

    /// Concurrent fetches during a sweep.
    pub sweep_concurrency: usize,

    /// Accept loopback/private-network feed URLs. Disables the SSRF host
    /// guard — only for deployments that deliberately ingest intranet feeds.
    pub allow_private_networks: bool,

    /// Rate limit window length in seconds.
    pub rate_limit_window_secs: u64,

    /// Operations allowed per identity per window.
    pub rate_limit_max_requests: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8014".to_string(),
            database_path: "feedmill.db".to_string(),
            allowed_origins: Vec::new(),
            fetch_timeout_secs: 10,
            max_response_bytes: 10 * 1024 * 1024,
            refresh_interval_minutes: 15,
            sweep_concurrency: 8,
            allow_private_networks: false,
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 30,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid slurping a corrupted or
        // maliciously large file into memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }

        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}
