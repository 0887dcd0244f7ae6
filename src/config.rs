//! Configuration file parser for ~/.config/feedrank/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
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

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

pub const DEFAULT_USER_AGENT: &str = concat!("feedrank/", env!("CARGO_PKG_VERSION"));

/// Settings for one aggregation run.
///
/// Every key is optional. Command-line flags override the matching keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Title of the synthesized feed.
    pub title: Option<String>,

    /// Id of the synthesized feed. Defaults to the first post's feed URL.
    pub feed_id: Option<String>,

    /// Feeds fetched in parallel.
    pub concurrency: usize,

    pub timeout_secs: u64,

    /// Retries for rate limiting, server errors and truncated bodies.
    pub max_retries: u32,

    pub retry_base_delay_ms: u64,

    /// Largest accepted feed body, in bytes.
    pub max_feed_size: usize,

    pub user_agent: String,

    /// Maximum number of posts written. 0 = unlimited.
    pub limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: None,
            feed_id: None,
            concurrency: 10,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 2000,
            max_feed_size: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            limit: 0,
        }
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "title",
        "feed_id",
        "concurrency",
        "timeout_secs",
        "max_retries",
        "retry_base_delay_ms",
        "max_feed_size",
        "user_agent",
        "limit",
    ];

    /// `~/.config/feedrank/config.toml`, if `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("feedrank")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Files over 1 MB → `Err(ConfigError::TooLarge)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
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
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
            .inspect(|config| {
                tracing::info!(
                    path = %path.display(),
                    concurrency = config.concurrency,
                    "Loaded configuration"
                );
            })
    }

    /// Parses TOML text, warning about unrecognized keys.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
