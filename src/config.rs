//! Library configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSIFT_CONFIG` (environment variable)
//! 2. `~/.config/mailsift/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailsift\config.toml` (Windows)
//! 3. Built-in defaults

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::error::{MailsiftError, Result};
use crate::parser::mime::DEFAULT_TOKEN_BUDGET;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Body extraction settings.
    pub extraction: ExtractionConfig,
    /// Completion endpoint settings.
    pub classifier: ClassifierConfig,
    /// Batch runner and cache settings.
    pub batch: BatchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Body extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Token budget of the reduced body.
    pub token_budget: usize,
    /// Use the message snippet when no part yields text.
    pub snippet_fallback: bool,
    /// Maximum number of messages taken per batch.
    pub max_messages: usize,
}

/// Completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Root of an OpenAI-compatible API, e.g. `http://localhost:8000/v1`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Environment variable holding the API key, if the endpoint needs one.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Completion length cap.
    pub max_tokens: u32,
}

/// Batch runner and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrent classification calls (unset = no cap).
    pub max_concurrency: Option<usize>,
    /// Deadline for a whole batch in seconds (unset = none).
    pub timeout_secs: Option<u64>,
    /// Maximum number of entries in the classification cache.
    pub cache_capacity: usize,
    /// Cache entry lifetime in seconds (unset = until evicted by size).
    pub cache_ttl_secs: Option<u64>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            token_budget: DEFAULT_TOKEN_BUDGET,
            snippet_fallback: true,
            max_messages: 500,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "MAILSIFT_API_KEY".to_string(),
            request_timeout_secs: 60,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            timeout_secs: None,
            cache_capacity: 10_000,
            cache_ttl_secs: None,
        }
    }
}

impl BatchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Cache capacity; zero is rejected by [`Config::validate`].
    pub fn cache_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity)
            .ok_or_else(|| MailsiftError::Config("batch.cache_capacity must be at least 1".into()))
    }
}

impl Config {
    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.extraction.token_budget == 0 {
            return Err(MailsiftError::Config(
                "extraction.token_budget must be at least 1".into(),
            ));
        }
        if self.extraction.max_messages == 0 {
            return Err(MailsiftError::Config(
                "extraction.max_messages must be at least 1".into(),
            ));
        }
        if self.classifier.base_url.trim().is_empty() {
            return Err(MailsiftError::Config("classifier.base_url is empty".into()));
        }
        if self.classifier.model.trim().is_empty() {
            return Err(MailsiftError::Config("classifier.model is empty".into()));
        }
        if self.classifier.request_timeout_secs == 0 {
            return Err(MailsiftError::Config(
                "classifier.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.batch.max_concurrency == Some(0) {
            return Err(MailsiftError::Config(
                "batch.max_concurrency must be at least 1 when set".into(),
            ));
        }
        self.batch.cache_capacity()?;
        Ok(())
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load and validate configuration from an explicit path.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MailsiftError::FileNotFound(path.to_path_buf())
        } else {
            MailsiftError::io(path, e)
        }
    })?;
    let cfg: Config = toml::from_str(&contents)
        .map_err(|e| MailsiftError::Config(format!("{}: {e}", path.display())))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILSIFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mailsift").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsift")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailsift.log")
}
