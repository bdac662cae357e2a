//! # Configuration
//!
//! The archiver is configured from a TOML file with four sections:
//!
//! ```toml
//! [source]
//! channel = "https://www.youtube.com/channel/UC..."
//! api_key = "..."            # optional
//!
//! [storage]
//! remote = "mega"
//! base_path = "Backups/Channel"
//!
//! [archiver]
//! polling_interval_minutes = 60
//! worker_count = 4
//!
//! [logging]
//! level = "info"
//! file = "logs/archiver.log"
//! ```
//!
//! Every field except `source.channel`, `storage.remote` and
//! `storage.base_path` has a default. [`ArchiverConfig::validate`] runs after
//! loading and after [`ArchiverConfigBuilder::build`].

use crate::error::{Error, Result};
use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Hard ceiling on concurrent transfer workers.
pub const MAX_WORKERS: usize = 8;

/// Upper bound for the per-item retry budget.
pub const MAX_RETRY_BUDGET: u32 = 10;

/// Environment variable that overrides `source.api_key`.
pub const API_KEY_ENV: &str = "ARCHIVER_YOUTUBE_API_KEY";

/// Requested download quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "audio")]
    Audio,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::Audio => "audio",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(Quality::Best),
            "1080p" => Ok(Quality::P1080),
            "720p" => Ok(Quality::P720),
            "480p" => Ok(Quality::P480),
            "audio" => Ok(Quality::Audio),
            other => Err(Error::Config(format!(
                "Unknown quality '{}'. Expected one of: best, 1080p, 720p, 480p, audio",
                other
            ))),
        }
    }
}

/// Where the catalog comes from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Channel id (`UC...`) or channel URL
    pub channel: String,

    /// Data API key. When absent only the extraction tool is used.
    pub api_key: Option<String>,

    /// Minimum delay between provider requests, in milliseconds
    pub rate_limit_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            api_key: None,
            rate_limit_ms: 1000,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("channel", &self.channel)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("rate_limit_ms", &self.rate_limit_ms)
            .finish()
    }
}

/// Remote storage destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// rclone remote name, without the trailing `:`
    pub remote: String,

    /// Folder under the remote that receives all uploads
    pub base_path: String,

    /// Optional extra folder between `base_path` and the year folders
    pub channel_folder: Option<String>,

    /// Re-upload even if a same-size object already exists
    pub overwrite: bool,

    /// Compare remote size with local size after each transfer
    pub verify: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            remote: String::new(),
            base_path: String::new(),
            channel_folder: None,
            overwrite: false,
            verify: true,
        }
    }
}

/// Pipeline and scheduling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub polling_interval_minutes: u64,
    pub worker_count: usize,
    /// Retries after the first attempt, per fetch and per upload
    pub max_retries: u32,
    pub download_dir: PathBuf,
    pub database_path: PathBuf,
    /// Result cap of the first pass after startup
    pub initial_scan_limit: usize,
    /// Result cap of every monitoring pass
    pub incremental_scan_limit: usize,
    pub quality: Quality,
    pub dry_run: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            polling_interval_minutes: 60,
            worker_count: 4,
            max_retries: 3,
            download_dir: PathBuf::from("./downloads"),
            database_path: PathBuf::from("archive.db"),
            initial_scan_limit: 5000,
            incremental_scan_limit: 50,
            quality: Quality::Best,
            dry_run: false,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Base level or full `EnvFilter` directive
    pub level: String,
    pub format: LogFormat,
    /// Rotating log file; console only when absent
    pub file: Option<PathBuf>,
    /// Rotated files to keep
    pub max_log_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
            max_log_files: 28,
        }
    }
}

/// Complete archiver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiverConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub archiver: PipelineSettings,
    pub logging: LogSettings,
}

impl ArchiverConfig {
    /// Creates a new builder for constructing an `ArchiverConfig`.
    pub fn builder() -> ArchiverConfigBuilder {
        ArchiverConfigBuilder::default()
    }

    /// Reads, parses and validates a TOML config file.
    ///
    /// `ARCHIVER_YOUTUBE_API_KEY`, when set, replaces `source.api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, is not valid
    /// TOML for this schema, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&raw)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document without validating it.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.source.api_key = Some(key);
        }
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Channel, remote and base path are present
    /// - The remote name has no `:` (it is appended when building paths)
    /// - Worker count is within 1..=8 and the retry budget within 0..=10
    /// - Scan limits and polling interval are non-zero and consistent
    pub fn validate(&self) -> Result<()> {
        if self.source.channel.trim().is_empty() {
            return Err(Error::Config("source.channel cannot be empty".to_string()));
        }

        if self.source.rate_limit_ms > 60_000 {
            return Err(Error::Config(
                "source.rate_limit_ms exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.storage.remote.trim().is_empty() {
            return Err(Error::Config("storage.remote cannot be empty".to_string()));
        }

        if self.storage.remote.contains(':') {
            return Err(Error::Config(format!(
                "storage.remote must be a bare remote name without ':' (got '{}')",
                self.storage.remote
            )));
        }

        if self.storage.base_path.trim_matches('/').trim().is_empty() {
            return Err(Error::Config("storage.base_path cannot be empty".to_string()));
        }

        if self.storage.base_path.split('/').any(|segment| segment == "..") {
            return Err(Error::Config(
                "storage.base_path must not contain '..'".to_string(),
            ));
        }

        let settings = &self.archiver;

        if settings.polling_interval_minutes == 0 {
            return Err(Error::Config(
                "archiver.polling_interval_minutes must be greater than 0".to_string(),
            ));
        }

        if settings.worker_count == 0 || settings.worker_count > MAX_WORKERS {
            return Err(Error::Config(format!(
                "archiver.worker_count must be between 1 and {} (got {})",
                MAX_WORKERS, settings.worker_count
            )));
        }

        if settings.max_retries > MAX_RETRY_BUDGET {
            return Err(Error::Config(format!(
                "archiver.max_retries exceeds maximum of {} (got {})",
                MAX_RETRY_BUDGET, settings.max_retries
            )));
        }

        if settings.incremental_scan_limit == 0 {
            return Err(Error::Config(
                "archiver.incremental_scan_limit must be greater than 0".to_string(),
            ));
        }

        if settings.initial_scan_limit < settings.incremental_scan_limit {
            return Err(Error::Config(format!(
                "archiver.initial_scan_limit ({}) must be at least incremental_scan_limit ({})",
                settings.initial_scan_limit, settings.incremental_scan_limit
            )));
        }

        if settings.download_dir.as_os_str().is_empty() {
            return Err(Error::Config("archiver.download_dir cannot be empty".to_string()));
        }

        if settings.database_path.as_os_str().is_empty() {
            return Err(Error::Config("archiver.database_path cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.archiver.polling_interval_minutes.saturating_mul(60))
    }

    /// API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.source
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Builder for [`ArchiverConfig`].
///
/// # Example
///
/// ```
/// use core_runtime::config::ArchiverConfig;
///
/// let config = ArchiverConfig::builder()
///     .channel("UCabcdefghijklmnopqrstuv")
///     .remote("mega")
///     .base_path("Backups/Channel")
///     .worker_count(2)
///     .build()?;
/// # Ok::<(), core_runtime::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ArchiverConfigBuilder {
    channel: Option<String>,
    remote: Option<String>,
    base_path: Option<String>,
    config: ArchiverConfig,
}

impl ArchiverConfigBuilder {
    /// Sets the channel reference (required).
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the storage remote name (required).
    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Sets the base folder under the remote (required).
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.source.api_key = Some(key.into());
        self
    }

    pub fn rate_limit_ms(mut self, delay_ms: u64) -> Self {
        self.config.source.rate_limit_ms = delay_ms;
        self
    }

    pub fn channel_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.storage.channel_folder = Some(folder.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.config.storage.overwrite = overwrite;
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.config.storage.verify = verify;
        self
    }

    pub fn polling_interval_minutes(mut self, minutes: u64) -> Self {
        self.config.archiver.polling_interval_minutes = minutes;
        self
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.archiver.worker_count = workers;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.archiver.max_retries = retries;
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.archiver.download_dir = dir.into();
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.archiver.database_path = path.into();
        self
    }

    pub fn scan_limits(mut self, initial: usize, incremental: usize) -> Self {
        self.config.archiver.initial_scan_limit = initial;
        self.config.archiver.incremental_scan_limit = incremental;
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.config.archiver.quality = quality;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.archiver.dry_run = dry_run;
        self
    }

    pub fn logging(mut self, logging: LogSettings) -> Self {
        self.config.logging = logging;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required field is missing or the
    /// resulting configuration fails [`ArchiverConfig::validate`].
    pub fn build(self) -> Result<ArchiverConfig> {
        let channel = self.channel.ok_or_else(|| {
            Error::Config("Channel is required. Use .channel() to set it.".to_string())
        })?;

        let remote = self.remote.ok_or_else(|| {
            Error::Config("Remote is required. Use .remote() to set it.".to_string())
        })?;

        let base_path = self.base_path.ok_or_else(|| {
            Error::Config("Base path is required. Use .base_path() to set it.".to_string())
        })?;

        let mut config = self.config;
        config.source.channel = channel;
        config.storage.remote = remote;
        config.storage.base_path = base_path;

        config.validate()?;
        Ok(config)
    }
}
