//! # Logging & Tracing Infrastructure
//!
//! Configures `tracing-subscriber` for the archiver process:
//! - Pretty, compact or JSON console output
//! - Module-level filtering through `EnvFilter` (`RUST_LOG` wins when set)
//! - An optional daily-rotated log file written off-thread by
//!   `tracing-appender`, keeping a bounded number of old files
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LoggingConfig, LogFormat};
//!
//! let _guard = init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_file("logs/archiver.log"),
//! )?;
//! tracing::info!("Archiver started");
//! ```
//!
//! The returned [`LoggingGuard`] flushes the file writer on drop and must be
//! held until the process exits.

use crate::config::LogSettings;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::EnvFilter,
    layer::{Layered, SubscriberExt},
    registry::Registry,
    util::SubscriberInitExt,
    Layer,
};

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync + 'static>;

/// Crates whose events follow the configured level; everything else is `warn`.
const ARCHIVER_TARGETS: &[&str] = &[
    "channel_archiver",
    "core_archive",
    "core_ledger",
    "core_runtime",
    "core_service",
    "provider_youtube",
    "provider_rclone",
    "bridge_desktop",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Console output format
    pub format: LogFormat,
    /// Base level (`info`) or a full filter directive (`core_archive=debug,warn`)
    pub level: String,
    /// Rotating log file path
    pub file: Option<PathBuf>,
    /// Rotated files kept on disk
    pub max_log_files: usize,
    /// Display target module in logs
    pub display_target: bool,
    /// Display thread info
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
            max_log_files: 28,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    /// Build from the `[logging]` section of the config file.
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self {
            format: settings.format,
            level: settings.level.clone(),
            file: settings.file.clone(),
            max_log_files: settings.max_log_files,
            ..Self::default()
        }
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set base level or filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Also write to a daily-rotated file at `path`
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Enable or disable target display
    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    /// Enable or disable thread info
    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Keeps the background file writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the logging system
///
/// This should be called once during startup. Subsequent calls return an
/// error instead of replacing the global subscriber.
///
/// # Errors
///
/// Returns [`Error::Config`] if:
/// - Logging is already initialized
/// - The level is not a valid filter directive
/// - The log directory cannot be created
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_filter(&config, std::env::var("RUST_LOG").ok())?;

    let mut layers: Vec<BoxedLayer> = vec![console_layer(&config)];
    let mut file_guard = None;

    if let Some(path) = &config.file {
        let appender = rolling_appender(path, config.max_log_files)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(writer)
                .boxed(),
            LogFormat::Pretty | LogFormat::Compact => tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(config.display_target)
                .with_writer(writer)
                .boxed(),
        };
        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_filter(config: &LoggingConfig, env_override: Option<String>) -> Result<EnvFilter> {
    let filter_string = match env_override.filter(|s| !s.trim().is_empty()) {
        Some(directive) => directive,
        None if config.level.contains('=') || config.level.contains(',') => config.level.clone(),
        None => {
            let level = config.level.trim().to_ascii_lowercase();
            let mut directives = vec!["warn".to_string()];
            directives.extend(
                ARCHIVER_TARGETS
                    .iter()
                    .map(|target| format!("{}={}", target, level)),
            );
            directives.join(",")
        }
    };

    EnvFilter::try_new(&filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", filter_string, e)))
}

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_writer(io::stdout)
            .boxed(),
    }
}

/// Splits `logs/archiver.log` into directory `logs`, prefix `archiver` and
/// suffix `log`; rotated files are named `archiver.YYYY-MM-DD.log`.
fn rolling_appender(path: &Path, max_log_files: usize) -> Result<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory).map_err(|e| {
        Error::Config(format!(
            "Cannot create log directory {}: {}",
            directory.display(),
            e
        ))
    })?;

    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("archiver");

    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(max_log_files.max(1));

    if let Some(suffix) = path.extension().and_then(|s| s.to_str()) {
        builder = builder.filename_suffix(suffix);
    }

    builder
        .build(directory)
        .map_err(|e| Error::Config(format!("Cannot open log file {}: {}", path.display(), e)))
}
