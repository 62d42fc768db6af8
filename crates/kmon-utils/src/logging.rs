//! # Logging Utilities
//!
//! Logging infrastructure for kmon using `tracing`.
//!
//! Monitor output (backtraces, `kerninfo`, the `K>` prompt) owns stdout.
//! Logs therefore go to stderr, or only to a file when the interactive
//! monitor is running.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kmon_utils::{init_logging, LogConfig};
//!
//! // Reads RUST_LOG, KMON_LOG_FORMAT and KMON_LOG_FILE
//! let _guard = init_logging(&LogConfig::from_env()).expect("Failed to initialize logging");
//!
//! tracing::info!("kernel image loaded");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=kmon_core::symbols=trace`)
//! - `KMON_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `KMON_LOG_FILE`: Optional log file, rolled daily, written in addition to stderr
//!
//! ## Filter priority
//!
//! 1. An explicit level (the `--log-level` flag)
//! 2. `RUST_LOG`, including per-module directives
//! 3. `warn`

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "KMON_LOG_FORMAT";
/// Environment variable naming an extra log file.
pub const LOG_FILE_ENV: &str = "KMON_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    Info,
    /// Debug level: one event per resolved address
    Debug,
    /// Trace level: every region search probe
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Logging configuration, usually built with [`LogConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogConfig
{
    /// Explicit level; overrides `RUST_LOG` when set.
    pub level: Option<LogLevel>,
    /// Output format.
    pub format: LogFormat,
    /// Extra log file, rolled daily.
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Configuration from `KMON_LOG_FORMAT` and `KMON_LOG_FILE`.
    ///
    /// An unparseable format falls back to `pretty`.
    pub fn from_env() -> Self
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        let format = lookup(LOG_FORMAT_ENV)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let file = lookup(LOG_FILE_ENV).filter(|s| !s.is_empty()).map(PathBuf::from);
        Self {
            level: None,
            format,
            file,
        }
    }

    /// Same configuration with an explicit level.
    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self
    {
        self.level = level.or(self.level);
        self
    }
}

/// Keeps the background log writer alive; logs may be lost once dropped.
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard
{
    _file: Option<WorkerGuard>,
}

fn build_filter(level: Option<LogLevel>) -> EnvFilter
{
    if let Some(level) = level {
        return EnvFilter::new(Level::from(level).to_string());
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
}

fn build_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_writer(path: &Path, rotate_daily: bool) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard)
{
    let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name().unwrap_or_default();
    let appender = if rotate_daily {
        tracing_appender::rolling::daily(directory, file_name)
    } else {
        tracing_appender::rolling::never(directory, file_name)
    };
    tracing_appender::non_blocking(appender)
}

/// Install the global subscriber: stderr plus the optional file.
///
/// ## Errors
///
/// [`LoggingError::InitializationFailed`] if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, LoggingError>
{
    let mut layers = vec![build_layer(config.format, io::stderr, true, build_filter(config.level))];
    let mut worker = None;
    if let Some(path) = config.file.as_deref() {
        let (writer, guard) = file_writer(path, true);
        layers.push(build_layer(config.format, writer, false, build_filter(config.level)));
        worker = Some(guard);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(LogGuard { _file: worker })
}

/// Default log file for an interactive monitor session:
/// `~/.kmon/YYYY-MM-DD-kmon-monitor.log`, or under the temp dir without `HOME`.
///
/// ## Errors
///
/// [`LoggingError::FileError`] if `~/.kmon` cannot be created.
pub fn monitor_log_path() -> Result<PathBuf, LoggingError>
{
    let today = Utc::now().format("%Y-%m-%d");
    let file_name = format!("{today}-kmon-monitor.log");
    match env::var_os("HOME") {
        Some(home) => {
            let dir = PathBuf::from(home).join(".kmon");
            std::fs::create_dir_all(&dir)?;
            Ok(dir.join(file_name))
        }
        None => Ok(env::temp_dir().join(file_name)),
    }
}

/// Install a file-only subscriber for the interactive monitor, so log lines
/// never land between the prompt and its output.
///
/// Returns the log file path alongside the guard.
///
/// ## Errors
///
/// As [`monitor_log_path`] and [`init_logging`].
pub fn init_monitor_logging(config: &LogConfig) -> Result<(PathBuf, LogGuard), LoggingError>
{
    let path = match &config.file {
        Some(path) => path.clone(),
        None => monitor_log_path()?,
    };
    let (writer, worker) = file_writer(&path, false);
    Registry::default()
        .with(build_layer(config.format, writer, false, build_filter(config.level)))
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok((path, LogGuard { _file: Some(worker) }))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!(matches!("xml".parse::<LogFormat>(), Err(LoggingError::InvalidFormat(_))));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!(matches!("loud".parse::<LogLevel>(), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_config_from_lookup()
    {
        let vars = HashMap::from([
            (LOG_FORMAT_ENV, "json".to_string()),
            (LOG_FILE_ENV, "/var/log/kmon.log".to_string()),
        ]);
        let config = LogConfig::from_lookup(|key| vars.get(key).cloned());
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/var/log/kmon.log")));
        assert_eq!(config.level, None);
    }

    #[test]
    fn test_config_defaults_on_bad_values()
    {
        let vars = HashMap::from([(LOG_FORMAT_ENV, "yaml".to_string()), (LOG_FILE_ENV, String::new())]);
        let config = LogConfig::from_lookup(|key| vars.get(key).cloned());
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_explicit_level_wins()
    {
        let config = LogConfig::default().with_level(Some(LogLevel::Debug));
        assert_eq!(config.level, Some(LogLevel::Debug));
        assert_eq!(config.with_level(None).level, Some(LogLevel::Debug));
    }
}
