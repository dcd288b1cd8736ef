//! # Logging Utilities
//!
//! `tracing` subscriber setup for addrscope.
//!
//! Resolved frames are the CLI's real output and go to stdout, so log records never do:
//! console logs are written to stderr and file logs go through a non-blocking appender.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use addrscope_utils::init_logging;
//!
//! // Keep the guard alive for as long as logs should be flushed to disk
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Resolver started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=addrscope_core::pdb=trace`)
//! - `ADDRSCOPE_LOG_FORMAT`: `pretty` (default) or `json`
//! - `ADDRSCOPE_LOG_FILE`: also write a daily-rolling log file at this path
//!
//! ## File-only logging
//!
//! [`init_logging_to_dir`] writes to `<dir>/YYYY-MM-DD-addrscope.log` and nothing else,
//! which keeps stderr clean when frames are piped into another tool.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the log format.
pub const LOG_FORMAT_VAR: &str = "ADDRSCOPE_LOG_FORMAT";
/// Environment variable naming an additional log file.
pub const LOG_FILE_VAR: &str = "ADDRSCOPE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per record
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    /// Includes per-record decoding detail
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
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Keeps the background log writer alive
///
/// Dropping the guard flushes and stops file logging.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard
{
    _worker: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingGuard
{
    /// File receiving log records, if any.
    pub fn log_file(&self) -> Option<&Path>
    {
        self.log_file.as_deref()
    }
}

/// Initialize logging from the environment
///
/// ## Errors
///
/// Returns an error if a subscriber is already installed or the log file cannot be opened.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(LOG_FORMAT_VAR) {
        Ok(value) => LogFormat::from_str(&value).map_err(LoggingError::InvalidFormat)?,
        Err(_) => LogFormat::Pretty,
    };
    init_console(format, None)
}

/// Initialize console logging with an explicit level and format
///
/// `ADDRSCOPE_LOG_FILE` is still honoured.
///
/// ## Errors
///
/// Returns an error if a subscriber is already installed or the log file cannot be opened.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_console(format, Some(level.into()))
}

/// Initialize file-only logging in `dir`
///
/// Records go to `<dir>/YYYY-MM-DD-addrscope.log` (UTC date); the directory is created
/// if needed. With `level` unset, `RUST_LOG` or `info` applies.
///
/// ## Errors
///
/// Returns an error if the directory cannot be created or a subscriber is already installed.
pub fn init_logging_to_dir(dir: &Path, level: Option<LogLevel>) -> Result<LoggingGuard, LoggingError>
{
    fs::create_dir_all(dir)?;
    let log_file = dir.join(dated_log_name());

    let (writer, worker) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name(&log_file)));
    let layer = file_layer(LogFormat::Pretty, writer, env_filter(level.map(Into::into)));
    install(vec![layer])?;

    Ok(LoggingGuard {
        _worker: Some(worker),
        log_file: Some(log_file),
    })
}

/// `YYYY-MM-DD-addrscope.log` for today.
pub fn dated_log_name() -> String
{
    format!("{}-addrscope.log", Utc::now().format("%Y-%m-%d"))
}

fn init_console(format: LogFormat, level: Option<Level>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![console_layer(format, env_filter(level))];

    let log_file = env::var(LOG_FILE_VAR).ok().map(PathBuf::from);
    let mut worker = None;
    if let Some(path) = &log_file {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name(path)));
        layers.push(file_layer(format, writer, env_filter(level)));
        worker = Some(guard);
    }

    install(layers)?;
    Ok(LoggingGuard {
        _worker: worker,
        log_file,
    })
}

/// An explicit level wins; otherwise `RUST_LOG`, otherwise `info`.
fn env_filter(level: Option<Level>) -> EnvFilter
{
    match level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

fn file_name(path: &Path) -> &std::ffi::OsStr
{
    path.file_name().unwrap_or_else(|| "addrscope.log".as_ref())
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking, filter: EnvFilter) -> BoxedLayer
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn install(layers: Vec<BoxedLayer>) -> Result<(), LoggingError>
{
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// `ADDRSCOPE_LOG_FORMAT` holds an unknown format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// A subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// The log file or directory could not be created
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
