//! Logging setup for scterm, built on the `tracing` ecosystem.
//!
//! [`init_minimal_logging`] is meant for early startup and tests; [`init_logging`]
//! installs the configured console layer and an optional daily-rolling file layer.
//! Console output goes to stderr; stdout carries the terminal's own output.

use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::CoreError;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps the file writer alive so buffered lines are flushed on exit.
static LOG_WORKER_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// Initializes a minimal stderr logger filtered by `RUST_LOG` (default "info").
///
/// Errors (e.g. a global subscriber is already set) are ignored.
pub fn init_minimal_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let _ = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init();
}

fn parse_level(level: &str) -> Result<Level, CoreError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        invalid => Err(CoreError::LoggingInitialization(format!(
            "Invalid log level in config: {}",
            invalid
        ))),
    }
}

fn create_console_layer<W>(writer: W, ansi: bool, format: &str, level: &str) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format.to_lowercase().as_str() {
        "json" => fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(EnvFilter::new(level))
            .boxed(),
        _ => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_filter(EnvFilter::new(level))
            .boxed(),
    }
}

fn create_file_layer(log_path: &Path, format: &str) -> Result<(BoxedLayer, WorkerGuard), CoreError> {
    let directory = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)?;

    let file_name = log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("scterm.log"));
    let file_appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let layer = match format.to_lowercase().as_str() {
        "json" => fmt::layer().json().with_writer(writer).with_ansi(false).boxed(),
        _ => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
    };
    Ok((layer, guard))
}

/// Installs the global subscriber described by `config`.
///
/// With `allow_existing`, an already installed subscriber is not an error; the
/// call is then logged and otherwise ignored.
///
/// # Errors
///
/// [`CoreError::LoggingInitialization`] for an invalid level or when a subscriber is
/// already installed and `allow_existing` is false. [`CoreError::Io`] if the log
/// directory cannot be created.
pub fn init_logging(config: &LoggingConfig, allow_existing: bool) -> Result<(), CoreError> {
    let level = parse_level(&config.level)?.to_string();

    let console_layer = create_console_layer(
        std::io::stderr,
        atty::is(atty::Stream::Stderr),
        &config.format,
        &level,
    );

    let mut layers: Vec<BoxedLayer> = vec![console_layer];
    let mut file_guard = None;
    if let Some(log_path) = &config.file_path {
        let (file_layer, guard) = create_file_layer(log_path, &config.format)?;
        layers.push(file_layer.with_filter(EnvFilter::new(level)).boxed());
        file_guard = Some(guard);
    }

    let result = Registry::default().with(layers).try_init();

    match LOG_WORKER_GUARD.lock() {
        Ok(mut slot) => *slot = file_guard,
        Err(e) => eprintln!("[ERROR] Failed to lock LOG_WORKER_GUARD: {}. Log flushing may be affected.", e),
    }

    match result {
        Ok(()) => Ok(()),
        Err(e) if allow_existing => {
            tracing::info!("Logging already initialized, keeping the existing subscriber: {}", e);
            Ok(())
        }
        Err(e) => Err(CoreError::LoggingInitialization(format!(
            "Failed to set global tracing subscriber: {}",
            e
        ))),
    }
}
