//! Logging initialization
//!
//! Sets up a `tracing` subscriber with an optional console layer and an
//! optional daily-rolling log file. `RUST_LOG` takes precedence over the
//! configured level for every layer.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::LoggingConfig;

/// Guard that keeps the logging system alive.
///
/// Buffered file output is flushed when the guard is dropped, so it must be
/// held for the lifetime of the process.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global tracing subscriber
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;

    if config.console {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(env_filter(&config.level));
        layers.push(Box::new(console_layer));
    }

    if let Some(directory) = &config.directory {
        std::fs::create_dir_all(directory)?;

        let appender = RollingFileAppender::new(Rotation::DAILY, directory, &config.file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(env_filter(&config.level));
        layers.push(Box::new(file_layer));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(
        "Logging initialized (level: {}, console: {}, file: {:?})",
        config.level,
        config.console,
        config.directory.as_ref().map(|d| d.join(&config.file_name))
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
