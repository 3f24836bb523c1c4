//! # Logging Setup
//!
//! Installs a `tracing-subscriber` stack from a [`LoggingConfig`]: console output
//! (plain or JSON), an optional daily-rolling log file, and an `EnvFilter` that
//! honours `RUST_LOG` on top of the configured level.

use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::{FormatterError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// The returned guard flushes the file writer; keep it alive for the lifetime of
/// the process. Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.log_to_console {
        if config.json_format {
            layers.push(fmt::layer().json().with_writer(std::io::stdout).boxed());
        } else {
            layers.push(fmt::layer().with_writer(std::io::stdout).boxed());
        }
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            FormatterError::ConfigError("log_file_path must be specified".to_string())
        })?;
        let path = Path::new(path);
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.log", config.app_name));

        let appender = RollingFileAppender::new(Rotation::DAILY, directory, file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);

        if config.json_format {
            layers.push(fmt::layer().json().with_writer(writer).with_ansi(false).boxed());
        } else {
            layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
        }
    }

    let filter = EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| FormatterError::ConfigError(format!("Failed to install subscriber: {e}")))?;

    info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(guard)
}
