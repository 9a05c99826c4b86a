//! Logging setup for the simulator process.

use std::path::Path;

use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::Result;

/// Initializes the global subscriber from `config`. `node_id` is
/// attached to the startup line so multi-instance deployments can tell
/// their logs apart at a glance.
pub fn setup_logging(config: &LoggingConfig, node_id: &str) -> Result<()> {
    let level = parse_log_level(&config.level)?;

    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    match &config.file {
        Some(file_path) => {
            let file_path = Path::new(file_path);
            let directory = file_path.parent().ok_or_else(|| crate::Error::parse("invalid log file path"))?;
            let filename = file_path.file_name().ok_or_else(|| crate::Error::parse("invalid log filename"))?;
            let filename = filename.to_string_lossy();

            let file_appender = rolling::RollingFileAppender::builder()
                .rotation(rolling::Rotation::DAILY)
                .filename_prefix(filename.to_string())
                .filename_suffix("log")
                .max_log_files(config.max_files as usize)
                .build(directory)
                .map_err(|e| crate::Error::internal(format!("failed to create log file appender: {}", e)))?;

            let (file_writer, _file_guard) = non_blocking(file_appender);

            let file_layer = match config.format {
                LogFormat::Json => fmt::layer().json().with_writer(file_writer).boxed(),
                LogFormat::Compact => fmt::layer().compact().with_writer(file_writer).boxed(),
                LogFormat::Full => fmt::layer().with_writer(file_writer).boxed(),
            };
            let console_layer = match config.format {
                LogFormat::Json => fmt::layer().json().with_writer(std::io::stdout).boxed(),
                LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stdout).boxed(),
                LogFormat::Full => fmt::layer().with_writer(std::io::stdout).boxed(),
            };

            registry.with(file_layer).with(console_layer).init();
        }
        None => {
            let console_layer = match config.format {
                LogFormat::Json => fmt::layer().json().boxed(),
                LogFormat::Compact => fmt::layer().compact().boxed(),
                LogFormat::Full => fmt::layer().boxed(),
            };
            registry.with(console_layer).init();
        }
    }

    info!(node_id, level = %config.level, "logging initialized");
    Ok(())
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(crate::Error::parse("invalid log level")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("Error").unwrap(), Level::ERROR);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(parse_log_level("invalid").is_err());
    }
}
