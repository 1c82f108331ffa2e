use crate::error::AppError;
use std::io::stdout;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILE_NAME: &str = "nhl_etl.log";
const DEFAULT_DIRECTIVE: &str = "nhl_etl=info";

/// Splits an optional custom log path into directory and file name, falling
/// back to the default log directory.
fn log_location(custom_log_path: Option<&str>, default_dir: &str) -> (String, String) {
    match custom_log_path {
        Some(custom_path) => {
            let path = Path::new(custom_path);
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_LOG_FILE_NAME);
            (parent.to_string_lossy().to_string(), file_name.to_string())
        }
        None => (default_dir.to_string(), DEFAULT_LOG_FILE_NAME.to_string()),
    }
}

fn env_filter() -> Result<EnvFilter, AppError> {
    let directive = DEFAULT_DIRECTIVE
        .parse()
        .map_err(|e| AppError::log_setup_error(format!("Invalid log directive: {e}")))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Sets up logging for the application.
///
/// - Always logs to a daily rolling file, in `custom_log_path`'s directory
///   or the default log directory
/// - Also logs to stdout unless `quiet`
/// - `RUST_LOG` adds to the default `nhl_etl=info` directive
///
/// Returns the path to the log file and the guard that must be kept alive
/// for the duration of the program to ensure proper log flushing.
pub async fn setup_logging(
    custom_log_path: Option<&str>,
    default_dir: &str,
    quiet: bool,
) -> Result<(String, WorkerGuard), AppError> {
    let (log_dir, log_file_name) = log_location(custom_log_path, default_dir);

    // Create log directory if it doesn't exist
    if !Path::new(&log_dir).exists() {
        tokio::fs::create_dir_all(&log_dir).await.map_err(|e| {
            AppError::log_setup_error(format!("Failed to create log directory: {e}"))
        })?;
    }

    // Set up a rolling file appender that creates a new log file each day
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, &log_file_name);

    // The guard must be kept alive for the duration of the program
    // to ensure logs are flushed properly
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::Layer::new()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter()?);
    let stdout_layer = (!quiet).then(|| {
        env_filter().map(|filter| {
            fmt::Layer::new()
                .with_writer(stdout)
                .with_ansi(true)
                .with_filter(filter)
        })
    });
    let stdout_layer = stdout_layer.transpose()?;

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| AppError::log_setup_error(format!("Failed to install subscriber: {e}")))?;

    let log_file_path = format!("{log_dir}/{log_file_name}");
    Ok((log_file_path, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_location_defaults() {
        let (dir, file) = log_location(None, "/var/log/nhl_etl");
        assert_eq!(dir, "/var/log/nhl_etl");
        assert_eq!(file, "nhl_etl.log");
    }

    #[test]
    fn test_log_location_custom_path() {
        let (dir, file) = log_location(Some("/tmp/etl/run.log"), "/unused");
        assert_eq!(dir, "/tmp/etl");
        assert_eq!(file, "run.log");

        let (dir, file) = log_location(Some("run.log"), "/unused");
        assert_eq!(dir, ".");
        assert_eq!(file, "run.log");
    }

    #[test]
    fn test_default_directive_parses() {
        assert!(env_filter().is_ok());
    }
}
