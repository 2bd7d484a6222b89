use crate::cli::Args;
use crate::config::{get_log_dir_path, Config};
use crate::error::AppError;
use std::io::stdout;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sets up logging to both stdout and a daily rolling log file.
///
/// The log file location comes from `--log-file`, then the config file, then
/// the platform default. The directory is created if missing.
///
/// Returns the log file path and the guard that must be kept alive for the
/// duration of the program to ensure proper log flushing.
pub async fn setup_logging(args: &Args) -> Result<(String, WorkerGuard), AppError> {
    let config_log_path = Config::load()
        .await
        .ok()
        .and_then(|config| config.log_file_path);

    let custom_log_path = args.log_file.as_ref().or(config_log_path.as_ref());
    let (log_dir, log_file_name) = match custom_log_path {
        Some(custom_path) => {
            let path = Path::new(custom_path);
            let parent = path.parent().unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("hoopline.log");
            (parent.to_string_lossy().to_string(), file_name.to_string())
        }
        None => (get_log_dir_path(), "hoopline.log".to_string()),
    };

    if !Path::new(&log_dir).exists() {
        tokio::fs::create_dir_all(&log_dir).await.map_err(|e| {
            AppError::log_setup_error(format!("Failed to create log directory: {e}"))
        })?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, &log_file_name);

    // The guard must be kept alive for the duration of the program
    // to ensure logs are flushed properly
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::Layer::new()
                .with_writer(stdout)
                .with_ansi(true)
                .with_filter(
                    EnvFilter::from_default_env()
                        .add_directive("hoopline=info".parse().map_err(|e| {
                            AppError::log_setup_error(format!("Invalid log directive: {e}"))
                        })?),
                ),
        )
        .with(
            fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    EnvFilter::from_default_env()
                        .add_directive("hoopline=info".parse().map_err(|e| {
                            AppError::log_setup_error(format!("Invalid log directive: {e}"))
                        })?),
                ),
        )
        .init();

    let log_file_path = format!("{log_dir}/{log_file_name}");
    Ok((log_file_path, guard))
}
