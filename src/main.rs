use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use hoopline::cli::{Args, Command};
use hoopline::config::Config;
use hoopline::error::AppError;
use hoopline::etl::LoadOptions;
use hoopline::logging::setup_logging;
use hoopline::pipeline;
use hoopline::season;
use hoopline::{NbaApiClient, Storage};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match setup_logging(&args).await {
        Ok((log_file_path, guard)) => {
            info!("Logs are being written to: {log_file_path}");
            guard
        }
        Err(e) => {
            eprintln!("Failed to set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("Fatal error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the parsed command. Returns whether every stage ran to
/// completion, which drives the exit code. Individual entity failures do
/// not fail a command: they are ledgered and picked up on the next pass.
async fn run(args: Args) -> Result<bool, AppError> {
    let config = Config::load().await?;

    let storage = Storage::connect(&config.database_url).await?;

    // Resolved up front: the match below moves fields out of `args`.
    let failure_log_dir = log_dir(&args);

    match args.command {
        Command::InitDb => {
            storage.init_schema().await?;
            info!("Database schema initialized at {}", config.database_url);
            Ok(true)
        }
        Command::Backfill {
            seasons,
            sleep,
            limit,
        } => {
            for season_label in &seasons {
                season::validate_season_label(season_label)?;
            }
            storage.init_schema().await?;

            let client = NbaApiClient::new(&config)?;
            let mut options = LoadOptions::from_config(&config, failure_log_dir);
            if let Some(sleep) = sleep {
                options.sleep_seconds = sleep;
            }
            options.limit = limit;

            let failed = pipeline::backfill_seasons(&client, &storage, &seasons, &options).await;
            Ok(failed.is_empty())
        }
        Command::Daily { season } => {
            storage.init_schema().await?;

            let client = NbaApiClient::new(&config)?;
            let options = LoadOptions::from_config(&config, failure_log_dir);
            let season_override = season.or_else(|| config.season_override.clone());

            let summary =
                pipeline::run_daily(&client, &storage, season_override.as_deref(), &options)
                    .await?;
            if !summary.is_clean() {
                warn!("Daily run finished with per-game failures; the next pass will retry them.");
            }
            // Per-game failures are ledgered and retried on the next pass;
            // only a stage-level error above fails the command.
            Ok(true)
        }
    }
}

/// Failure logs live next to the main log file.
fn log_dir(args: &Args) -> PathBuf {
    args.log_file
        .as_ref()
        .and_then(|p| Path::new(p).parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(hoopline::config::get_log_dir_path()))
}
