//! Pipeline orchestrator.
//!
//! Runs the four stages for a season in dependency order: spine discovery,
//! game structure, team boxscores, player boxscores. Each stage only needs
//! what the previous stage has durably committed, so a run that dies halfway
//! resumes exactly where it left off on the next invocation.

use std::time::Instant;

use tracing::{error, info};

use crate::api::NbaApiClient;
use crate::db::Storage;
use crate::error::AppError;
use crate::etl::{player_box, spine, structure, team_box, LoadOptions, LoadReport};
use crate::season;

/// Per-stage outcome counts for one season run.
#[derive(Debug, Default)]
pub struct SeasonSummary {
    pub season: String,
    pub spine_attempted: usize,
    pub spine_inserted: u64,
    pub structure: LoadReport,
    pub team_box: LoadReport,
    pub player_box: LoadReport,
}

impl SeasonSummary {
    /// True when no stage recorded a per-entity failure.
    pub fn is_clean(&self) -> bool {
        self.structure.is_clean() && self.team_box.is_clean() && self.player_box.is_clean()
    }
}

/// Runs the full pipeline for one season.
///
/// A stage-level failure aborts the remaining stages of this run; entities
/// already committed by completed stages stay put, so the next run picks up
/// only what is still missing.
pub async fn run_season(
    client: &NbaApiClient,
    storage: &Storage,
    season_label: &str,
    options: &LoadOptions,
) -> Result<SeasonSummary, AppError> {
    season::validate_season_label(season_label)?;
    let start = Instant::now();

    info!("Starting pipeline run for season {season_label}");
    let mut summary = SeasonSummary {
        season: season_label.to_string(),
        ..Default::default()
    };

    let run = async {
        info!("[1/4] Loading game spine for {season_label}");
        let (attempted, inserted) =
            spine::load_spine(client, storage, season_label, &options.retry).await?;
        summary.spine_attempted = attempted;
        summary.spine_inserted = inserted;

        info!("[2/4] Loading game structure for {season_label}");
        summary.structure =
            structure::load_game_structure(client, storage, season_label, options).await?;

        info!("[3/4] Loading team boxscores for {season_label}");
        summary.team_box =
            team_box::load_team_boxscores(client, storage, season_label, options).await?;

        info!("[4/4] Loading player boxscores for {season_label}");
        summary.player_box =
            player_box::load_player_boxscores(client, storage, season_label, options).await?;

        Ok::<(), AppError>(())
    }
    .await;

    let elapsed = start.elapsed().as_secs_f64();
    match run {
        Ok(()) => {
            info!(
                "Completed pipeline run for season {season_label} in {elapsed:.2}s \
                 (structure {}; teambox {}; playerbox {})",
                summary.structure, summary.team_box, summary.player_box
            );
            Ok(summary)
        }
        Err(e) => {
            error!("Pipeline run for season {season_label} failed after {elapsed:.2}s: {e}");
            Err(e)
        }
    }
}

/// Backfills several seasons sequentially. A failed season is reported and
/// does not stop the remaining ones. Returns the failed season labels.
pub async fn backfill_seasons(
    client: &NbaApiClient,
    storage: &Storage,
    seasons: &[String],
    options: &LoadOptions,
) -> Vec<String> {
    let mut failed = Vec::new();
    for (i, season_label) in seasons.iter().enumerate() {
        info!(
            "Processing season {}/{}: {season_label}",
            i + 1,
            seasons.len()
        );
        if run_season(client, storage, season_label, options).await.is_err() {
            failed.push(season_label.clone());
        }
    }

    info!(
        "Backfill summary: {} season(s), {} succeeded, {} failed",
        seasons.len(),
        seasons.len() - failed.len(),
        failed.len()
    );
    if !failed.is_empty() {
        error!("Failed seasons: {}", failed.join(", "));
    }
    failed
}

/// One daily incremental pass for the current (or pinned) season.
pub async fn run_daily(
    client: &NbaApiClient,
    storage: &Storage,
    season_override: Option<&str>,
    options: &LoadOptions,
) -> Result<SeasonSummary, AppError> {
    let season_label = match season_override {
        Some(s) => {
            info!("Using pinned season: {s}");
            s.to_string()
        }
        None => {
            let detected = season::current_season();
            info!("Auto-detected current season: {detected}");
            detected
        }
    };
    run_season(client, storage, &season_label, options).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_season_rejects_bad_label() {
        let storage = Storage::connect_in_memory().await.unwrap();
        storage.init_schema().await.unwrap();
        let client = NbaApiClient::with_base_url("http://127.0.0.1:9").unwrap();

        let result = run_season(&client, &storage, "2024-2025", &LoadOptions::default()).await;
        assert!(matches!(result, Err(AppError::InvalidSeason(_))));
    }

    #[test]
    fn test_summary_clean_flag() {
        let mut summary = SeasonSummary::default();
        assert!(summary.is_clean());
        summary.team_box.failed = 1;
        assert!(!summary.is_clean());
    }
}
