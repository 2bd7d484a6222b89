//! Structure stage: turns a boxscore summary document into one games row
//! plus team dimension rows, then backfills every spine game missing one.

use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::api::NbaApiClient;
use crate::db::Storage;
use crate::error::AppError;
use crate::etl::errors::{append_failure_log, log_etl_error, mark_error_resolved};
use crate::etl::parsing::{parse_int, parse_string};
use crate::etl::retry::call_with_retries;
use crate::etl::validate::{summarize, validate_game};
use crate::etl::{probe_root, LoadOptions, LoadReport};
use crate::models::{GameRow, TeamDimRow};

pub const PROCESS_NAME: &str = "load_games";

/// Document roots seen across summary endpoint versions.
const ROOT_KEYS: [&str; 3] = ["boxScoreSummary", "boxScoreSummaryV3", "boxScoreSummaryv3"];

/// Pulls one of several alternate keys from a team identity object.
fn first_string(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(parse_string))
}

fn team_dim_from_obj(obj: &Value, fallback_id: i64) -> TeamDimRow {
    let team_id = obj
        .get("teamId")
        .and_then(parse_int)
        .or_else(|| obj.get("id").and_then(parse_int))
        .unwrap_or(fallback_id);
    let city = first_string(obj, &["teamCity", "city"]);
    let name = first_string(obj, &["teamName", "name", "nickname"]);
    let full_name = match (&city, &name) {
        (Some(c), Some(n)) => Some(format!("{c} {n}")),
        _ => name.clone(),
    };
    TeamDimRow {
        team_id,
        abbreviation: first_string(obj, &["teamTricode", "abbreviation"]),
        team_name: name,
        city,
        full_name,
    }
}

/// Extracts one games row and up to two team dimension rows from a boxscore
/// summary document. The team identifiers and a date are essential: without
/// them every downstream stage would mis-join, so their absence fails the
/// extraction rather than producing a partial row.
pub fn extract_game_structure(
    doc: &Value,
    game_id: &str,
    season: &str,
) -> Result<(GameRow, Vec<TeamDimRow>), AppError> {
    let root = probe_root(doc, &ROOT_KEYS);
    if !root.is_object() || root.as_object().is_some_and(|m| m.is_empty()) {
        return Err(AppError::extraction(
            game_id,
            "no boxScoreSummary object in document",
        ));
    }

    let home_team_id = root.get("homeTeamId").and_then(parse_int);
    let away_team_id = root.get("awayTeamId").and_then(parse_int);
    let (Some(home_team_id), Some(away_team_id)) = (home_team_id, away_team_id) else {
        return Err(AppError::extraction(
            game_id,
            "missing homeTeamId/awayTeamId in boxScoreSummary",
        ));
    };

    let game_time_utc = root.get("gameTimeUTC").and_then(parse_string);
    let game_et = root.get("gameEt").and_then(parse_string);
    let raw_date = game_time_utc.clone().or(game_et).ok_or_else(|| {
        AppError::extraction(game_id, "missing gameTimeUTC/gameEt in boxScoreSummary")
    })?;
    let game_date = raw_date.chars().take(10).collect::<String>();

    let arena = root.get("arena").filter(|v| v.is_object());
    let (arena_name, arena_city, arena_state) = match arena {
        Some(a) => (
            a.get("arenaName").and_then(parse_string),
            a.get("arenaCity").and_then(parse_string),
            a.get("arenaState").and_then(parse_string),
        ),
        None => (None, None, None),
    };

    let mut teams = Vec::new();
    for (side, fallback_id) in [("homeTeam", home_team_id), ("awayTeam", away_team_id)] {
        if let Some(obj) = root.get(side).filter(|v| v.is_object()) {
            teams.push(team_dim_from_obj(obj, fallback_id));
        }
    }
    // One row per distinct team id, first occurrence wins.
    teams.dedup_by_key(|t| t.team_id);

    let game = GameRow {
        game_id: game_id.to_string(),
        season: season.to_string(),
        game_date,
        game_datetime_utc: game_time_utc,
        home_team_id,
        away_team_id,
        status: root.get("gameStatusText").and_then(parse_string),
        arena_name,
        arena_city,
        arena_state,
    };

    Ok((game, teams))
}

/// Fetches and shapes one game's structure, enforcing validation. A game
/// with bad keys would poison every downstream join, so a validation
/// failure here blocks the write.
async fn process_game(
    client: &NbaApiClient,
    game_id: &str,
    season: &str,
    options: &LoadOptions,
) -> Result<(GameRow, Vec<TeamDimRow>), AppError> {
    let doc = call_with_retries(|| client.fetch_boxscore_summary(game_id), &options.retry).await?;
    let (game, teams) = extract_game_structure(&doc, game_id, season)?;

    let violations = validate_game(&game);
    if !violations.is_empty() {
        return Err(AppError::validation(game_id, summarize(&violations)));
    }
    Ok((game, teams))
}

/// Structure reconciliation pass: backfill every spine game in the season
/// that has no games row yet. Per-game failures are recorded and skipped.
pub async fn load_game_structure(
    client: &NbaApiClient,
    storage: &Storage,
    season: &str,
    options: &LoadOptions,
) -> Result<LoadReport, AppError> {
    let mut missing = storage.missing_games(season).await?;
    if let Some(limit) = options.limit {
        missing.truncate(limit);
    }

    if missing.is_empty() {
        info!("No missing games found. Game structure is up to date.");
        return Ok(LoadReport::default());
    }
    info!("Found {} spine games missing from games.", missing.len());

    let mut report = LoadReport {
        attempted: missing.len(),
        ..Default::default()
    };

    for (i, entry) in missing.iter().enumerate() {
        match process_game(client, &entry.game_id, &entry.season, options).await {
            Ok((game, teams)) => match storage.write_game_structure(&game, &teams).await {
                Ok(()) => {
                    report.record_success();
                    info!(
                        "[{}/{}] Loaded game structure for game_id={}",
                        i + 1,
                        missing.len(),
                        entry.game_id
                    );
                    // Ledger bookkeeping stays best effort: a broken ledger
                    // must not abort the rest of the pass.
                    if let Err(e) = mark_error_resolved(storage, PROCESS_NAME, &entry.game_id).await
                    {
                        error!(
                            "Failed to resolve ledger entries for game_id={}: {e}",
                            entry.game_id
                        );
                    }
                }
                Err(e) => {
                    report.record_failure();
                    error!("ERROR persisting game_id={}: {e}", entry.game_id);
                    log_etl_error(storage, PROCESS_NAME, &e, Some(&entry.game_id), 0).await;
                    append_failure_log(&options.log_dir, "games", &entry.game_id, &e);
                }
            },
            Err(e) => {
                report.record_failure();
                error!("ERROR loading game_id={}: {e}", entry.game_id);
                log_etl_error(storage, PROCESS_NAME, &e, Some(&entry.game_id), 0).await;
                append_failure_log(&options.log_dir, "games", &entry.game_id, &e);
            }
        }

        sleep(Duration::from_secs_f64(options.sleep_seconds)).await;
    }

    info!("Game structure complete. {report}");
    Ok(report)
}
