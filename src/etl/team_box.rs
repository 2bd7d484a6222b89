//! Team boxscore stage: merges the traditional and advanced boxscore
//! documents into two per-team aggregate rows per game.

use std::collections::HashMap;

use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::api::NbaApiClient;
use crate::db::Storage;
use crate::error::AppError;
use crate::etl::errors::{append_failure_log, log_etl_error, mark_error_resolved};
use crate::etl::parsing::{parse_float, parse_int, parse_string};
use crate::etl::retry::call_with_retries;
use crate::etl::validate::{summarize, validate_team_boxscore};
use crate::etl::{probe_root, LoadOptions, LoadReport};
use crate::models::{MissingBoxGame, TeamBoxRow};

pub const PROCESS_NAME: &str = "load_teambox";

const TRADITIONAL_ROOTS: [&str; 3] = [
    "boxScoreTraditional",
    "boxScoreTraditionalV3",
    "boxScoreTraditionalv3",
];
const ADVANCED_ROOTS: [&str; 3] = ["boxScoreAdvanced", "boxScoreAdvancedV3", "boxScoreAdvancedv3"];

fn team_id_of(obj: &Value) -> Option<i64> {
    ["teamId", "teamID", "id"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(parse_int))
}

/// Returns team-id-keyed statistics objects from a boxscore document.
///
/// Two shapes are probed: the home/away object pair, then a flat `teams`
/// list. Teams without a resolvable id or a statistics object are dropped.
pub fn extract_team_stats<'a>(doc: &'a Value, root_keys: &[&str]) -> HashMap<i64, &'a Value> {
    let root = probe_root(doc, root_keys);
    let mut out = HashMap::new();

    for side in ["homeTeam", "awayTeam"] {
        let Some(obj) = root.get(side).filter(|v| v.is_object()) else {
            continue;
        };
        if let (Some(tid), Some(stats)) =
            (team_id_of(obj), obj.get("statistics").filter(|v| v.is_object()))
        {
            out.insert(tid, stats);
        }
    }

    if out.is_empty() {
        if let Some(teams) = root.get("teams").and_then(Value::as_array) {
            for obj in teams.iter().filter(|v| v.is_object()) {
                if let (Some(tid), Some(stats)) =
                    (team_id_of(obj), obj.get("statistics").filter(|v| v.is_object()))
                {
                    out.insert(tid, stats);
                }
            }
        }
    }

    out
}

fn stat_int(stats: Option<&&Value>, keys: &[&str]) -> Option<i64> {
    let stats = stats?;
    keys.iter().find_map(|k| stats.get(*k).and_then(parse_int))
}

fn stat_float(stats: Option<&&Value>, keys: &[&str]) -> Option<f64> {
    let stats = stats?;
    keys.iter().find_map(|k| stats.get(*k).and_then(parse_float))
}

/// Builds both team rows for a game from the two stats maps. Either side
/// may be absent from either document; the row still carries whatever was
/// found, since partial aggregates are more useful than none.
pub fn build_team_box_rows(
    game: &MissingBoxGame,
    traditional: &HashMap<i64, &Value>,
    advanced: &HashMap<i64, &Value>,
) -> Vec<TeamBoxRow> {
    let make_row = |team_id: i64, is_home: bool, opponent_team_id: i64| {
        let t = traditional.get(&team_id);
        let a = advanced.get(&team_id);
        TeamBoxRow {
            game_id: game.game_id.clone(),
            team_id,
            season: game.season.clone(),
            is_home: Some(is_home),
            opponent_team_id: Some(opponent_team_id),

            minutes: t.and_then(|s| s.get("minutes")).and_then(parse_string),
            pts: stat_int(t, &["points", "pts"]),
            fgm: stat_int(t, &["fieldGoalsMade", "fgm"]),
            fga: stat_int(t, &["fieldGoalsAttempted", "fga"]),
            fg3m: stat_int(t, &["threePointersMade", "fg3m"]),
            fg3a: stat_int(t, &["threePointersAttempted", "fg3a"]),
            ftm: stat_int(t, &["freeThrowsMade", "ftm"]),
            fta: stat_int(t, &["freeThrowsAttempted", "fta"]),
            oreb: stat_int(t, &["reboundsOffensive", "oreb"]),
            dreb: stat_int(t, &["reboundsDefensive", "dreb"]),
            reb: stat_int(t, &["reboundsTotal", "reb"]),
            ast: stat_int(t, &["assists", "ast"]),
            stl: stat_int(t, &["steals", "stl"]),
            blk: stat_int(t, &["blocks", "blk"]),
            tov: stat_int(t, &["turnovers", "tov"]),
            pf: stat_int(t, &["foulsPersonal", "pf"]),

            off_rating: stat_float(a, &["offensiveRating", "offRating"]),
            def_rating: stat_float(a, &["defensiveRating", "defRating"]),
            net_rating: stat_float(a, &["netRating"]),
            pace: stat_float(a, &["pace"]),
            ts_pct: stat_float(a, &["trueShootingPercentage", "tsPct"]),
        }
    };

    vec![
        make_row(game.home_team_id, true, game.away_team_id),
        make_row(game.away_team_id, false, game.home_team_id),
    ]
}

/// Fetches both boxscore documents for a game and shapes the two team rows.
/// A game where neither document yields any team statistics is a shape
/// failure, not a pair of empty rows.
async fn process_game(
    client: &NbaApiClient,
    game: &MissingBoxGame,
    options: &LoadOptions,
) -> Result<Vec<TeamBoxRow>, AppError> {
    let trad =
        call_with_retries(|| client.fetch_boxscore_traditional(&game.game_id), &options.retry)
            .await?;
    let adv = call_with_retries(|| client.fetch_boxscore_advanced(&game.game_id), &options.retry)
        .await?;

    let trad_by_team = extract_team_stats(&trad, &TRADITIONAL_ROOTS);
    let adv_by_team = extract_team_stats(&adv, &ADVANCED_ROOTS);
    if trad_by_team.is_empty() && adv_by_team.is_empty() {
        return Err(AppError::extraction(
            &game.game_id,
            "no team statistics in traditional or advanced document",
        ));
    }

    let rows = build_team_box_rows(game, &trad_by_team, &adv_by_team);

    // Flagged aggregates are still written; validation here is a signal,
    // not a gate, since the row can be refreshed on a later pass.
    for row in &rows {
        let violations = validate_team_boxscore(row, options.rebound_tolerance);
        if !violations.is_empty() {
            warn!(
                "Validation issues for game_id={} team_id={}: {}",
                row.game_id,
                row.team_id,
                summarize(&violations)
            );
        }
    }

    Ok(rows)
}

/// Team boxscore reconciliation pass over every structured game in the
/// season lacking team rows.
pub async fn load_team_boxscores(
    client: &NbaApiClient,
    storage: &Storage,
    season: &str,
    options: &LoadOptions,
) -> Result<LoadReport, AppError> {
    let mut missing = storage.games_missing_team_box(season).await?;
    if let Some(limit) = options.limit {
        missing.truncate(limit);
    }

    if missing.is_empty() {
        info!("No missing team boxscores found. team_boxscores is up to date.");
        return Ok(LoadReport::default());
    }
    info!("Found {} games missing team_boxscores.", missing.len());

    let mut report = LoadReport {
        attempted: missing.len(),
        ..Default::default()
    };

    for (i, game) in missing.iter().enumerate() {
        let outcome = match process_game(client, game, options).await {
            Ok(rows) => storage.write_team_box_rows(&rows).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                report.record_success();
                info!(
                    "[{}/{}] Loaded team_boxscores for game_id={}",
                    i + 1,
                    missing.len(),
                    game.game_id
                );
                if let Err(e) = mark_error_resolved(storage, PROCESS_NAME, &game.game_id).await {
                    error!(
                        "Failed to resolve ledger entries for game_id={}: {e}",
                        game.game_id
                    );
                }
            }
            Err(e) => {
                report.record_failure();
                error!(
                    "ERROR loading team_boxscores for game_id={}: {e}",
                    game.game_id
                );
                log_etl_error(storage, PROCESS_NAME, &e, Some(&game.game_id), 0).await;
                append_failure_log(&options.log_dir, "teambox", &game.game_id, &e);
            }
        }

        sleep(Duration::from_secs_f64(options.sleep_seconds)).await;
    }

    info!("Team boxscore load complete. {report}");
    Ok(report)
}
