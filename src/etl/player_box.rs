//! Player boxscore stage: one row per player appearing in a game's
//! traditional boxscore document, plus deduplicated player identity seeds.

use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::api::NbaApiClient;
use crate::db::Storage;
use crate::error::AppError;
use crate::etl::errors::{append_failure_log, log_etl_error, mark_error_resolved};
use crate::etl::parsing::{parse_bool, parse_int, parse_string};
use crate::etl::retry::call_with_retries;
use crate::etl::validate::{summarize, validate_player_boxscore};
use crate::etl::{probe_root, LoadOptions, LoadReport};
use crate::models::{MissingBoxGame, PlayerBoxRow, PlayerDimRow};

pub const PROCESS_NAME: &str = "load_playerbox";

const ROOT_KEYS: [&str; 3] = [
    "boxScoreTraditional",
    "boxScoreTraditionalV3",
    "boxScoreTraditionalv3",
];

fn stat_int(stats: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| stats.get(*k).and_then(parse_int))
}

fn full_name_of(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let joined = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn shape_player(
    player: &Value,
    team_id: i64,
    game: &MissingBoxGame,
) -> Option<(PlayerDimRow, PlayerBoxRow)> {
    let player_id = ["personId", "playerId", "id"]
        .iter()
        .find_map(|k| player.get(*k).and_then(parse_int))?;

    let first_name = player.get("firstName").and_then(parse_string);
    let last_name = ["familyName", "lastName"]
        .iter()
        .find_map(|k| player.get(*k).and_then(parse_string));
    let seed = PlayerDimRow {
        player_id,
        full_name: full_name_of(first_name.as_deref(), last_name.as_deref()),
        first_name,
        last_name,
        position: player.get("position").and_then(parse_string),
    };

    let is_home = if team_id == game.home_team_id {
        Some(true)
    } else if team_id == game.away_team_id {
        Some(false)
    } else {
        None
    };
    let opponent_team_id = match is_home {
        Some(true) => Some(game.away_team_id),
        Some(false) => Some(game.home_team_id),
        None => None,
    };

    let empty = Value::Null;
    let stats = player.get("statistics").unwrap_or(&empty);

    let row = PlayerBoxRow {
        game_id: game.game_id.clone(),
        player_id,
        team_id,
        season: game.season.clone(),
        is_home,
        opponent_team_id,
        starter_flag: player.get("starter").and_then(parse_bool),
        minutes: stats.get("minutes").and_then(parse_string),

        pts: stat_int(stats, &["points", "pts"]),
        reb: stat_int(stats, &["reboundsTotal", "reb"]),
        ast: stat_int(stats, &["assists", "ast"]),
        stl: stat_int(stats, &["steals", "stl"]),
        blk: stat_int(stats, &["blocks", "blk"]),
        tov: stat_int(stats, &["turnovers", "tov"]),
        pf: stat_int(stats, &["foulsPersonal", "pf"]),
        fgm: stat_int(stats, &["fieldGoalsMade", "fgm"]),
        fga: stat_int(stats, &["fieldGoalsAttempted", "fga"]),
        fg3m: stat_int(stats, &["threePointersMade", "fg3m"]),
        fg3a: stat_int(stats, &["threePointersAttempted", "fg3a"]),
        ftm: stat_int(stats, &["freeThrowsMade", "ftm"]),
        fta: stat_int(stats, &["freeThrowsAttempted", "fta"]),
        plus_minus: stat_int(stats, &["plusMinusPoints", "plusMinus"]),
    };

    Some((seed, row))
}

/// Extracts every player line from a traditional boxscore document, plus
/// one identity seed per distinct player id.
///
/// A document yielding zero player rows is a shape failure: writing nothing
/// would leave the game permanently "missing" while looking processed in
/// the logs.
pub fn extract_player_boxscores(
    doc: &Value,
    game: &MissingBoxGame,
) -> Result<(Vec<PlayerDimRow>, Vec<PlayerBoxRow>), AppError> {
    let root = probe_root(doc, &ROOT_KEYS);

    let mut seeds: Vec<PlayerDimRow> = Vec::new();
    let mut rows: Vec<PlayerBoxRow> = Vec::new();

    for side in ["homeTeam", "awayTeam"] {
        let Some(team_obj) = root.get(side).filter(|v| v.is_object()) else {
            continue;
        };
        let Some(team_id) = ["teamId", "teamID", "id"]
            .iter()
            .find_map(|k| team_obj.get(*k).and_then(parse_int))
        else {
            continue;
        };
        let Some(players) = team_obj.get("players").and_then(Value::as_array) else {
            continue;
        };
        for player in players {
            if let Some((seed, row)) = shape_player(player, team_id, game) {
                if !seeds.iter().any(|s| s.player_id == seed.player_id) {
                    seeds.push(seed);
                }
                rows.push(row);
            }
        }
    }

    if rows.is_empty() {
        return Err(AppError::extraction(
            &game.game_id,
            "no player rows in traditional boxscore document",
        ));
    }

    Ok((seeds, rows))
}

async fn process_game(
    client: &NbaApiClient,
    game: &MissingBoxGame,
    options: &LoadOptions,
) -> Result<(Vec<PlayerDimRow>, Vec<PlayerBoxRow>), AppError> {
    let doc =
        call_with_retries(|| client.fetch_boxscore_traditional(&game.game_id), &options.retry)
            .await?;
    let (seeds, rows) = extract_player_boxscores(&doc, game)?;

    // Same posture as the team stage: flagged lines are written anyway.
    for row in &rows {
        let violations = validate_player_boxscore(row);
        if !violations.is_empty() {
            warn!(
                "Validation issues for game_id={} player_id={}: {}",
                row.game_id,
                row.player_id,
                summarize(&violations)
            );
        }
    }

    Ok((seeds, rows))
}

/// Player boxscore reconciliation pass over every structured game in the
/// season lacking player rows.
pub async fn load_player_boxscores(
    client: &NbaApiClient,
    storage: &Storage,
    season: &str,
    options: &LoadOptions,
) -> Result<LoadReport, AppError> {
    let mut missing = storage.games_missing_player_box(season).await?;
    if let Some(limit) = options.limit {
        missing.truncate(limit);
    }

    if missing.is_empty() {
        info!("No missing player boxscores found. player_boxscores is up to date.");
        return Ok(LoadReport::default());
    }
    info!("Found {} games missing player_boxscores.", missing.len());

    let mut report = LoadReport {
        attempted: missing.len(),
        ..Default::default()
    };

    for (i, game) in missing.iter().enumerate() {
        let outcome = match process_game(client, game, options).await {
            Ok((seeds, rows)) => {
                let count = rows.len();
                storage
                    .write_player_box_rows(&seeds, &rows)
                    .await
                    .map(|()| count)
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(count) => {
                report.record_success();
                info!(
                    "[{}/{}] Loaded player_boxscores for game_id={} (rows={count})",
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
                    "ERROR loading player_boxscores for game_id={}: {e}",
                    game.game_id
                );
                log_etl_error(storage, PROCESS_NAME, &e, Some(&game.game_id), 0).await;
                append_failure_log(&options.log_dir, "playerbox", &game.game_id, &e);
            }
        }

        sleep(Duration::from_secs_f64(options.sleep_seconds)).await;
    }

    info!("Player boxscore load complete. {report}");
    Ok(report)
}
