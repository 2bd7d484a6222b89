//! Spine discovery: fetches the season's game list and records the unique
//! game ids that anchor every later reconciliation pass.

use serde_json::Value;
use tracing::info;

use crate::api::NbaApiClient;
use crate::db::Storage;
use crate::error::AppError;
use crate::etl::parsing::parse_string;
use crate::etl::retry::{call_with_retries, RetryPolicy};

/// Result set root keys seen across game finder endpoint versions.
const RESULT_SET_KEYS: [&str; 2] = ["resultSets", "resultSet"];

/// Extracts unique game ids from a game finder document.
///
/// The source returns one row per team per game, tabular: a headers array
/// naming the columns and a rowSet of value arrays. Only finished games
/// carry a win/loss value; rows without one are scheduled or in progress
/// and are excluded. Ids are deduplicated preserving first-seen order.
pub fn extract_game_ids(doc: &Value, season: &str) -> Result<Vec<String>, AppError> {
    let result_sets = RESULT_SET_KEYS
        .iter()
        .find_map(|k| doc.get(*k).and_then(Value::as_array))
        .ok_or_else(|| AppError::extraction(season, "no result sets in game finder document"))?;

    let table = result_sets
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::extraction(season, "empty result sets in game finder document"))?;

    let headers: Vec<&str> = table
        .get("headers")
        .and_then(Value::as_array)
        .map(|hs| hs.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let game_id_idx = headers
        .iter()
        .position(|h| *h == "GAME_ID")
        .ok_or_else(|| {
            AppError::extraction(season, format!("expected GAME_ID column, got {headers:?}"))
        })?;
    let wl_idx = headers.iter().position(|h| *h == "WL");

    let rows = table
        .get("rowSet")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::extraction(season, "no rowSet in game finder document"))?;

    let mut game_ids = Vec::new();
    for row in rows {
        let Some(cells) = row.as_array() else {
            continue;
        };
        // Rows with no WL value are unfinished games.
        if let Some(idx) = wl_idx {
            if cells.get(idx).map(Value::is_null).unwrap_or(true) {
                continue;
            }
        }
        let Some(game_id) = cells.get(game_id_idx).and_then(|v| parse_string(v)) else {
            continue;
        };
        if !game_ids.contains(&game_id) {
            game_ids.push(game_id);
        }
    }

    Ok(game_ids)
}

/// Spine stage: fetch the season's game list and insert new game ids.
/// Returns (attempted, inserted). Existing ids are untouched, so the spine
/// only ever grows.
pub async fn load_spine(
    client: &NbaApiClient,
    storage: &Storage,
    season: &str,
    policy: &RetryPolicy,
) -> Result<(usize, u64), AppError> {
    let doc = call_with_retries(|| client.fetch_game_finder(season), policy).await?;
    let game_ids = extract_game_ids(&doc, season)?;
    info!("Fetched {} unique game ids for {season}", game_ids.len());

    let inserted = storage.insert_spine_entries(&game_ids, season).await?;
    info!(
        "Spine load for {season}: attempted {}, inserted {inserted} new",
        game_ids.len()
    );
    Ok((game_ids.len(), inserted))
}
