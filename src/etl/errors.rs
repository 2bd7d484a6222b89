//! Persistent error ledger.
//!
//! Every per-entity failure lands in the `etl_errors` table so a later run
//! can find, retry and resolve it. Ledger writes are best effort: a broken
//! ledger must never take down the pass that is trying to report a failure,
//! so [`log_etl_error`] swallows its own database errors after logging them.
//!
//! Each stage additionally appends failed game ids to a plain text file
//! under the log directory, one line per failure, for quick grepping.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::db::Storage;
use crate::error::AppError;

/// Records a failure in the ledger. Never fails; a ledger write error is
/// logged and dropped so the caller's control flow stays simple.
pub async fn log_etl_error(
    storage: &Storage,
    process_name: &str,
    error: &AppError,
    game_id: Option<&str>,
    retry_count: i64,
) {
    let result = sqlx::query(
        "INSERT INTO etl_errors (
             process_name, game_id, error_type, error_message, retry_count, created_at
         ) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(process_name)
    .bind(game_id)
    .bind(error.kind())
    .bind(error.to_string())
    .bind(retry_count)
    .bind(Utc::now())
    .execute(storage.pool())
    .await;

    match result {
        Ok(_) => debug!("Logged error to ledger: {process_name} - {game_id:?}"),
        Err(db_error) => {
            error!("Failed to log error to ledger: {db_error}");
            error!("Original error: {error}");
        }
    }
}

/// Marks every unresolved ledger entry for a game/process pair as resolved.
/// Called after an entity that failed on a previous pass loads successfully.
/// Returns the number of entries resolved.
pub async fn mark_error_resolved(
    storage: &Storage,
    process_name: &str,
    game_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE etl_errors
         SET is_resolved = 1, resolved_at = ?
         WHERE process_name = ? AND game_id = ? AND is_resolved = 0",
    )
    .bind(Utc::now())
    .bind(process_name)
    .bind(game_id)
    .execute(storage.pool())
    .await?;

    let count = result.rows_affected();
    if count > 0 {
        info!("Marked {count} error(s) as resolved: {process_name} - {game_id}");
    }
    Ok(count)
}

/// Game ids with unresolved ledger entries for a process, in game id order.
pub async fn failed_game_ids(
    storage: &Storage,
    process_name: &str,
    limit: Option<i64>,
) -> Result<Vec<String>, AppError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT game_id
         FROM etl_errors
         WHERE process_name = ? AND is_resolved = 0 AND game_id IS NOT NULL
         ORDER BY game_id
         LIMIT ?",
    )
    .bind(process_name)
    .bind(limit.unwrap_or(1000))
    .fetch_all(storage.pool())
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Unresolved entry count for a process, for end-of-run summaries.
pub async fn unresolved_count(storage: &Storage, process_name: &str) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM etl_errors
         WHERE process_name = ? AND is_resolved = 0",
    )
    .bind(process_name)
    .fetch_one(storage.pool())
    .await?;
    Ok(count)
}

/// Appends a failed game to the stage's plain text failure log.
/// Best effort, same posture as the ledger write.
pub fn append_failure_log(log_dir: &Path, stage: &str, game_id: &str, err: &AppError) {
    let path = log_dir.join(format!("failed_{stage}.txt"));
    let result = std::fs::create_dir_all(log_dir).and_then(|_| {
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{game_id}\t{}\t{err}", err.kind())
    });
    if let Err(io_error) = result {
        error!("Failed to append to {}: {io_error}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> Storage {
        let storage = Storage::connect_in_memory().await.unwrap();
        storage.init_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_ledger_round_trip() {
        let storage = storage().await;
        let err = AppError::extraction("0022400123", "no rows");

        log_etl_error(&storage, "load_teambox", &err, Some("0022400123"), 0).await;
        log_etl_error(&storage, "load_teambox", &err, Some("0022400123"), 1).await;
        log_etl_error(&storage, "load_playerbox", &err, Some("0022400456"), 0).await;

        let failed = failed_game_ids(&storage, "load_teambox", None).await.unwrap();
        assert_eq!(failed, vec!["0022400123".to_string()]);
        assert_eq!(unresolved_count(&storage, "load_teambox").await.unwrap(), 2);

        let resolved = mark_error_resolved(&storage, "load_teambox", "0022400123")
            .await
            .unwrap();
        assert_eq!(resolved, 2);
        assert!(failed_game_ids(&storage, "load_teambox", None)
            .await
            .unwrap()
            .is_empty());

        // The other process is untouched.
        assert_eq!(
            unresolved_count(&storage, "load_playerbox").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let storage = storage().await;
        let err = AppError::validation("0022400123", "fgm > fga");
        log_etl_error(&storage, "load_games", &err, Some("0022400123"), 0).await;

        assert_eq!(
            mark_error_resolved(&storage, "load_games", "0022400123")
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            mark_error_resolved(&storage, "load_games", "0022400123")
                .await
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_failure_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppError::extraction("0022400123", "no rows");
        append_failure_log(dir.path(), "teambox", "0022400123", &err);
        append_failure_log(dir.path(), "teambox", "0022400456", &err);

        let content = std::fs::read_to_string(dir.path().join("failed_teambox.txt")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0022400123\tExtraction\t"));
    }
}
