//! Storage schema bootstrap.
//!
//! All statements are `CREATE TABLE IF NOT EXISTS`, so applying the schema
//! is safe to re-run against an existing database.

use sqlx::SqlitePool;

use crate::error::AppError;

/// DDL applied by `init-db`, in dependency order (spine first).
pub const SCHEMA_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS spine (
        game_id TEXT PRIMARY KEY,
        season  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS games (
        game_id           TEXT PRIMARY KEY,
        season            TEXT NOT NULL,
        game_date         TEXT NOT NULL,
        game_datetime_utc TEXT,
        home_team_id      INTEGER NOT NULL,
        away_team_id      INTEGER NOT NULL,
        status            TEXT,
        arena_name        TEXT,
        arena_city        TEXT,
        arena_state       TEXT,
        last_updated_at   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        team_id         INTEGER PRIMARY KEY,
        abbreviation    TEXT,
        team_name       TEXT,
        city            TEXT,
        full_name       TEXT,
        last_updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS players (
        player_id       INTEGER PRIMARY KEY,
        full_name       TEXT,
        first_name      TEXT,
        last_name       TEXT,
        position        TEXT,
        last_updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS team_boxscores (
        game_id          TEXT NOT NULL,
        team_id          INTEGER NOT NULL,
        season           TEXT NOT NULL,
        is_home          INTEGER,
        opponent_team_id INTEGER,
        minutes          TEXT,
        pts  INTEGER, fgm INTEGER, fga INTEGER,
        fg3m INTEGER, fg3a INTEGER,
        ftm  INTEGER, fta INTEGER,
        oreb INTEGER, dreb INTEGER, reb INTEGER,
        ast  INTEGER, stl INTEGER, blk INTEGER,
        tov  INTEGER, pf INTEGER,
        off_rating REAL,
        def_rating REAL,
        net_rating REAL,
        pace       REAL,
        ts_pct     REAL,
        last_updated_at TEXT NOT NULL,
        PRIMARY KEY (game_id, team_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_boxscores (
        game_id          TEXT NOT NULL,
        player_id        INTEGER NOT NULL,
        team_id          INTEGER NOT NULL,
        season           TEXT NOT NULL,
        is_home          INTEGER,
        opponent_team_id INTEGER,
        starter_flag     INTEGER,
        minutes          TEXT,
        pts  INTEGER, reb INTEGER, ast INTEGER,
        stl  INTEGER, blk INTEGER, tov INTEGER, pf INTEGER,
        fgm  INTEGER, fga INTEGER,
        fg3m INTEGER, fg3a INTEGER,
        ftm  INTEGER, fta INTEGER,
        plus_minus INTEGER,
        last_updated_at TEXT NOT NULL,
        PRIMARY KEY (game_id, player_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS etl_errors (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        process_name  TEXT NOT NULL,
        game_id       TEXT,
        error_type    TEXT NOT NULL,
        error_message TEXT NOT NULL,
        stack_trace   TEXT,
        retry_count   INTEGER NOT NULL DEFAULT 0,
        is_resolved   INTEGER NOT NULL DEFAULT 0,
        created_at    TEXT NOT NULL,
        resolved_at   TEXT
    )
    "#,
];

/// Applies the schema inside one transaction: either all DDL applies, or none.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for ddl in SCHEMA_DDL {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}
