//! Storage handle over SQLite.
//!
//! Every loader talks to the database through [`Storage`], which owns a
//! connection pool and implements the two write contracts the pipeline
//! depends on:
//!
//! - fact tables (`games`, `team_boxscores`, `player_boxscores`) overwrite
//!   every non-key column on conflict, so a re-run refreshes stale rows;
//! - dimension tables (`teams`, `players`) coalesce on conflict, so a null
//!   attribute from one document never erases a value learned from another.
//!
//! Reconciliation queries are anti-joins: spine rows without a games row,
//! games rows without boxscore rows. An entity disappears from the query
//! the moment its output rows commit, which is what makes re-runs cheap.

pub mod schema;

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::{
    GameRow, MissingBoxGame, MissingGame, PlayerBoxRow, PlayerDimRow, SpineEntry, TeamBoxRow,
    TeamDimRow,
};

/// Shared storage handle. Cheap to clone; wraps a pooled connection.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Opens (creating if necessary) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!("Connected to database at {database_url}");
        Ok(Storage { pool })
    }

    /// In-memory database for tests. A single connection keeps all queries
    /// on the same memory instance.
    pub async fn connect_in_memory() -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Storage { pool })
    }

    /// Applies the schema. Safe to call against an existing database.
    pub async fn init_schema(&self) -> Result<(), AppError> {
        schema::init_schema(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- spine ---

    /// Inserts game ids into the spine, ignoring ids already present.
    /// Returns the number of newly inserted rows.
    pub async fn insert_spine_entries(
        &self,
        game_ids: &[String],
        season: &str,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for game_id in game_ids {
            let result = sqlx::query(
                "INSERT INTO spine (game_id, season) VALUES (?, ?)
                 ON CONFLICT (game_id) DO NOTHING",
            )
            .bind(game_id)
            .bind(season)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        debug!(
            "Spine upsert for {season}: {} ids, {inserted} new",
            game_ids.len()
        );
        Ok(inserted)
    }

    /// All spine entries for a season, in stable game id order.
    pub async fn spine_entries(&self, season: &str) -> Result<Vec<SpineEntry>, AppError> {
        let rows = sqlx::query_as::<_, SpineEntry>(
            "SELECT game_id, season FROM spine WHERE season = ? ORDER BY game_id",
        )
        .bind(season)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn spine_count(&self, season: &str) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM spine WHERE season = ?")
            .bind(season)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- reconciliation queries ---

    /// Spine games with no structure row yet, in stable game id order.
    pub async fn missing_games(&self, season: &str) -> Result<Vec<MissingGame>, AppError> {
        let rows = sqlx::query_as::<_, MissingGame>(
            "SELECT s.game_id, s.season
             FROM spine s
             LEFT JOIN games g ON g.game_id = s.game_id
             WHERE s.season = ? AND g.game_id IS NULL
             ORDER BY s.game_id",
        )
        .bind(season)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Structured games with no team boxscore rows yet, oldest game first.
    pub async fn games_missing_team_box(
        &self,
        season: &str,
    ) -> Result<Vec<MissingBoxGame>, AppError> {
        self.games_missing_box(season, "team_boxscores").await
    }

    /// Structured games with no player boxscore rows yet, oldest game first.
    pub async fn games_missing_player_box(
        &self,
        season: &str,
    ) -> Result<Vec<MissingBoxGame>, AppError> {
        self.games_missing_box(season, "player_boxscores").await
    }

    async fn games_missing_box(
        &self,
        season: &str,
        output_table: &str,
    ) -> Result<Vec<MissingBoxGame>, AppError> {
        // Table name comes from the two constants above, never from input.
        let sql = format!(
            "SELECT g.game_id, g.season, g.home_team_id, g.away_team_id
             FROM games g
             LEFT JOIN (SELECT DISTINCT game_id FROM {output_table}) b
                 ON b.game_id = g.game_id
             WHERE g.season = ? AND b.game_id IS NULL
             ORDER BY g.game_date, g.game_id"
        );
        let rows = sqlx::query_as::<_, MissingBoxGame>(&sql)
            .bind(season)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // --- structure stage writes ---

    /// Writes one game's structure output atomically: the games fact row
    /// plus both team dimension rows commit together or not at all.
    pub async fn write_game_structure(
        &self,
        game: &GameRow,
        teams: &[TeamDimRow],
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO games (
                 game_id, season, game_date, game_datetime_utc,
                 home_team_id, away_team_id, status,
                 arena_name, arena_city, arena_state, last_updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (game_id) DO UPDATE SET
                 season = excluded.season,
                 game_date = excluded.game_date,
                 game_datetime_utc = excluded.game_datetime_utc,
                 home_team_id = excluded.home_team_id,
                 away_team_id = excluded.away_team_id,
                 status = excluded.status,
                 arena_name = excluded.arena_name,
                 arena_city = excluded.arena_city,
                 arena_state = excluded.arena_state,
                 last_updated_at = excluded.last_updated_at",
        )
        .bind(&game.game_id)
        .bind(&game.season)
        .bind(&game.game_date)
        .bind(&game.game_datetime_utc)
        .bind(game.home_team_id)
        .bind(game.away_team_id)
        .bind(&game.status)
        .bind(&game.arena_name)
        .bind(&game.arena_city)
        .bind(&game.arena_state)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for team in teams {
            sqlx::query(
                "INSERT INTO teams (
                     team_id, abbreviation, team_name, city, full_name, last_updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT (team_id) DO UPDATE SET
                     abbreviation = COALESCE(excluded.abbreviation, teams.abbreviation),
                     team_name = COALESCE(excluded.team_name, teams.team_name),
                     city = COALESCE(excluded.city, teams.city),
                     full_name = COALESCE(excluded.full_name, teams.full_name),
                     last_updated_at = excluded.last_updated_at",
            )
            .bind(team.team_id)
            .bind(&team.abbreviation)
            .bind(&team.team_name)
            .bind(&team.city)
            .bind(&team.full_name)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // --- team boxscore stage writes ---

    /// Writes both team boxscore rows for a game in one transaction.
    pub async fn write_team_box_rows(&self, rows: &[TeamBoxRow]) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO team_boxscores (
                     game_id, team_id, season, is_home, opponent_team_id, minutes,
                     pts, fgm, fga, fg3m, fg3a, ftm, fta,
                     oreb, dreb, reb, ast, stl, blk, tov, pf,
                     off_rating, def_rating, net_rating, pace, ts_pct,
                     last_updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (game_id, team_id) DO UPDATE SET
                     season = excluded.season,
                     is_home = excluded.is_home,
                     opponent_team_id = excluded.opponent_team_id,
                     minutes = excluded.minutes,
                     pts = excluded.pts, fgm = excluded.fgm, fga = excluded.fga,
                     fg3m = excluded.fg3m, fg3a = excluded.fg3a,
                     ftm = excluded.ftm, fta = excluded.fta,
                     oreb = excluded.oreb, dreb = excluded.dreb, reb = excluded.reb,
                     ast = excluded.ast, stl = excluded.stl, blk = excluded.blk,
                     tov = excluded.tov, pf = excluded.pf,
                     off_rating = excluded.off_rating,
                     def_rating = excluded.def_rating,
                     net_rating = excluded.net_rating,
                     pace = excluded.pace,
                     ts_pct = excluded.ts_pct,
                     last_updated_at = excluded.last_updated_at",
            )
            .bind(&row.game_id)
            .bind(row.team_id)
            .bind(&row.season)
            .bind(row.is_home)
            .bind(row.opponent_team_id)
            .bind(&row.minutes)
            .bind(row.pts)
            .bind(row.fgm)
            .bind(row.fga)
            .bind(row.fg3m)
            .bind(row.fg3a)
            .bind(row.ftm)
            .bind(row.fta)
            .bind(row.oreb)
            .bind(row.dreb)
            .bind(row.reb)
            .bind(row.ast)
            .bind(row.stl)
            .bind(row.blk)
            .bind(row.tov)
            .bind(row.pf)
            .bind(row.off_rating)
            .bind(row.def_rating)
            .bind(row.net_rating)
            .bind(row.pace)
            .bind(row.ts_pct)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // --- player boxscore stage writes ---

    /// Writes one game's player output atomically: dimension seeds first so
    /// every fact row has a corresponding player row, then the fact rows.
    pub async fn write_player_box_rows(
        &self,
        seeds: &[PlayerDimRow],
        rows: &[PlayerBoxRow],
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for seed in seeds {
            sqlx::query(
                "INSERT INTO players (
                     player_id, full_name, first_name, last_name, position, last_updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT (player_id) DO UPDATE SET
                     full_name = COALESCE(excluded.full_name, players.full_name),
                     first_name = COALESCE(excluded.first_name, players.first_name),
                     last_name = COALESCE(excluded.last_name, players.last_name),
                     position = COALESCE(excluded.position, players.position),
                     last_updated_at = excluded.last_updated_at",
            )
            .bind(seed.player_id)
            .bind(&seed.full_name)
            .bind(&seed.first_name)
            .bind(&seed.last_name)
            .bind(&seed.position)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for row in rows {
            sqlx::query(
                "INSERT INTO player_boxscores (
                     game_id, player_id, team_id, season, is_home, opponent_team_id,
                     starter_flag, minutes,
                     pts, reb, ast, stl, blk, tov, pf,
                     fgm, fga, fg3m, fg3a, ftm, fta, plus_minus,
                     last_updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (game_id, player_id) DO UPDATE SET
                     team_id = excluded.team_id,
                     season = excluded.season,
                     is_home = excluded.is_home,
                     opponent_team_id = excluded.opponent_team_id,
                     starter_flag = excluded.starter_flag,
                     minutes = excluded.minutes,
                     pts = excluded.pts, reb = excluded.reb, ast = excluded.ast,
                     stl = excluded.stl, blk = excluded.blk, tov = excluded.tov,
                     pf = excluded.pf,
                     fgm = excluded.fgm, fga = excluded.fga,
                     fg3m = excluded.fg3m, fg3a = excluded.fg3a,
                     ftm = excluded.ftm, fta = excluded.fta,
                     plus_minus = excluded.plus_minus,
                     last_updated_at = excluded.last_updated_at",
            )
            .bind(&row.game_id)
            .bind(row.player_id)
            .bind(row.team_id)
            .bind(&row.season)
            .bind(row.is_home)
            .bind(row.opponent_team_id)
            .bind(row.starter_flag)
            .bind(&row.minutes)
            .bind(row.pts)
            .bind(row.reb)
            .bind(row.ast)
            .bind(row.stl)
            .bind(row.blk)
            .bind(row.tov)
            .bind(row.pf)
            .bind(row.fgm)
            .bind(row.fga)
            .bind(row.fg3m)
            .bind(row.fg3a)
            .bind(row.ftm)
            .bind(row.fta)
            .bind(row.plus_minus)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
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

    fn game(game_id: &str, date: &str) -> GameRow {
        GameRow {
            game_id: game_id.to_string(),
            season: "2024-25".to_string(),
            game_date: date.to_string(),
            game_datetime_utc: None,
            home_team_id: 1610612750,
            away_team_id: 1610612747,
            status: Some("Final".to_string()),
            arena_name: None,
            arena_city: None,
            arena_state: None,
        }
    }

    #[tokio::test]
    async fn test_spine_insert_ignores_duplicates() {
        let storage = storage().await;
        let ids = vec!["0022400001".to_string(), "0022400002".to_string()];

        let inserted = storage.insert_spine_entries(&ids, "2024-25").await.unwrap();
        assert_eq!(inserted, 2);

        let inserted = storage.insert_spine_entries(&ids, "2024-25").await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(storage.spine_count("2024-25").await.unwrap(), 2);

        let entries = storage.spine_entries("2024-25").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].game_id, "0022400001");
        assert_eq!(entries[0].season, "2024-25");
    }

    #[tokio::test]
    async fn test_missing_games_shrinks_after_structure_write() {
        let storage = storage().await;
        let ids = vec!["0022400001".to_string(), "0022400002".to_string()];
        storage.insert_spine_entries(&ids, "2024-25").await.unwrap();

        let missing = storage.missing_games("2024-25").await.unwrap();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].game_id, "0022400001");

        storage
            .write_game_structure(&game("0022400001", "2024-11-01"), &[])
            .await
            .unwrap();

        let missing = storage.missing_games("2024-25").await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].game_id, "0022400002");
    }

    #[tokio::test]
    async fn test_missing_games_is_season_scoped() {
        let storage = storage().await;
        storage
            .insert_spine_entries(&["0022300001".to_string()], "2023-24")
            .await
            .unwrap();
        storage
            .insert_spine_entries(&["0022400001".to_string()], "2024-25")
            .await
            .unwrap();

        let missing = storage.missing_games("2024-25").await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].game_id, "0022400001");
    }

    #[tokio::test]
    async fn test_games_missing_box_ordered_by_date() {
        let storage = storage().await;
        storage
            .write_game_structure(&game("0022400009", "2024-10-25"), &[])
            .await
            .unwrap();
        storage
            .write_game_structure(&game("0022400002", "2024-11-05"), &[])
            .await
            .unwrap();

        let missing = storage.games_missing_team_box("2024-25").await.unwrap();
        assert_eq!(missing.len(), 2);
        // Date order wins over id order.
        assert_eq!(missing[0].game_id, "0022400009");
        assert_eq!(missing[1].game_id, "0022400002");
        assert_eq!(missing[0].home_team_id, 1610612750);
    }

    #[tokio::test]
    async fn test_team_box_write_clears_missing() {
        let storage = storage().await;
        storage
            .write_game_structure(&game("0022400001", "2024-11-01"), &[])
            .await
            .unwrap();

        let rows = vec![
            TeamBoxRow {
                game_id: "0022400001".to_string(),
                team_id: 1610612750,
                season: "2024-25".to_string(),
                is_home: Some(true),
                opponent_team_id: Some(1610612747),
                pts: Some(110),
                ..Default::default()
            },
            TeamBoxRow {
                game_id: "0022400001".to_string(),
                team_id: 1610612747,
                season: "2024-25".to_string(),
                is_home: Some(false),
                opponent_team_id: Some(1610612750),
                pts: Some(104),
                ..Default::default()
            },
        ];
        storage.write_team_box_rows(&rows).await.unwrap();

        assert!(storage
            .games_missing_team_box("2024-25")
            .await
            .unwrap()
            .is_empty());
        // Player stage still sees the game as missing.
        assert_eq!(
            storage
                .games_missing_player_box("2024-25")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_fact_upsert_overwrites() {
        let storage = storage().await;
        let mut row = TeamBoxRow {
            game_id: "0022400001".to_string(),
            team_id: 1610612750,
            season: "2024-25".to_string(),
            pts: Some(98),
            ..Default::default()
        };
        storage.write_team_box_rows(&[row.clone()]).await.unwrap();

        row.pts = Some(101);
        storage.write_team_box_rows(&[row]).await.unwrap();

        let (pts,): (i64,) = sqlx::query_as(
            "SELECT pts FROM team_boxscores WHERE game_id = ? AND team_id = ?",
        )
        .bind("0022400001")
        .bind(1610612750i64)
        .fetch_one(storage.pool())
        .await
        .unwrap();
        assert_eq!(pts, 101);
    }

    #[tokio::test]
    async fn test_dimension_upsert_coalesces() {
        let storage = storage().await;
        let full = TeamDimRow {
            team_id: 1610612750,
            abbreviation: Some("MIN".to_string()),
            team_name: Some("Timberwolves".to_string()),
            city: Some("Minnesota".to_string()),
            full_name: Some("Minnesota Timberwolves".to_string()),
        };
        storage
            .write_game_structure(&game("0022400001", "2024-11-01"), &[full])
            .await
            .unwrap();

        // Second document knows the team only by id and abbreviation.
        let sparse = TeamDimRow {
            team_id: 1610612750,
            abbreviation: Some("MIN".to_string()),
            team_name: None,
            city: None,
            full_name: None,
        };
        storage
            .write_game_structure(&game("0022400002", "2024-11-03"), &[sparse])
            .await
            .unwrap();

        let (name,): (Option<String>,) =
            sqlx::query_as("SELECT team_name FROM teams WHERE team_id = ?")
                .bind(1610612750i64)
                .fetch_one(storage.pool())
                .await
                .unwrap();
        assert_eq!(name.as_deref(), Some("Timberwolves"));
    }

    #[tokio::test]
    async fn test_player_write_seeds_dimension_and_facts_together() {
        let storage = storage().await;
        storage
            .write_game_structure(&game("0022400001", "2024-11-01"), &[])
            .await
            .unwrap();

        let seeds = vec![PlayerDimRow {
            player_id: 1630162,
            full_name: Some("Anthony Edwards".to_string()),
            first_name: Some("Anthony".to_string()),
            last_name: Some("Edwards".to_string()),
            position: Some("G".to_string()),
        }];
        let rows = vec![PlayerBoxRow {
            game_id: "0022400001".to_string(),
            player_id: 1630162,
            team_id: 1610612750,
            season: "2024-25".to_string(),
            pts: Some(32),
            ..Default::default()
        }];
        storage.write_player_box_rows(&seeds, &rows).await.unwrap();

        let (players,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM players")
            .fetch_one(storage.pool())
            .await
            .unwrap();
        assert_eq!(players, 1);
        assert!(storage
            .games_missing_player_box("2024-25")
            .await
            .unwrap()
            .is_empty());
    }
}
