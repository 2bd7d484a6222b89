//! Typed row records shared between extractors, validators and storage.
//!
//! Every struct here maps 1:1 onto a storage table. Optional fields mirror
//! the upstream source, which omits or garbles attributes freely across
//! endpoint versions; the typed value parser decides presence, storage
//! decides overwrite-vs-coalesce semantics.

use serde::{Deserialize, Serialize};

/// One entry in the game spine: the canonical list of known game ids for a
/// season. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SpineEntry {
    pub game_id: String,
    pub season: String,
}

/// One row per game in the games table, produced by the structure stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRow {
    pub game_id: String,
    pub season: String,
    /// Calendar date, YYYY-MM-DD
    pub game_date: String,
    /// Full UTC timestamp when the source provides one
    pub game_datetime_utc: Option<String>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub status: Option<String>,
    pub arena_name: Option<String>,
    pub arena_city: Option<String>,
    pub arena_state: Option<String>,
}

/// Team dimension row. Descriptive attributes only improve over time: an
/// upsert with a None field keeps whatever the table already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDimRow {
    pub team_id: i64,
    pub abbreviation: Option<String>,
    pub team_name: Option<String>,
    pub city: Option<String>,
    pub full_name: Option<String>,
}

/// Player dimension row, same coalesce-on-update semantics as teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDimRow {
    pub player_id: i64,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
}

/// Per-game team aggregate, keyed by (game_id, team_id). Exactly two rows
/// per completed game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TeamBoxRow {
    pub game_id: String,
    pub team_id: i64,
    pub season: String,
    pub is_home: Option<bool>,
    pub opponent_team_id: Option<i64>,

    pub minutes: Option<String>,
    pub pts: Option<i64>,
    pub fgm: Option<i64>,
    pub fga: Option<i64>,
    pub fg3m: Option<i64>,
    pub fg3a: Option<i64>,
    pub ftm: Option<i64>,
    pub fta: Option<i64>,
    pub oreb: Option<i64>,
    pub dreb: Option<i64>,
    pub reb: Option<i64>,
    pub ast: Option<i64>,
    pub stl: Option<i64>,
    pub blk: Option<i64>,
    pub tov: Option<i64>,
    pub pf: Option<i64>,

    pub off_rating: Option<f64>,
    pub def_rating: Option<f64>,
    pub net_rating: Option<f64>,
    pub pace: Option<f64>,
    pub ts_pct: Option<f64>,
}

/// Per-game player line, keyed by (game_id, player_id). Zero or more rows
/// per game, one per player appearing in the boxscore document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerBoxRow {
    pub game_id: String,
    pub player_id: i64,
    pub team_id: i64,
    pub season: String,
    pub is_home: Option<bool>,
    pub opponent_team_id: Option<i64>,
    pub starter_flag: Option<bool>,
    pub minutes: Option<String>,

    pub pts: Option<i64>,
    pub reb: Option<i64>,
    pub ast: Option<i64>,
    pub stl: Option<i64>,
    pub blk: Option<i64>,
    pub tov: Option<i64>,
    pub pf: Option<i64>,
    pub fgm: Option<i64>,
    pub fga: Option<i64>,
    pub fg3m: Option<i64>,
    pub fg3a: Option<i64>,
    pub ftm: Option<i64>,
    pub fta: Option<i64>,
    pub plus_minus: Option<i64>,
}

/// Entity handed to the structure loader: a spine game with no games row yet.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MissingGame {
    pub game_id: String,
    pub season: String,
}

/// Entity handed to the boxscore loaders: a structured game missing its
/// stage output, with the team context needed to resolve home/away.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MissingBoxGame {
    pub game_id: String,
    pub season: String,
    pub home_team_id: i64,
    pub away_team_id: i64,
}
