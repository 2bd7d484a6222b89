//! Business-rule validation applied between extraction and storage.
//!
//! A validator returns every violation it finds, not just the first, so one
//! ledger entry can describe the whole problem with a row. All checks treat
//! an absent optional stat as passing; only present values can violate a
//! rule.

use std::fmt;

use crate::models::{GameRow, PlayerBoxRow, TeamBoxRow};
use crate::season;

/// A single rule violation on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub value: String,
    pub rule: String,
    pub message: String,
}

impl ValidationError {
    fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationError {
            field: field.into(),
            value: value.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (value={}, rule={})",
            self.field, self.message, self.value, self.rule
        )
    }
}

/// Joins violations into the one-line summary stored in the error ledger.
pub fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates a game structure row before insertion. A failure here blocks
/// the write: a games row with bad keys would poison every downstream stage.
pub fn validate_game(game: &GameRow) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if game.game_id.is_empty() {
        errors.push(ValidationError::new(
            "game_id",
            &game.game_id,
            "required",
            "Game ID is required",
        ));
    } else if game.game_id.len() != crate::constants::GAME_ID_LENGTH {
        errors.push(ValidationError::new(
            "game_id",
            &game.game_id,
            "length_check",
            "Game ID must be exactly 10 characters",
        ));
    }

    if game.home_team_id == 0 {
        errors.push(ValidationError::new(
            "home_team_id",
            "0",
            "required",
            "Home team ID is required",
        ));
    }
    if game.away_team_id == 0 {
        errors.push(ValidationError::new(
            "away_team_id",
            "0",
            "required",
            "Away team ID is required",
        ));
    }
    if game.home_team_id != 0 && game.home_team_id == game.away_team_id {
        errors.push(ValidationError::new(
            "team_ids",
            format!("home={}, away={}", game.home_team_id, game.away_team_id),
            "uniqueness",
            "Home and away team IDs must be different",
        ));
    }

    if game.game_date.is_empty() {
        errors.push(ValidationError::new(
            "game_date",
            &game.game_date,
            "required",
            "Game date is required",
        ));
    }

    if season::validate_season_label(&game.season).is_err() {
        errors.push(ValidationError::new(
            "season",
            &game.season,
            "format_check",
            "Season must be in format YYYY-YY (e.g., 2024-25)",
        ));
    }

    errors
}

fn check_made_vs_attempted(
    errors: &mut Vec<ValidationError>,
    field: &str,
    label: &str,
    made: Option<i64>,
    attempted: Option<i64>,
) {
    let made = made.unwrap_or(0);
    let attempted = attempted.unwrap_or(0);
    if made > attempted {
        errors.push(ValidationError::new(
            field,
            format!("made={made}, attempted={attempted}"),
            "logic_check",
            format!("{label} made cannot exceed attempts"),
        ));
    }
}

/// Validates a team boxscore row. Failures are recorded but do not block
/// the write; a flagged aggregate is still worth keeping.
pub fn validate_team_boxscore(row: &TeamBoxRow, tolerance: i64) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if row.game_id.is_empty() {
        errors.push(ValidationError::new(
            "game_id",
            &row.game_id,
            "required",
            "Game ID is required",
        ));
    }
    if row.team_id == 0 {
        errors.push(ValidationError::new(
            "team_id",
            "0",
            "required",
            "Team ID is required",
        ));
    }

    check_made_vs_attempted(&mut errors, "field_goals", "Field goals", row.fgm, row.fga);
    check_made_vs_attempted(
        &mut errors,
        "three_pointers",
        "Three pointers",
        row.fg3m,
        row.fg3a,
    );
    check_made_vs_attempted(&mut errors, "free_throws", "Free throws", row.ftm, row.fta);

    if let Some(pts) = row.pts {
        if pts < 0 {
            errors.push(ValidationError::new(
                "pts",
                pts.to_string(),
                "range_check",
                "Points cannot be negative",
            ));
        }
    }

    // Team rebounds cause a small legitimate gap between reb and oreb + dreb.
    let oreb = row.oreb.unwrap_or(0);
    let dreb = row.dreb.unwrap_or(0);
    let reb = row.reb.unwrap_or(0);
    if reb > 0 && (reb - (oreb + dreb)).abs() > tolerance {
        errors.push(ValidationError::new(
            "rebounds",
            format!("total={reb}, oreb={oreb}, dreb={dreb}"),
            "consistency_check",
            "Total rebounds significantly differs from oreb + dreb",
        ));
    }

    errors
}

/// Validates a player boxscore row; same posture as the team validator.
pub fn validate_player_boxscore(row: &PlayerBoxRow) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if row.game_id.is_empty() {
        errors.push(ValidationError::new(
            "game_id",
            &row.game_id,
            "required",
            "Game ID is required",
        ));
    }
    if row.player_id == 0 {
        errors.push(ValidationError::new(
            "player_id",
            "0",
            "required",
            "Player ID is required",
        ));
    }
    if row.team_id == 0 {
        errors.push(ValidationError::new(
            "team_id",
            "0",
            "required",
            "Team ID is required",
        ));
    }

    check_made_vs_attempted(&mut errors, "field_goals", "Field goals", row.fgm, row.fga);
    check_made_vs_attempted(
        &mut errors,
        "three_pointers",
        "Three pointers",
        row.fg3m,
        row.fg3a,
    );
    check_made_vs_attempted(&mut errors, "free_throws", "Free throws", row.ftm, row.fta);

    let fgm = row.fgm.unwrap_or(0);
    let fga = row.fga.unwrap_or(0);
    let fg3m = row.fg3m.unwrap_or(0);
    let fg3a = row.fg3a.unwrap_or(0);
    if fg3m > fgm {
        errors.push(ValidationError::new(
            "shooting",
            format!("fg3m={fg3m}, fgm={fgm}"),
            "logic_check",
            "Three pointers made cannot exceed total field goals made",
        ));
    }
    if fg3a > fga {
        errors.push(ValidationError::new(
            "shooting",
            format!("fg3a={fg3a}, fga={fga}"),
            "logic_check",
            "Three pointers attempted cannot exceed total field goals attempted",
        ));
    }

    for (name, value) in [
        ("pts", row.pts),
        ("reb", row.reb),
        ("ast", row.ast),
        ("stl", row.stl),
        ("blk", row.blk),
        ("pf", row.pf),
    ] {
        if let Some(v) = value {
            if v < 0 {
                errors.push(ValidationError::new(
                    name,
                    v.to_string(),
                    "range_check",
                    format!("{} cannot be negative", name.to_uppercase()),
                ));
            }
        }
    }

    errors
}
