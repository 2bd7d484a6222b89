//! Season label utilities: format validation and current-season detection.

use chrono::{DateTime, Datelike, Utc};

use crate::error::AppError;

/// Validates a season label in `YYYY-YY` form, e.g. "2024-25".
///
/// The second part must be the first year plus one, modulo 100. Labels
/// before the league's founding year are rejected.
pub fn validate_season_label(season: &str) -> Result<(), AppError> {
    if season.len() != 7 {
        return Err(AppError::InvalidSeason(season.to_string()));
    }

    let parts: Vec<&str> = season.split('-').collect();
    if parts.len() != 2 {
        return Err(AppError::InvalidSeason(season.to_string()));
    }

    let year1: i32 = parts[0]
        .parse()
        .map_err(|_| AppError::InvalidSeason(season.to_string()))?;
    let year2: i32 = parts[1]
        .parse()
        .map_err(|_| AppError::InvalidSeason(season.to_string()))?;

    // NBA started in 1946
    if !(1946..=2100).contains(&year1) {
        return Err(AppError::InvalidSeason(season.to_string()));
    }

    if year2 != (year1 + 1) % 100 {
        return Err(AppError::InvalidSeason(season.to_string()));
    }

    Ok(())
}

/// Determines the current season label from the system clock.
///
/// The season runs October through June: before October the season started
/// in the previous calendar year.
pub fn current_season() -> String {
    current_season_at(Utc::now())
}

/// Internal variant taking an explicit time, for testing with fixed dates.
pub fn current_season_at(now: DateTime<Utc>) -> String {
    let year = now.year();
    let start_year = if now.month() < 10 { year - 1 } else { year };
    format_season(start_year)
}

/// Formats a season label from its starting calendar year.
pub fn format_season(start_year: i32) -> String {
    format!("{start_year}-{:02}", (start_year + 1) % 100)
}
