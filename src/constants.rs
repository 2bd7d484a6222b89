//! Application-wide constants and default tuning values
//!
//! This module centralizes all magic numbers so the hand-tuned throttle
//! response lives in one place.

#![allow(dead_code)]

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Default base URL for the stats API
pub const DEFAULT_API_BASE_URL: &str = "https://stats.nba.com/stats";

/// Default SQLite database path, relative to the working directory
pub const DEFAULT_DATABASE_URL: &str = "sqlite://hoopline.db";

/// League identifier passed to the game finder endpoint (NBA)
pub const LEAGUE_ID: &str = "00";

/// Season type requested when discovering the game spine
pub const SEASON_TYPE_REGULAR: &str = "Regular Season";

/// Expected length of a stats-API game identifier
pub const GAME_ID_LENGTH: usize = 10;

/// Retry policy defaults for the resilient call wrapper.
///
/// The schedule is a point lookup, not an exponential computation, so the
/// throttle response can be tuned empirically per step. The upstream source
/// throttles with long cool-down windows; the wait budget keeps a single
/// stuck game from stalling a multi-hour backfill.
pub mod retry {
    /// Maximum attempts per remote call
    pub const MAX_RETRIES: u32 = 3;

    /// Backoff schedule in seconds, indexed by attempt (clamped to the last entry)
    pub const BACKOFF_SECONDS: [u64; 3] = [120, 200, 250];

    /// Total wall-clock budget per remote call in seconds
    pub const MAX_TOTAL_WAIT_SECONDS: u64 = 600;
}

/// Loader pacing defaults
pub mod pacing {
    /// Sleep between entities in a reconciliation pass, in seconds
    pub const DEFAULT_SLEEP_SECONDS: f64 = 0.6;
}

/// Validation defaults
pub mod validation {
    /// Allowed discrepancy between total rebounds and oreb + dreb.
    /// Team rebounds make the split inexact; the threshold is tunable policy.
    pub const REBOUND_TOLERANCE: i64 = 5;
}
