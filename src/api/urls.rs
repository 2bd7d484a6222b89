//! URL building utilities for stats API endpoints

use crate::constants::{LEAGUE_ID, SEASON_TYPE_REGULAR};

fn encode_query(value: &str) -> String {
    value.replace(' ', "+")
}

/// Builds the league game finder URL used for spine discovery.
/// One row per team per game; the caller dedupes to unique game ids.
///
/// # Example
/// ```
/// use hoopline::api::build_game_finder_url;
///
/// let url = build_game_finder_url("https://stats.example.com/stats", "2024-25");
/// assert_eq!(
///     url,
///     "https://stats.example.com/stats/leaguegamefinder?Season=2024-25&LeagueID=00&SeasonType=Regular+Season"
/// );
/// ```
pub fn build_game_finder_url(api_base: &str, season: &str) -> String {
    format!(
        "{api_base}/leaguegamefinder?Season={season}&LeagueID={LEAGUE_ID}&SeasonType={}",
        encode_query(SEASON_TYPE_REGULAR)
    )
}

/// Builds the boxscore summary URL for the structure stage.
pub fn build_boxscore_summary_url(api_base: &str, game_id: &str) -> String {
    format!("{api_base}/boxscoresummaryv3?GameID={game_id}")
}

/// Builds the traditional boxscore URL (team and player counting stats).
pub fn build_boxscore_traditional_url(api_base: &str, game_id: &str) -> String {
    format!("{api_base}/boxscoretraditionalv3?GameID={game_id}")
}

/// Builds the advanced boxscore URL (ratings, pace, shooting efficiency).
pub fn build_boxscore_advanced_url(api_base: &str, game_id: &str) -> String {
    format!("{api_base}/boxscoreadvancedv3?GameID={game_id}")
}
