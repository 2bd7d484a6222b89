//! Remote stats source: HTTP client and endpoint URL builders.

pub mod client;
pub mod urls;

pub use client::NbaApiClient;
pub use urls::{
    build_boxscore_advanced_url, build_boxscore_summary_url, build_boxscore_traditional_url,
    build_game_finder_url,
};
