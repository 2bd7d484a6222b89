//! HTTP client for the stats API with typed error mapping.
//!
//! The client performs exactly one request per call; retry policy lives in
//! the resilient call wrapper so all call sites share one throttle response.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::api::urls;
use crate::config::Config;
use crate::error::AppError;

/// Client for the remote stats source. Cheap to clone; holds a pooled
/// reqwest client and the configured base URL.
#[derive(Debug, Clone)]
pub struct NbaApiClient {
    client: Client,
    base_url: String,
}

impl NbaApiClient {
    /// Creates a client from application configuration.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(NbaApiClient {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client against an explicit base URL with a short timeout.
    /// Used by tests against a local mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(NbaApiClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetches the league game finder document for a season (spine stage).
    pub async fn fetch_game_finder(&self, season: &str) -> Result<Value, AppError> {
        self.fetch(&urls::build_game_finder_url(&self.base_url, season))
            .await
    }

    /// Fetches the boxscore summary document for a game (structure stage).
    pub async fn fetch_boxscore_summary(&self, game_id: &str) -> Result<Value, AppError> {
        self.fetch(&urls::build_boxscore_summary_url(&self.base_url, game_id))
            .await
    }

    /// Fetches the traditional boxscore document (counting stats).
    pub async fn fetch_boxscore_traditional(&self, game_id: &str) -> Result<Value, AppError> {
        self.fetch(&urls::build_boxscore_traditional_url(&self.base_url, game_id))
            .await
    }

    /// Fetches the advanced boxscore document (ratings, pace, efficiency).
    pub async fn fetch_boxscore_advanced(&self, game_id: &str) -> Result<Value, AppError> {
        self.fetch(&urls::build_boxscore_advanced_url(&self.base_url, game_id))
            .await
    }

    /// Single fetch with comprehensive error handling. Maps HTTP status
    /// codes and transport failures onto the retryable/permanent error
    /// taxonomy; the caller's retry wrapper decides what to do with them.
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Value, AppError> {
        debug!("Fetching data from URL: {url}");

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("Request failed for URL {}: {}", url, e);
                return if e.is_timeout() {
                    Err(AppError::network_timeout(url))
                } else if e.is_connect() {
                    Err(AppError::network_connection(url, e.to_string()))
                } else {
                    Err(AppError::ApiFetch(e))
                };
            }
        };

        let status = response.status();
        debug!("Response status: {status}");

        if !status.is_success() {
            let status_code = status.as_u16();
            let reason = status.canonical_reason().unwrap_or("Unknown error");

            error!("HTTP {} - {} (URL: {})", status_code, reason, url);

            return Err(match status_code {
                404 => AppError::api_not_found(url),
                429 => AppError::api_rate_limit(reason, url),
                400..=499 => AppError::api_client_error(status_code, reason, url),
                502 | 503 => AppError::api_service_unavailable(status_code, reason, url),
                _ => AppError::api_server_error(status_code, reason, url),
            });
        }

        let response_text = response.text().await.map_err(AppError::ApiFetch)?;
        debug!("Response length: {} bytes", response_text.len());

        if response_text.trim().is_empty() {
            return Err(AppError::api_no_data("Response body is empty", url));
        }

        match serde_json::from_str::<Value>(&response_text) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                error!("Failed to parse API response: {} (URL: {})", e, url);
                Err(AppError::api_malformed_json(e.to_string(), url))
            }
        }
    }
}
