use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to fetch data from API: {0}")]
    ApiFetch(#[from] reqwest::Error),

    #[error("Failed to parse API response: {0}")]
    ApiParse(#[from] serde_json::Error),

    // Specific HTTP status code errors
    #[error("API request not found (404): {url}")]
    ApiNotFound { url: String },

    #[error("API server error ({status}): {message} (URL: {url})")]
    ApiServerError {
        status: u16,
        message: String,
        url: String,
    },

    #[error("API client error ({status}): {message} (URL: {url})")]
    ApiClientError {
        status: u16,
        message: String,
        url: String,
    },

    #[error("API rate limit exceeded (429): {message} (URL: {url})")]
    ApiRateLimit { message: String, url: String },

    #[error("API service unavailable ({status}): {message} (URL: {url})")]
    ApiServiceUnavailable {
        status: u16,
        message: String,
        url: String,
    },

    // Network-specific errors
    #[error("Network timeout while fetching data from: {url}")]
    NetworkTimeout { url: String },

    #[error("Connection failed to: {url} - {message}")]
    NetworkConnection { url: String, message: String },

    // Data parsing errors for semi-structured payloads
    #[error("API returned malformed JSON: {message} (URL: {url})")]
    ApiMalformedJson { message: String, url: String },

    #[error("API returned empty or missing data: {message} (URL: {url})")]
    ApiNoData { message: String, url: String },

    // Extraction failures: the document parsed but did not contain what a
    // stage needs. Never retried.
    #[error("Extraction failed for game_id={game_id}: {message}")]
    Extraction { game_id: String, message: String },

    #[error("Validation failed for game_id={game_id}: {summary}")]
    Validation { game_id: String, summary: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid season label: {0}")]
    InvalidSeason(String),

    #[error("Log setup error: {0}")]
    LogSetup(String),
}

impl AppError {
    /// Create a configuration error with context
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a log setup error with context
    pub fn log_setup_error(msg: impl Into<String>) -> Self {
        Self::LogSetup(msg.into())
    }

    /// Create an API not found error
    pub fn api_not_found(url: impl Into<String>) -> Self {
        Self::ApiNotFound { url: url.into() }
    }

    /// Create an API server error (5xx status codes)
    pub fn api_server_error(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiServerError {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API client error (4xx status codes except 404 and 429)
    pub fn api_client_error(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiClientError {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API rate limit error
    pub fn api_rate_limit(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiRateLimit {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API service unavailable error
    pub fn api_service_unavailable(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiServiceUnavailable {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create a network timeout error
    pub fn network_timeout(url: impl Into<String>) -> Self {
        Self::NetworkTimeout { url: url.into() }
    }

    /// Create a network connection error
    pub fn network_connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NetworkConnection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a malformed JSON error
    pub fn api_malformed_json(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiMalformedJson {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create a no data error
    pub fn api_no_data(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiNoData {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an extraction error for a specific game
    pub fn extraction(game_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            game_id: game_id.into(),
            message: message.into(),
        }
    }

    /// Create a validation error for a specific game
    pub fn validation(game_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::Validation {
            game_id: game_id.into(),
            summary: summary.into(),
        }
    }

    /// Short classification name used by the error ledger
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ApiFetch(_) => "ApiFetch",
            AppError::ApiParse(_) => "ApiParse",
            AppError::ApiNotFound { .. } => "ApiNotFound",
            AppError::ApiServerError { .. } => "ApiServerError",
            AppError::ApiClientError { .. } => "ApiClientError",
            AppError::ApiRateLimit { .. } => "ApiRateLimit",
            AppError::ApiServiceUnavailable { .. } => "ApiServiceUnavailable",
            AppError::NetworkTimeout { .. } => "NetworkTimeout",
            AppError::NetworkConnection { .. } => "NetworkConnection",
            AppError::ApiMalformedJson { .. } => "ApiMalformedJson",
            AppError::ApiNoData { .. } => "ApiNoData",
            AppError::Extraction { .. } => "Extraction",
            AppError::Validation { .. } => "Validation",
            AppError::Database(_) => "Database",
            AppError::Io(_) => "Io",
            AppError::TomlSerialize(_) => "TomlSerialize",
            AppError::TomlDeserialize(_) => "TomlDeserialize",
            AppError::Config(_) => "Config",
            AppError::InvalidSeason(_) => "InvalidSeason",
            AppError::LogSetup(_) => "LogSetup",
        }
    }

    /// Check if error is retryable (network issues, server errors, rate limits).
    /// Shape and validation problems are permanent for a given payload and are
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkTimeout { .. }
                | AppError::NetworkConnection { .. }
                | AppError::ApiServerError { .. }
                | AppError::ApiServiceUnavailable { .. }
                | AppError::ApiRateLimit { .. }
                | AppError::ApiFetch(_)
        )
    }
}
