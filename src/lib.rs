pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod etl;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod season;

// Re-export commonly used types for easier access
pub use api::NbaApiClient;
pub use config::Config;
pub use db::Storage;
pub use error::AppError;
pub use etl::{LoadOptions, LoadReport};

/// Current version of the application from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");
