//! Incremental ingestion stages.
//!
//! Each stage module pairs an extractor (document in, typed rows out) with a
//! reconciliation loader (find entities missing output rows, backfill only
//! those). Stages share the retry wrapper, the typed value parser, the
//! validators and the error ledger.

pub mod errors;
pub mod parsing;
pub mod player_box;
pub mod report;
pub mod retry;
pub mod spine;
pub mod structure;
pub mod team_box;
pub mod validate;

use std::path::PathBuf;

use serde_json::Value;

use crate::config::Config;
use crate::constants;
use crate::etl::retry::RetryPolicy;

pub use report::LoadReport;

/// Finds a stage's document root by probing known alternate keys in order,
/// falling back to the document itself. Endpoint versions have drifted on
/// the wrapper key more than once.
pub(crate) fn probe_root<'a>(doc: &'a Value, keys: &[&str]) -> &'a Value {
    keys.iter()
        .find_map(|k| doc.get(*k).filter(|v| v.is_object()))
        .unwrap_or(doc)
}

/// Shared loader knobs, derived from configuration once per run.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Sleep between entities, respecting the upstream rate limit.
    pub sleep_seconds: f64,
    /// Optional cap on entities processed in one pass.
    pub limit: Option<usize>,
    pub retry: RetryPolicy,
    /// Allowed gap between total rebounds and oreb + dreb.
    pub rebound_tolerance: i64,
    /// Directory receiving the per-stage failure logs.
    pub log_dir: PathBuf,
}

impl LoadOptions {
    pub fn from_config(config: &Config, log_dir: PathBuf) -> Self {
        LoadOptions {
            sleep_seconds: config.etl.sleep_seconds,
            limit: None,
            retry: RetryPolicy::from_config(&config.etl),
            rebound_tolerance: config.etl.rebound_tolerance,
            log_dir,
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            sleep_seconds: constants::pacing::DEFAULT_SLEEP_SECONDS,
            limit: None,
            retry: RetryPolicy::default(),
            rebound_tolerance: constants::validation::REBOUND_TOLERANCE,
            log_dir: PathBuf::from("logs"),
        }
    }
}
