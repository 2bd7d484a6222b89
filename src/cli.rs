use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .usage(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// NBA stats ingestion pipeline
///
/// Pulls game, team and player statistics from the public stats API into a
/// local database. Every stage only backfills what is missing, so both
/// commands are safe to re-run at any time.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(styles = get_styles())]
pub struct Args {
    /// Write logs to a custom file path instead of the default location.
    #[arg(long = "log-file", help_heading = "Debug")]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backfill one or more historical seasons end to end
    Backfill {
        /// Seasons to backfill in YYYY-YY format (e.g., 2022-23 2023-24)
        #[arg(required = true)]
        seasons: Vec<String>,

        /// Sleep seconds between API calls (default: from config)
        #[arg(long)]
        sleep: Option<f64>,

        /// Limit games processed per stage and season (for testing)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run one incremental pass for the current season
    Daily {
        /// Season label override in YYYY-YY format; auto-detected from the
        /// system date when omitted
        #[arg(long)]
        season: Option<String>,
    },

    /// Create the database schema (safe to re-run)
    InitDb,
}
