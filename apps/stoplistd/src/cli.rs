//! Command-line interface.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stop-list tracker: records when menu items go out of stock and reports
/// how long they were unavailable.
#[derive(Debug, Parser)]
#[command(name = "stoplistd", version, about)]
pub struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true, env = "STOPLIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use a throwaway in-memory database.
    #[arg(long, global = true)]
    pub memory: bool,

    /// Defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the service: webhook, poll interval and daily report.
    Serve,

    /// Run one sync cycle and print the summary.
    Sync,

    /// Build a report and print it.
    Report {
        /// Local date of the window, YYYY-MM-DD (default: today).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Manage the item catalog used for display names.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Write a config file with default values.
    InitConfig {
        /// Where to write it (defaults to the platform config dir).
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CatalogAction {
    /// Upsert entries from a JSON array of `{"code": .., "name": ..}`.
    Import { file: PathBuf },
}

// =============================================================================
// Unit Tests
// =============================================================================
