//! # stoplistd
//!
//! Stop-list tracker service.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         stoplistd                                       │
//! │                                                                         │
//! │  Provider ──► POST /webhook ──► SyncAgent ──► SQLite (stop_intervals)   │
//! │                                     │                                   │
//! │  DailyScheduler ──► report ─────────┴──► Notifier (log / stdout)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod app;
mod cli;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stoplist_sync::ServiceConfig;

use crate::cli::{CatalogAction, Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    if let Command::InitConfig { path } = command {
        return app::init_config(path);
    }

    let config = ServiceConfig::load(cli.config)?;
    info!(
        database = %config.database.path.display(),
        timezone = %config.report.timezone,
        memory = cli.memory,
        "Configuration loaded"
    );

    let db = app::open_database(&config, cli.memory).await?;

    match command {
        Command::Serve => app::serve(config, db, cli.memory).await,
        Command::Sync => app::sync(config, db, cli.memory).await,
        Command::Report { date } => app::report(config, db, date, cli.memory).await,
        Command::Catalog {
            action: CatalogAction::Import { file },
        } => {
            app::import_catalog(&db, &file).await?;
            db.close().await;
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// Default: INFO, overridable with `RUST_LOG`. Logs go to stderr so the
/// one-shot commands keep stdout for their output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
