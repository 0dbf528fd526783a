//! # Service Wiring
//!
//! Builds the agent from configuration and runs the CLI commands.
//!
//! ## Serve Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        stoplistd serve                                  │
//! │                                                                         │
//! │  1. Database::new (migrations)                                          │
//! │  2. SyncAgent::start ─────────────► trigger sender                      │
//! │  3. DailyScheduler::start(sender)   (if report.enabled)                 │
//! │  4. WebhookServer::start(sender)    (if webhook.enabled)                │
//! │  5. wait for Ctrl+C / SIGTERM                                           │
//! │  6. stop webhook → scheduler → agent, close the pool                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use stoplist_db::{
    CatalogEntry, Database, DbConfig, IntervalStore, MemoryIntervalStore, MemorySnapshotStore,
    SnapshotStore,
};
use stoplist_sync::{
    DailyScheduler, FileSnapshotSource, LogNotifier, Notifier, ServiceConfig, StdoutNotifier,
    SyncAgent, SyncAgentBuilder, WebhookServer,
};

/// Opens the configured database, or a throwaway one with `memory`.
pub async fn open_database(config: &ServiceConfig, memory: bool) -> Result<Database> {
    let db_config = if memory {
        DbConfig::in_memory()
    } else {
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections)
    };

    Database::new(db_config)
        .await
        .with_context(|| format!("opening database {}", config.database.path.display()))
}

/// Builds an agent backed by `db`, delivering messages through `notifier`.
///
/// With `memory` the intervals and the previous snapshot live in process
/// memory; `db` still supplies catalog names.
pub fn build_agent(
    config: &ServiceConfig,
    db: &Database,
    notifier: Arc<dyn Notifier>,
    memory: bool,
) -> Result<SyncAgent> {
    let timezone = config.timezone()?;
    let source = FileSnapshotSource::new(&config.source.path, db.catalog());

    let (intervals, snapshots): (Arc<dyn IntervalStore>, Arc<dyn SnapshotStore>) = if memory {
        (
            Arc::new(MemoryIntervalStore::new()),
            Arc::new(MemorySnapshotStore::new()),
        )
    } else {
        (Arc::new(db.intervals(timezone)), Arc::new(db.snapshots()))
    };

    let agent = SyncAgentBuilder::new(config.clone())
        .with_interval_store(intervals)
        .with_snapshot_store(snapshots)
        .with_source(Arc::new(source))
        .with_notifier(notifier)
        .build()?;
    Ok(agent)
}

// =============================================================================
// Commands
// =============================================================================

/// Runs the long-lived service until a shutdown signal arrives.
pub async fn serve(config: ServiceConfig, db: Database, memory: bool) -> Result<()> {
    let notifier = Arc::new(LogNotifier::new(config.notify.recipients.clone()));
    let agent = build_agent(&config, &db, notifier, memory)?;
    let (agent_handle, agent_task) = agent.start();

    let scheduler = if config.report.enabled {
        Some(DailyScheduler::start(&config, agent_handle.sender())?)
    } else {
        info!("Daily report disabled");
        None
    };

    let webhook = if config.webhook.enabled {
        let server = WebhookServer::new(config.webhook.clone(), agent_handle.sender());
        Some(server.start().await?)
    } else {
        info!("Webhook listener disabled");
        None
    };

    if webhook.is_none() && config.poll_interval().is_none() {
        warn!("Neither webhook nor polling is enabled; syncs only run when triggered manually");
    }

    shutdown_signal().await;

    if let Some(webhook) = webhook {
        if let Err(e) = webhook.shutdown().await {
            warn!(error = %e, "Webhook did not shut down cleanly");
        }
    }
    if let Some((handle, task)) = scheduler {
        handle.shutdown().await;
        let _ = task.await;
    }
    agent_handle.shutdown().await;
    let _ = agent_task.await;

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Runs one sync cycle and prints the summary.
pub async fn sync(config: ServiceConfig, db: Database, memory: bool) -> Result<()> {
    let agent = build_agent(&config, &db, Arc::new(StdoutNotifier), memory)?;
    let report = agent.sync_once().await?;

    info!(
        cycle_id = %report.cycle_id,
        opened = report.outcome.opened,
        closed = report.outcome.closed,
        "Sync finished"
    );
    db.close().await;
    Ok(())
}

/// Builds the report for `date` and prints it.
pub async fn report(
    config: ServiceConfig,
    db: Database,
    date: Option<NaiveDate>,
    memory: bool,
) -> Result<()> {
    let agent = build_agent(&config, &db, Arc::new(StdoutNotifier), memory)?;
    agent.report_once(date).await?;
    db.close().await;
    Ok(())
}

/// Reads a catalog file (JSON array of `{"code", "name"}`).
pub async fn read_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(entries)
}

/// Upserts catalog entries from a file.
pub async fn import_catalog(db: &Database, path: &Path) -> Result<usize> {
    let entries = read_catalog(path).await?;
    let written = db.catalog().upsert_many(&entries).await?;
    info!(file = %path.display(), entries = written, "Catalog imported");
    Ok(written)
}

/// Writes a default config file.
pub fn init_config(path: Option<PathBuf>) -> Result<()> {
    ServiceConfig::default().save(path)?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_import_catalog_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"code": "00412", "name": "Borscht"}, {"code": "00977", "name": "Kvass"}]"#,
        )
        .unwrap();

        let db = open_database(&ServiceConfig::default(), true).await.unwrap();
        assert_eq!(import_catalog(&db, &path).await.unwrap(), 2);
        assert_eq!(
            db.catalog().name_for("00412").await.unwrap().as_deref(),
            Some("Borscht")
        );
    }

    #[tokio::test]
    async fn test_read_catalog_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"{"code": "00412"}"#).unwrap();

        assert!(read_catalog(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_sync_and_report_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("stop_list.json");
        std::fs::write(
            &source_path,
            r#"{"terminalGroupStopLists": [{"items": [{"items": [
                {"productId": "p-1", "sku": "00412", "balance": 0}
            ]}]}]}"#,
        )
        .unwrap();

        let mut config = ServiceConfig::default();
        config.source.path = source_path;

        let db = open_database(&config, true).await.unwrap();
        let agent = build_agent(&config, &db, Arc::new(LogNotifier::default()), false).unwrap();

        let cycle = agent.sync_once().await.unwrap();
        assert_eq!(cycle.outcome.opened, 1);
        let timezone = config.timezone().unwrap();
        assert_eq!(db.intervals(timezone).count().await.unwrap(), 1);

        let text = agent.report_once(None).await.unwrap();
        assert!(text.starts_with("📊 Stop-list report for"));
    }

    #[tokio::test]
    async fn test_memory_agent_leaves_database_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("stop_list.json");
        std::fs::write(
            &source_path,
            r#"{"terminalGroupStopLists": [{"items": [{"items": [{"sku": "00412"}]}]}]}"#,
        )
        .unwrap();

        let mut config = ServiceConfig::default();
        config.source.path = source_path;

        let db = open_database(&config, true).await.unwrap();
        let agent = build_agent(&config, &db, Arc::new(LogNotifier::default()), true).unwrap();

        assert_eq!(agent.sync_once().await.unwrap().outcome.opened, 1);
        assert_eq!(db.intervals(agent.timezone()).count().await.unwrap(), 0);
        assert!(db.snapshots().load().await.unwrap().is_none());
    }
}
