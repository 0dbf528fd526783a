//! # Snapshot Repository
//!
//! Persists the last snapshot the agent diffed against (`active_stoplist`).
//!
//! The table is replaced wholesale after every successful apply. An empty
//! table reads back as "no previous snapshot", which diffs the same way as
//! an empty one.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use stoplist_core::time::{format_timestamp, parse_timestamp};
use stoplist_core::{ItemIdentity, ItemState, Snapshot};

use crate::error::{DbError, DbResult};

/// Repository for the previous-snapshot table.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
}

impl SnapshotRepository {
    /// Creates a new SnapshotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SnapshotRepository { pool }
    }

    /// Loads the stored snapshot, or `None` if nothing has been saved yet.
    pub async fn load(&self) -> DbResult<Option<Snapshot>> {
        let rows = sqlx::query(
            "SELECT identity, display_name, stock_level, is_stopped, captured_at FROM active_stoplist",
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut captured_at: Option<DateTime<Utc>> = None;
        let mut snapshot = Snapshot::new(Utc::now());

        for row in &rows {
            let raw_identity: String = row.try_get("identity")?;
            let display_name: String = row.try_get("display_name")?;
            let stock_level: f64 = row.try_get("stock_level")?;
            let is_stopped: bool = row.try_get("is_stopped")?;
            let raw_captured: String = row.try_get("captured_at")?;

            let identity = ItemIdentity::parse(&raw_identity).map_err(|e| DbError::InvalidIdentity {
                row: raw_identity.clone(),
                reason: e.to_string(),
            })?;
            let row_captured = parse_timestamp(&raw_captured, chrono_tz::UTC)
                .map_err(|_| DbError::invalid_timestamp("captured_at", &raw_captured))?;
            captured_at = Some(captured_at.map_or(row_captured, |c| c.max(row_captured)));

            snapshot.insert(ItemState {
                identity,
                display_name,
                stock_level,
                is_stopped,
            });
        }

        if let Some(captured_at) = captured_at {
            snapshot.captured_at = captured_at;
        }

        debug!(items = snapshot.len(), "Loaded previous snapshot");
        Ok(Some(snapshot))
    }

    /// Replaces the stored snapshot in one transaction.
    pub async fn replace(&self, snapshot: &Snapshot) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM active_stoplist")
            .execute(&mut *tx)
            .await?;

        let captured_at = format_timestamp(snapshot.captured_at);
        for item in snapshot.items.values() {
            sqlx::query(
                "INSERT INTO active_stoplist (identity, display_name, stock_level, is_stopped, captured_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(item.identity.as_str())
            .bind(&item.display_name)
            .bind(item.stock_level)
            .bind(item.is_stopped)
            .bind(&captured_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(items = snapshot.len(), "Stored snapshot");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
