//! # SQLite Interval Store
//!
//! [`IntervalStore`] backed by the `stop_intervals` table.
//!
//! ## Storage Guarantees
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     At Most One Open Interval                           │
//! │                                                                         │
//! │  Layer 1: lifecycle::plan skips entered items that are already open     │
//! │  Layer 2: writer Mutex shared by every store built from one Database    │
//! │  Layer 3: partial UNIQUE index                                          │
//! │           CREATE UNIQUE INDEX ... ON stop_intervals(identity)           │
//! │           WHERE ended_at IS NULL                                        │
//! │           + INSERT ... ON CONFLICT DO NOTHING                           │
//! │                                                                         │
//! │  Closes:  UPDATE ... SET ended_at = ? WHERE id = ? AND ended_at IS NULL │
//! │           (a closed interval is frozen)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps are written as RFC 3339 UTC text. Rows without an offset are
//! read as local time in the store's timezone.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use stoplist_core::lifecycle::{self, ApplyOutcome};
use stoplist_core::time::{format_timestamp, parse_timestamp};
use stoplist_core::{DiffResult, ItemIdentity, StopInterval};

use crate::error::{DbError, DbResult};
use crate::store::{log_plan, IntervalStore};

const SELECT_COLUMNS: &str = "SELECT id, identity, display_name, started_at, ended_at FROM stop_intervals";

/// SQLite-backed interval store.
///
/// ## Usage
/// ```rust,ignore
/// let store = db.intervals(chrono_tz::Europe::Moscow);
/// let outcome = store.apply(&diff, Utc::now()).await?;
/// let recent = store.intervals_since(window_start).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteIntervalStore {
    pool: SqlitePool,
    timezone: Tz,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteIntervalStore {
    /// Creates a store over `pool`.
    ///
    /// Every store that writes to the same database must share `write_lock`.
    pub fn new(pool: SqlitePool, timezone: Tz, write_lock: Arc<Mutex<()>>) -> Self {
        SqliteIntervalStore {
            pool,
            timezone,
            write_lock,
        }
    }

    /// Zone used to read legacy rows without an offset.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Total number of interval rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stop_intervals")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    fn map_row(&self, row: &SqliteRow) -> DbResult<StopInterval> {
        let id: i64 = row.try_get("id")?;
        let raw_identity: String = row.try_get("identity")?;
        let display_name: String = row.try_get("display_name")?;
        let raw_started: String = row.try_get("started_at")?;
        let raw_ended: Option<String> = row.try_get("ended_at")?;

        let identity = ItemIdentity::parse(&raw_identity).map_err(|e| DbError::InvalidIdentity {
            row: id.to_string(),
            reason: e.to_string(),
        })?;

        let started_at = parse_timestamp(&raw_started, self.timezone)
            .map_err(|_| DbError::invalid_timestamp("started_at", &raw_started))?;

        let ended_at = raw_ended
            .map(|raw| {
                parse_timestamp(&raw, self.timezone)
                    .map_err(|_| DbError::invalid_timestamp("ended_at", &raw))
            })
            .transpose()?;

        Ok(StopInterval {
            id,
            identity,
            display_name,
            started_at,
            ended_at,
        })
    }

    async fn fetch_open<'e, E>(&self, executor: E) -> DbResult<Vec<StopInterval>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("{} WHERE ended_at IS NULL ORDER BY id", SELECT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(executor).await?;
        rows.iter().map(|row| self.map_row(row)).collect()
    }
}

#[async_trait]
impl IntervalStore for SqliteIntervalStore {
    async fn apply(&self, diff: &DiffResult, now: DateTime<Utc>) -> DbResult<ApplyOutcome> {
        let _writer = self.write_lock.lock().await;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let open = self.fetch_open(&mut *tx).await?;
        let plan = lifecycle::plan(diff, &open, now);
        log_plan(&plan);

        if plan.is_noop() {
            // Nothing to write; dropping the transaction rolls it back.
            return Ok(plan.outcome());
        }

        let mut outcome = plan.outcome();
        outcome.opened = 0;
        outcome.closed = 0;

        for close in &plan.closes {
            let result = sqlx::query(
                "UPDATE stop_intervals SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
            )
            .bind(format_timestamp(close.ended_at))
            .bind(close.interval_id)
            .execute(&mut *tx)
            .await?;
            outcome.closed += result.rows_affected() as usize;
        }

        for opened in &plan.opens {
            let result = sqlx::query(
                "INSERT INTO stop_intervals (identity, display_name, started_at, ended_at) \
                 VALUES (?1, ?2, ?3, NULL) ON CONFLICT DO NOTHING",
            )
            .bind(opened.identity.as_str())
            .bind(&opened.display_name)
            .bind(format_timestamp(opened.started_at))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(identity = %opened.identity, "Open interval already exists, skipping insert");
                outcome.already_open += 1;
            } else {
                outcome.opened += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            opened = outcome.opened,
            closed = outcome.closed,
            drift = outcome.drift,
            clock_skew = outcome.clock_skew,
            "Applied diff to interval store"
        );
        Ok(outcome)
    }

    async fn open_intervals(&self) -> DbResult<Vec<StopInterval>> {
        self.fetch_open(&self.pool).await
    }

    async fn intervals_since(&self, since: DateTime<Utc>) -> DbResult<Vec<StopInterval>> {
        // Coarse date prefilter in SQL, exact comparison after parsing. The
        // extra day covers legacy rows stored in local time.
        let cutoff = (since - Duration::days(1)).format("%Y-%m-%d").to_string();
        let sql = format!(
            "{} WHERE ended_at IS NULL OR substr(ended_at, 1, 10) >= ?1",
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&sql).bind(cutoff).fetch_all(&self.pool).await?;

        let mut intervals = Vec::with_capacity(rows.len());
        for row in &rows {
            let interval = self.map_row(row)?;
            if interval.ended_at.map_or(true, |end| end >= since) {
                intervals.push(interval);
            }
        }
        intervals.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));

        debug!(since = %since, count = intervals.len(), "Loaded intervals");
        Ok(intervals)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
