//! # Interval Store
//!
//! The durable record of stop intervals and the only component that mutates
//! them.
//!
//! ## Apply Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    IntervalStore::apply(diff, now)                      │
//! │                                                                         │
//! │  acquire single-writer lock                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read open intervals ──► lifecycle::plan(diff, open, now)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                 SINGLE TRANSACTION / WRITE LOCK                 │    │
//! │  │  INSERT opens  (ON CONFLICT DO NOTHING)                         │    │
//! │  │  UPDATE closes (WHERE ended_at IS NULL)                         │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← all or nothing; errors leave the store untouched              │
//! │                                                                         │
//! │  Drift and clock skew are counted in ApplyOutcome and logged, never     │
//! │  returned as errors.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two implementations: [`SqliteIntervalStore`](crate::SqliteIntervalStore)
//! for production and [`MemoryIntervalStore`] for tests and dry runs. The
//! previous snapshot gets the same treatment through [`SnapshotStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use stoplist_core::lifecycle::{self, ApplyOutcome, ApplyPlan};
use stoplist_core::{DiffResult, Snapshot, StopInterval};

use crate::error::DbResult;
use crate::repository::snapshot::SnapshotRepository;

/// Durable storage for stop intervals.
///
/// Implementations guarantee at most one open interval per identity and
/// that `apply` is atomic.
#[async_trait]
pub trait IntervalStore: Send + Sync {
    /// Opens and closes intervals according to `diff`.
    ///
    /// Concurrent calls are serialized. On error nothing is committed.
    async fn apply(&self, diff: &DiffResult, now: DateTime<Utc>) -> DbResult<ApplyOutcome>;

    /// All intervals without an end.
    async fn open_intervals(&self) -> DbResult<Vec<StopInterval>>;

    /// Every interval still running at or after `since`, open ones included,
    /// read as one consistent copy. Ordered by start time.
    async fn intervals_since(&self, since: DateTime<Utc>) -> DbResult<Vec<StopInterval>>;
}

/// Storage for the snapshot the next diff runs against.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The stored snapshot, or `None` before the first successful cycle.
    async fn load(&self) -> DbResult<Option<Snapshot>>;

    /// Replaces the stored snapshot wholesale.
    async fn replace(&self, snapshot: &Snapshot) -> DbResult<()>;
}

#[async_trait]
impl SnapshotStore for SnapshotRepository {
    async fn load(&self) -> DbResult<Option<Snapshot>> {
        SnapshotRepository::load(self).await
    }

    async fn replace(&self, snapshot: &Snapshot) -> DbResult<()> {
        SnapshotRepository::replace(self, snapshot).await
    }
}

/// Emits the warnings a plan carries.
pub(crate) fn log_plan(plan: &ApplyPlan) {
    for identity in &plan.drift {
        warn!(identity = %identity, "Exit for an item with no open interval, ignoring");
    }
    for identity in &plan.already_open {
        debug!(identity = %identity, "Item already has an open interval");
    }
    for close in plan.closes.iter().filter(|c| c.clamped) {
        warn!(
            identity = %close.identity,
            interval_id = close.interval_id,
            "Close time precedes start time, clamping to zero duration"
        );
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    intervals: Vec<StopInterval>,
    next_id: i64,
}

/// Interval store kept entirely in memory.
///
/// The write lock is held for the whole apply, so concurrent callers are
/// serialized the same way the SQLite store serializes them.
#[derive(Debug, Default)]
pub struct MemoryIntervalStore {
    state: RwLock<MemoryState>,
}

impl MemoryIntervalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every interval, open or closed, in insertion order.
    pub async fn all(&self) -> Vec<StopInterval> {
        self.state.read().await.intervals.clone()
    }
}

#[async_trait]
impl IntervalStore for MemoryIntervalStore {
    async fn apply(&self, diff: &DiffResult, now: DateTime<Utc>) -> DbResult<ApplyOutcome> {
        let mut state = self.state.write().await;

        let open: Vec<StopInterval> = state
            .intervals
            .iter()
            .filter(|i| i.is_open())
            .cloned()
            .collect();
        let plan = lifecycle::plan(diff, &open, now);
        log_plan(&plan);

        for close in &plan.closes {
            if let Some(interval) = state
                .intervals
                .iter_mut()
                .find(|i| i.id == close.interval_id && i.is_open())
            {
                interval.ended_at = Some(close.ended_at);
            }
        }

        for opened in &plan.opens {
            state.next_id += 1;
            let id = state.next_id;
            state.intervals.push(StopInterval {
                id,
                identity: opened.identity.clone(),
                display_name: opened.display_name.clone(),
                started_at: opened.started_at,
                ended_at: None,
            });
        }

        Ok(plan.outcome())
    }

    async fn open_intervals(&self) -> DbResult<Vec<StopInterval>> {
        let state = self.state.read().await;
        Ok(state.intervals.iter().filter(|i| i.is_open()).cloned().collect())
    }

    async fn intervals_since(&self, since: DateTime<Utc>) -> DbResult<Vec<StopInterval>> {
        let state = self.state.read().await;
        let mut result: Vec<StopInterval> = state
            .intervals
            .iter()
            .filter(|i| i.ended_at.map_or(true, |end| end >= since))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }
}

/// Previous snapshot kept in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: RwLock<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    /// Creates a store with no previous snapshot.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> DbResult<Option<Snapshot>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn replace(&self, snapshot: &Snapshot) -> DbResult<()> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use stoplist_core::{diff, ItemIdentity, ItemState, Snapshot};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    fn snapshot(stopped: &[&str]) -> Snapshot {
        Snapshot::from_items(
            at(0, 0),
            stopped
                .iter()
                .map(|sku| ItemState::new(ItemIdentity::parse(sku).unwrap(), *sku, 0.0)),
        )
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let store = MemoryIntervalStore::new();
        let first = snapshot(&["A", "B"]);
        let second = snapshot(&["B"]);

        let outcome = store.apply(&diff::diff(None, &first), at(9, 0)).await.unwrap();
        assert_eq!(outcome.opened, 2);

        let outcome = store
            .apply(&diff::diff(Some(&first), &second), at(10, 0))
            .await
            .unwrap();
        assert_eq!(outcome.closed, 1);

        let open = store.open_intervals().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].identity.as_str(), "B");

        let all = store.all().await;
        let a = all.iter().find(|i| i.identity.as_str() == "A").unwrap();
        assert_eq!(a.ended_at, Some(at(10, 0)));
    }

    #[tokio::test]
    async fn test_reapplying_a_diff_is_a_noop() {
        let store = MemoryIntervalStore::new();
        let changes = diff::diff(None, &snapshot(&["A"]));

        store.apply(&changes, at(9, 0)).await.unwrap();
        let again = store.apply(&changes, at(9, 5)).await.unwrap();

        assert!(!again.mutated());
        assert_eq!(again.already_open, 1);
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_drift_is_counted_not_failed() {
        let store = MemoryIntervalStore::new();
        let changes = diff::diff(Some(&snapshot(&["A"])), &snapshot(&[]));

        let outcome = store.apply(&changes, at(9, 0)).await.unwrap();
        assert_eq!(outcome.drift, 1);
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_clock_skew_close_is_zero_length() {
        let store = MemoryIntervalStore::new();
        let stopped = snapshot(&["A"]);
        store.apply(&diff::diff(None, &stopped), at(9, 0)).await.unwrap();

        let outcome = store
            .apply(&diff::diff(Some(&stopped), &snapshot(&[])), at(9, 0) - Duration::minutes(2))
            .await
            .unwrap();

        assert_eq!(outcome.clock_skew, 1);
        let all = store.all().await;
        assert_eq!(all[0].ended_at, Some(at(9, 0)));
        assert_eq!(all[0].duration_seconds(at(12, 0)), 0);
    }

    #[tokio::test]
    async fn test_intervals_since_includes_open_and_recent() {
        let store = MemoryIntervalStore::new();
        let ab = snapshot(&["A", "B"]);
        let b = snapshot(&["B"]);
        store.apply(&diff::diff(None, &ab), at(6, 0)).await.unwrap();
        store.apply(&diff::diff(Some(&ab), &b), at(7, 0)).await.unwrap();

        assert_eq!(store.intervals_since(at(6, 30)).await.unwrap().len(), 2);

        let later = store.intervals_since(at(8, 0)).await.unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].identity.as_str(), "B");
    }

    #[tokio::test]
    async fn test_memory_snapshot_store_replaces() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.replace(&snapshot(&["A"])).await.unwrap();
        store.replace(&snapshot(&["B"])).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.is_stopped(&ItemIdentity::parse("B").unwrap()));
    }

    #[tokio::test]
    async fn test_concurrent_applies_leave_one_open_interval() {
        let store = Arc::new(MemoryIntervalStore::new());
        let changes = Arc::new(diff::diff(None, &snapshot(&["A"])));

        let mut handles = Vec::new();
        for minute in 0..16 {
            let store = Arc::clone(&store);
            let changes = Arc::clone(&changes);
            handles.push(tokio::spawn(async move {
                store.apply(&changes, at(9, minute)).await.unwrap()
            }));
        }

        let mut opened = 0;
        for handle in handles {
            opened += handle.await.unwrap().opened;
        }

        assert_eq!(opened, 1);
        assert_eq!(store.open_intervals().await.unwrap().len(), 1);
    }

    /// Applies a generated run of stop/unstop snapshots and checks the open
    /// intervals after every step.
    async fn run_toggle_sequence(store: &dyn IntervalStore) {
        const ITEMS: [&str; 6] = ["A", "B", "C", "D", "E", "F"];
        let mut seed: u64 = 0x5eed_1234_abcd_0042;
        let mut stopped = [false; 6];
        let mut previous: Option<Snapshot> = None;
        let mut entered_total = 0;

        for step in 0..80i64 {
            // xorshift64
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            for (slot, flag) in stopped.iter_mut().enumerate() {
                if (seed >> (slot * 3)) & 0b11 == 0 {
                    *flag = !*flag;
                }
            }

            let names: Vec<&str> = ITEMS
                .iter()
                .zip(stopped.iter())
                .filter(|(_, s)| **s)
                .map(|(name, _)| *name)
                .collect();
            let current = snapshot(&names);
            let changes = diff::diff(previous.as_ref(), &current);
            entered_total += changes.entered.len();

            let now = at(6, 0) + Duration::minutes(step);
            store.apply(&changes, now).await.unwrap();
            if step % 7 == 0 {
                let again = store.apply(&changes, now).await.unwrap();
                assert!(!again.mutated(), "re-apply at step {} mutated the store", step);
            }

            let open = store.open_intervals().await.unwrap();
            let mut open_ids: Vec<&str> = open.iter().map(|i| i.identity.as_str()).collect();
            open_ids.sort_unstable();
            let before = open_ids.len();
            open_ids.dedup();
            assert_eq!(before, open_ids.len(), "two open intervals at step {}", step);
            assert_eq!(open_ids, names, "open set diverged at step {}", step);

            previous = Some(current);
        }

        let all = store.intervals_since(at(0, 0)).await.unwrap();
        assert_eq!(all.len(), entered_total);
        assert!(all
            .iter()
            .all(|i| i.ended_at.map_or(true, |end| end >= i.started_at)));
    }

    #[tokio::test]
    async fn test_toggle_sequence_keeps_one_open_interval_in_memory() {
        run_toggle_sequence(&MemoryIntervalStore::new()).await;
    }

    #[tokio::test]
    async fn test_toggle_sequence_keeps_one_open_interval_in_sqlite() {
        let db = crate::Database::new(crate::DbConfig::in_memory()).await.unwrap();
        run_toggle_sequence(&db.intervals(chrono_tz::UTC)).await;
        db.close().await;
    }
}
