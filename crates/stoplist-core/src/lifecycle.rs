//! # Interval Lifecycle Rules
//!
//! Turns a [`DiffResult`] plus the currently open intervals into a plan of
//! opens and closes. Every store executes the same plan, so the rules live
//! here once and the stores only differ in how they persist it.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entered,  no open interval      →  OPEN  (started_at = now)            │
//! │  entered,  open interval exists  →  skip  (already_open)                │
//! │  exited,   open interval exists  →  CLOSE (ended_at = now)              │
//! │  exited,   nothing open          →  skip  (drift, warning only)         │
//! │  changed / unchanged             →  nothing                             │
//! │                                                                         │
//! │  now < started_at on close       →  ended_at = started_at (clock_skew)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::DiffResult;
use crate::types::{ItemIdentity, StopInterval};

/// A new interval to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOpen {
    pub identity: ItemIdentity,
    pub display_name: String,
    pub started_at: DateTime<Utc>,
}

/// An existing open interval to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedClose {
    pub interval_id: i64,
    pub identity: ItemIdentity,
    pub ended_at: DateTime<Utc>,
    /// `now` was earlier than `started_at` and got clamped.
    pub clamped: bool,
}

/// Everything one `apply` call will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    pub opens: Vec<PlannedOpen>,
    pub closes: Vec<PlannedClose>,
    /// Entered identities that already had an open interval.
    pub already_open: Vec<ItemIdentity>,
    /// Exited identities with no open interval.
    pub drift: Vec<ItemIdentity>,
}

/// Counters reported back to the caller after an apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub opened: usize,
    pub closed: usize,
    pub already_open: usize,
    pub drift: usize,
    pub clock_skew: usize,
}

impl ApplyOutcome {
    /// True if the store was modified.
    pub fn mutated(&self) -> bool {
        self.opened > 0 || self.closed > 0
    }
}

impl ApplyPlan {
    /// True when there is nothing to write.
    pub fn is_noop(&self) -> bool {
        self.opens.is_empty() && self.closes.is_empty()
    }

    /// Summarises the plan as counters.
    pub fn outcome(&self) -> ApplyOutcome {
        ApplyOutcome {
            opened: self.opens.len(),
            closed: self.closes.len(),
            already_open: self.already_open.len(),
            drift: self.drift.len(),
            clock_skew: self.closes.iter().filter(|c| c.clamped).count(),
        }
    }
}

/// Builds the plan for applying `diff` at `now` given the open intervals.
///
/// `open` must be read inside the same critical section that executes the
/// plan, otherwise the duplicate-open guard is meaningless.
pub fn plan(diff: &DiffResult, open: &[StopInterval], now: DateTime<Utc>) -> ApplyPlan {
    let mut open_by_identity: HashMap<&ItemIdentity, Vec<&StopInterval>> = HashMap::new();
    for interval in open.iter().filter(|i| i.is_open()) {
        open_by_identity
            .entry(&interval.identity)
            .or_default()
            .push(interval);
    }

    let mut result = ApplyPlan::default();
    let mut planned: HashSet<&ItemIdentity> = HashSet::new();

    for item in &diff.entered {
        if open_by_identity.contains_key(&item.identity) || !planned.insert(&item.identity) {
            result.already_open.push(item.identity.clone());
            continue;
        }
        result.opens.push(PlannedOpen {
            identity: item.identity.clone(),
            display_name: item.display_name.clone(),
            started_at: now,
        });
    }

    for item in &diff.exited {
        let Some(intervals) = open_by_identity.get(&item.identity) else {
            result.drift.push(item.identity.clone());
            continue;
        };

        // More than one open row is a broken store; closing all of them repairs it.
        for interval in intervals {
            let clamped = now < interval.started_at;
            result.closes.push(PlannedClose {
                interval_id: interval.id,
                identity: item.identity.clone(),
                ended_at: if clamped { interval.started_at } else { now },
                clamped,
            });
        }
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ExitedItem;
    use crate::types::ItemState;
    use chrono::{Duration, TimeZone};

    fn id(raw: &str) -> ItemIdentity {
        ItemIdentity::parse(raw).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    fn open_interval(row: i64, sku: &str, started_at: DateTime<Utc>) -> StopInterval {
        StopInterval {
            id: row,
            identity: id(sku),
            display_name: sku.to_string(),
            started_at,
            ended_at: None,
        }
    }

    fn entered(sku: &str) -> ItemState {
        ItemState::new(id(sku), sku, 0.0)
    }

    fn exited(sku: &str) -> ExitedItem {
        ExitedItem {
            identity: id(sku),
            display_name: sku.to_string(),
        }
    }

    #[test]
    fn test_entered_opens_at_now() {
        let diff = DiffResult {
            entered: vec![entered("A")],
            ..Default::default()
        };
        let plan = plan(&diff, &[], at(9, 0));

        assert_eq!(plan.opens.len(), 1);
        assert_eq!(plan.opens[0].started_at, at(9, 0));
        assert_eq!(plan.outcome().opened, 1);
    }

    #[test]
    fn test_entered_with_open_interval_is_skipped() {
        let diff = DiffResult {
            entered: vec![entered("A"), entered("A")],
            ..Default::default()
        };

        let plan_existing = plan(&diff, &[open_interval(1, "A", at(8, 0))], at(9, 0));
        assert!(plan_existing.opens.is_empty());
        assert_eq!(plan_existing.already_open.len(), 2);

        // Duplicate inside one diff still opens only once.
        let plan_fresh = plan(&diff, &[], at(9, 0));
        assert_eq!(plan_fresh.opens.len(), 1);
        assert_eq!(plan_fresh.already_open.len(), 1);
    }

    #[test]
    fn test_exit_closes_open_interval() {
        let diff = DiffResult {
            exited: vec![exited("A")],
            ..Default::default()
        };
        let plan = plan(&diff, &[open_interval(7, "A", at(8, 0))], at(9, 0));

        assert_eq!(plan.closes.len(), 1);
        assert_eq!(plan.closes[0].interval_id, 7);
        assert_eq!(plan.closes[0].ended_at, at(9, 0));
        assert!(!plan.closes[0].clamped);
    }

    #[test]
    fn test_exit_without_open_interval_is_drift() {
        let diff = DiffResult {
            exited: vec![exited("A"), exited("B")],
            ..Default::default()
        };
        let plan = plan(&diff, &[open_interval(1, "B", at(8, 0))], at(9, 0));

        assert_eq!(plan.drift, vec![id("A")]);
        assert_eq!(plan.closes.len(), 1);
        assert_eq!(plan.outcome().drift, 1);
    }

    #[test]
    fn test_clock_skew_clamps_to_zero_length() {
        let started = at(9, 0);
        let diff = DiffResult {
            exited: vec![exited("A")],
            ..Default::default()
        };
        let plan = plan(&diff, &[open_interval(1, "A", started)], started - Duration::minutes(3));

        assert!(plan.closes[0].clamped);
        assert_eq!(plan.closes[0].ended_at, started);
        assert_eq!(plan.outcome().clock_skew, 1);
    }

    #[test]
    fn test_changed_and_unchanged_do_nothing() {
        let diff = DiffResult {
            changed: vec![entered("A")],
            unchanged: vec![entered("B")],
            ..Default::default()
        };
        let plan = plan(&diff, &[open_interval(1, "A", at(8, 0))], at(9, 0));

        assert!(plan.is_noop());
        assert!(!plan.outcome().mutated());
    }

    #[test]
    fn test_duplicate_open_rows_are_all_closed() {
        let diff = DiffResult {
            exited: vec![exited("A")],
            ..Default::default()
        };
        let rows = [open_interval(1, "A", at(8, 0)), open_interval(2, "A", at(8, 30))];
        let plan = plan(&diff, &rows, at(9, 0));

        let closed: Vec<i64> = plan.closes.iter().map(|c| c.interval_id).collect();
        assert_eq!(closed, vec![1, 2]);
    }
}
