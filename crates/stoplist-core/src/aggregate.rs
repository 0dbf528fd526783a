//! # Duration Aggregator
//!
//! Sums how long each item was unavailable inside a report window.
//!
//! ## Clipping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  window             [=========================)                         │
//! │                   11:00                     12:00                       │
//! │                                                                         │
//! │  interval    [-----------------------------------)   10:00..12:30       │
//! │  counted            [=========================)      3600 s             │
//! │                                                                         │
//! │  open interval      [----------------------------→   ended_at = None    │
//! │  counted            [=========================)      ends at min(now,   │
//! │                                                        window end)      │
//! │                                                                         │
//! │  effective_start = max(started_at, window_start)                        │
//! │  effective_end   = min(ended_at or now, window_end)                     │
//! │  overlap <= 0    → contributes nothing                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::time::ReportWindow;
use crate::types::{AggregatedEntry, ItemIdentity, StopInterval};

struct Accumulator<'a> {
    seconds: i64,
    latest_start: DateTime<Utc>,
    display_name: &'a str,
}

/// Aggregates open and closed intervals together.
///
/// Output is sorted by unavailable time descending, ties broken by identity
/// ascending. Items with a zero total are left out. The display name is taken
/// from the most recently started contributing interval.
///
/// ## Errors
/// - [`CoreError::InvalidWindow`](crate::CoreError::InvalidWindow) if the
///   window ends before it starts
pub fn compute(
    window: &ReportWindow,
    intervals: &[StopInterval],
    now: DateTime<Utc>,
) -> CoreResult<Vec<AggregatedEntry>> {
    let resolved = window.resolve()?;
    let mut totals: HashMap<&ItemIdentity, Accumulator<'_>> = HashMap::new();

    for interval in intervals {
        let start = interval.started_at.max(resolved.start);
        let end = interval.effective_end(now).min(resolved.end);
        let overlap = (end - start).num_seconds();
        if overlap <= 0 {
            continue;
        }

        let entry = totals.entry(&interval.identity).or_insert(Accumulator {
            seconds: 0,
            latest_start: interval.started_at,
            display_name: &interval.display_name,
        });
        entry.seconds += overlap;
        if interval.started_at >= entry.latest_start {
            entry.latest_start = interval.started_at;
            entry.display_name = &interval.display_name;
        }
    }

    let mut entries: Vec<AggregatedEntry> = totals
        .into_iter()
        .map(|(identity, acc)| AggregatedEntry {
            identity: identity.clone(),
            display_name: acc.display_name.to_string(),
            unavailable_seconds: acc.seconds,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.unavailable_seconds
            .cmp(&a.unavailable_seconds)
            .then_with(|| a.identity.cmp(&b.identity))
    });

    Ok(entries)
}

/// Same as [`compute`] for callers that hold open and closed intervals in
/// separate lists.
pub fn compute_split(
    window: &ReportWindow,
    open: &[StopInterval],
    closed: &[StopInterval],
    now: DateTime<Utc>,
) -> CoreResult<Vec<AggregatedEntry>> {
    let all: Vec<StopInterval> = open.iter().chain(closed).cloned().collect();
    compute(window, &all, now)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use chrono_tz::{Europe::Moscow, UTC};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    fn window(from: (u32, u32), to: (u32, u32)) -> ReportWindow {
        ReportWindow::for_day(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveTime::from_hms_opt(from.0, from.1, 0).unwrap(),
            NaiveTime::from_hms_opt(to.0, to.1, 0).unwrap(),
            UTC,
        )
    }

    fn interval(
        row: i64,
        sku: &str,
        name: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> StopInterval {
        StopInterval {
            id: row,
            identity: ItemIdentity::parse(sku).unwrap(),
            display_name: name.to_string(),
            started_at: start,
            ended_at: end,
        }
    }

    #[test]
    fn test_closed_interval_is_clipped_to_window() {
        let rows = [interval(1, "A", "Soup", at(10, 0), Some(at(12, 30)))];
        let result = compute(&window((11, 0), (12, 0)), &rows, at(13, 0)).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].unavailable_seconds, 3600);
    }

    #[test]
    fn test_open_interval_runs_until_now() {
        let rows = [interval(1, "A", "Soup", at(8, 0), None)];
        let result = compute(&window((0, 0), (23, 59)), &rows, at(9, 15)).unwrap();

        assert_eq!(result[0].unavailable_seconds, 4500);
    }

    #[test]
    fn test_open_interval_clipped_at_window_end() {
        let rows = [interval(1, "A", "Soup", at(11, 30), None)];
        let result = compute(&window((11, 0), (12, 0)), &rows, at(18, 0)).unwrap();

        assert_eq!(result[0].unavailable_seconds, 1800);
    }

    #[test]
    fn test_multiple_intervals_sum() {
        let rows = [
            interval(1, "A", "Soup", at(9, 0), Some(at(9, 30))),
            interval(2, "A", "Soup", at(10, 0), Some(at(10, 20))),
        ];
        let result = compute(&window((0, 0), (23, 59)), &rows, at(12, 0)).unwrap();

        assert_eq!(result[0].unavailable_seconds, 3000);
    }

    #[test]
    fn test_zero_and_outside_intervals_are_excluded() {
        let rows = [
            interval(1, "A", "Soup", at(9, 0), Some(at(9, 0))),
            interval(2, "B", "Tea", at(6, 0), Some(at(7, 0))),
            interval(3, "C", "Cake", at(9, 0), Some(at(9, 1))),
        ];
        let result = compute(&window((8, 0), (21, 0)), &rows, at(12, 0)).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].identity.as_str(), "C");
    }

    #[test]
    fn test_ordering_and_latest_name() {
        let rows = [
            interval(1, "B", "Tea", at(9, 0), Some(at(9, 10))),
            interval(2, "A", "Soup", at(9, 0), Some(at(9, 10))),
            interval(3, "C", "Cake (old)", at(8, 0), Some(at(8, 30))),
            interval(4, "C", "Cake", at(10, 0), Some(at(10, 30))),
        ];
        let result = compute(&window((0, 0), (23, 59)), &rows, at(12, 0)).unwrap();

        let order: Vec<&str> = result.iter().map(|e| e.identity.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert_eq!(result[0].display_name, "Cake");
    }

    #[test]
    fn test_window_is_resolved_in_its_timezone() {
        // 08:00-09:00 Moscow == 05:00-06:00 UTC.
        let moscow = ReportWindow::for_day(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            Moscow,
        );
        let rows = [interval(1, "A", "Soup", at(5, 30), Some(at(8, 0)))];
        let result = compute(&moscow, &rows, at(12, 0)).unwrap();

        assert_eq!(result[0].unavailable_seconds, 1800);
    }

    #[test]
    fn test_split_matches_combined() {
        let open = [interval(1, "A", "Soup", at(8, 0), None)];
        let closed = [interval(2, "A", "Soup", at(6, 0), Some(at(7, 0)))];
        let w = window((0, 0), (23, 59));

        let split = compute_split(&w, &open, &closed, at(9, 0)).unwrap();
        assert_eq!(split[0].unavailable_seconds, 7200);
    }

    #[test]
    fn test_inverted_window_errors() {
        let w = ReportWindow::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(11, 0, 0).unwrap(),
            UTC,
        );
        assert!(matches!(
            compute(&w, &[], at(12, 0)),
            Err(CoreError::InvalidWindow { .. })
        ));
    }
}
