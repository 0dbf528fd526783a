//! # Time Handling
//!
//! Report windows and local-time resolution.
//!
//! ## Wall Clock vs Instants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Everything Is Compared In UTC                        │
//! │                                                                         │
//! │  ReportWindow { 08:00 .. 21:00, Europe/Moscow }   (local wall clock)    │
//! │       │                                                                 │
//! │       ▼  resolve()                                                      │
//! │  ResolvedWindow { 05:00Z .. 18:00Z }               (absolute instants)  │
//! │                                                                         │
//! │  "2026-03-01 09:12:00"  (legacy row, no offset)                         │
//! │       │                                                                 │
//! │       ▼  parse_timestamp(raw, Europe/Moscow)                            │
//! │  2026-03-01T06:12:00Z                                                   │
//! │                                                                         │
//! │  DST overlap (clock falls back): the EARLIER instant is used.           │
//! │  DST gap (clock springs forward): the first instant after the gap.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};

/// Longest DST gap we are willing to step over when resolving a local time.
const MAX_GAP_MINUTES: i64 = 180;

// =============================================================================
// Report Window
// =============================================================================

/// A half-open `[start, end)` range in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    /// Local start (inclusive).
    pub start: NaiveDateTime,

    /// Local end (exclusive).
    pub end: NaiveDateTime,

    /// Zone the wall-clock times are expressed in.
    pub timezone: Tz,
}

/// A report window mapped to absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ResolvedWindow {
    /// Window length in whole seconds.
    pub fn length_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

impl ReportWindow {
    /// Creates a window from explicit local start/end times.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, timezone: Tz) -> Self {
        ReportWindow {
            start,
            end,
            timezone,
        }
    }

    /// Window covering `from..to` on a given local date.
    ///
    /// If `to <= from` the window ends on the following day, which covers
    /// venues that close after midnight.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{NaiveDate, NaiveTime};
    /// use stoplist_core::ReportWindow;
    ///
    /// let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    /// let window = ReportWindow::for_day(
    ///     day,
    ///     NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
    ///     NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
    ///     chrono_tz::Europe::Moscow,
    /// );
    /// assert_eq!(window.label(), "01.03.2026 08:00-21:00");
    /// ```
    pub fn for_day(date: NaiveDate, from: NaiveTime, to: NaiveTime, timezone: Tz) -> Self {
        let start = date.and_time(from);
        let end_date = if to <= from {
            date.succ_opt().unwrap_or(date)
        } else {
            date
        };
        ReportWindow {
            start,
            end: end_date.and_time(to),
            timezone,
        }
    }

    /// Resolves both ends to UTC instants.
    ///
    /// ## Errors
    /// - [`CoreError::InvalidWindow`] if the resolved end precedes the start
    /// - [`CoreError::NonexistentLocalTime`] if a boundary cannot be resolved
    pub fn resolve(&self) -> CoreResult<ResolvedWindow> {
        let start = resolve_local(self.start, self.timezone)?;
        let end = resolve_local(self.end, self.timezone)?;

        if end < start {
            return Err(CoreError::InvalidWindow {
                start: self.start.format("%Y-%m-%d %H:%M").to_string(),
                end: self.end.format("%Y-%m-%d %H:%M").to_string(),
            });
        }

        Ok(ResolvedWindow { start, end })
    }

    /// Human-readable label used in report headers.
    pub fn label(&self) -> String {
        if self.start.date() == self.end.date() {
            format!(
                "{} {}-{}",
                self.start.format("%d.%m.%Y"),
                self.start.format("%H:%M"),
                self.end.format("%H:%M")
            )
        } else {
            format!(
                "{} - {}",
                self.start.format("%d.%m.%Y %H:%M"),
                self.end.format("%d.%m.%Y %H:%M")
            )
        }
    }
}

// =============================================================================
// Local Time Resolution
// =============================================================================

/// Maps a local wall-clock time in `tz` to an absolute instant.
///
/// Ambiguous times take the earlier instant. Times inside a DST gap resolve to
/// the first valid instant after the gap.
pub fn resolve_local(local: NaiveDateTime, tz: Tz) -> CoreResult<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            // Transitions happen on minute boundaries.
            let mut candidate = local
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(local);
            for _ in 0..MAX_GAP_MINUTES {
                candidate += Duration::minutes(1);
                if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
                    return Ok(dt.with_timezone(&Utc));
                }
            }
            Err(CoreError::NonexistentLocalTime {
                local: local.to_string(),
                timezone: tz.name().to_string(),
            })
        }
    }
}

/// Parses a stored timestamp into an absolute instant.
///
/// RFC 3339 strings carry their own offset. Strings without one are treated
/// as local wall-clock time in `assumed_tz`.
pub fn parse_timestamp(raw: &str, assumed_tz: Tz) -> CoreResult<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return resolve_local(naive, assumed_tz);
        }
    }

    Err(ValidationError::invalid_format("timestamp", format!("unrecognised '{}'", raw)).into())
}

/// Formats an instant the way the store persists it.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// =============================================================================
// Unit Tests
// =============================================================================
