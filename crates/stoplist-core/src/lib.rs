//! # stoplist-core: Pure Stop-Interval Engine
//!
//! This crate is the **heart** of the stoplist tracker. It turns a sequence of
//! availability snapshots into open/closed stop intervals and aggregates them
//! into per-item durations over a timezone-aware window. Zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Stoplist Tracker Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                 stoplistd (binary) / stoplist-sync              │    │
//! │  │   webhook ──► SyncAgent ──► Notifier      scheduler ──► report  │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │             ★ stoplist-core (THIS CRATE) ★                      │    │
//! │  │                                                                 │    │
//! │  │   ┌──────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐      │    │
//! │  │   │   diff   │  │ lifecycle │  │ aggregate │  │  report  │      │    │
//! │  │   │ entered  │  │  open /   │  │  clipped  │  │  HH:MM   │      │    │
//! │  │   │ exited   │  │  close    │  │  seconds  │  │  text    │      │    │
//! │  │   └──────────┘  └───────────┘  └───────────┘  └──────────┘      │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                 stoplist-db (Interval Store)                    │    │
//! │  │          SQLite / in-memory stores executing ApplyPlan          │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ItemIdentity, Snapshot, StopInterval, ...)
//! - [`diff`] - Snapshot differ
//! - [`lifecycle`] - Rules for opening and closing intervals
//! - [`aggregate`] - Window-clipped duration totals
//! - [`report`] - Text rendering
//! - [`time`] - Report windows and local-time resolution
//! - [`error`] - Domain error types
//! - [`validation`] - Input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
//! use stoplist_core::{aggregate, diff, lifecycle, report, ItemIdentity, ItemState, ReportWindow, Snapshot};
//!
//! let soup = ItemIdentity::parse("SOUP").unwrap();
//! let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
//! let snapshot = Snapshot::from_items(at, vec![ItemState::new(soup, "Soup", 0.0)]);
//!
//! let changes = diff::diff(None, &snapshot);
//! let plan = lifecycle::plan(&changes, &[], at);
//! assert_eq!(plan.outcome().opened, 1);
//!
//! let window = ReportWindow::for_day(
//!     NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
//!     NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
//!     NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
//!     chrono_tz::UTC,
//! );
//! let interval = stoplist_core::StopInterval {
//!     id: 1,
//!     identity: plan.opens[0].identity.clone(),
//!     display_name: plan.opens[0].display_name.clone(),
//!     started_at: at,
//!     ended_at: None,
//! };
//! let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 15, 0).unwrap();
//! let entries = aggregate::compute(&window, &[interval], now).unwrap();
//! assert!(report::render_report(&entries, &window.label()).contains("Soup — 01:15"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod diff;
pub mod error;
pub mod lifecycle;
pub mod report;
pub mod time;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use diff::{DiffResult, ExitedItem};
pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{ApplyOutcome, ApplyPlan};
pub use time::{ReportWindow, ResolvedWindow};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Display name used when the catalog has no entry for an identity.
pub const UNKNOWN_ITEM_NAME: &str = "Unknown item";
