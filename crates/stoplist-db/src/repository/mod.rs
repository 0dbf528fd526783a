//! # Repository Module
//!
//! SQLite repositories for the stoplist tracker.
//!
//! ## Repository Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Tables and Their Owners                              │
//! │                                                                         │
//! │  SyncAgent                                                              │
//! │       │                                                                 │
//! │       ├── db.intervals(tz).apply(diff, now)   → stop_intervals          │
//! │       ├── db.snapshots().load() / replace()   → active_stoplist         │
//! │       └── db.catalog().names_for(codes)       → nomenclature            │
//! │                                                                         │
//! │  Report job                                                             │
//! │       └── db.intervals(tz).intervals_since(window_start)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SqliteIntervalStore`](interval::SqliteIntervalStore) - Stop interval lifecycle
//! - [`SnapshotRepository`](snapshot::SnapshotRepository) - Previous snapshot
//! - [`CatalogRepository`](catalog::CatalogRepository) - SKU display names

pub mod catalog;
pub mod interval;
pub mod snapshot;
