//! # stoplist-db: Interval Store for the Stoplist Tracker
//!
//! Durable storage for stop intervals, the previous snapshot and catalog
//! names. SQLite via sqlx, plus an in-memory store for tests and dry runs.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Stoplist Tracker Data Flow                          │
//! │                                                                         │
//! │  SyncAgent (stoplist-sync)                                              │
//! │       │  diff = stoplist_core::diff(previous, current)                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   stoplist-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │ IntervalStore │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │    │   (store.rs)  │    │  (embedded)  │    │    │
//! │  │   │               │    │               │    │              │    │    │
//! │  │   │ SqlitePool    │◄───│ Sqlite / Mem  │    │ 001_init.sql │    │    │
//! │  │   │ writer lock   │    │ Snapshot repo │    │              │    │    │
//! │  │   │               │    │ Catalog repo  │    │              │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database                             │    │
//! │  │   stop_intervals • active_stoplist • nomenclature               │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`store`] - `IntervalStore` trait and the in-memory store
//! - [`repository`] - SQLite repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stoplist_db::{Database, DbConfig, IntervalStore};
//!
//! let db = Database::new(DbConfig::new("stoplist.db")).await?;
//! let previous = db.snapshots().load().await?;
//! let changes = stoplist_core::diff::diff(previous.as_ref(), &current);
//! db.intervals(tz).apply(&changes, Utc::now()).await?;
//! db.snapshots().replace(&current).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{IntervalStore, MemoryIntervalStore, MemorySnapshotStore, SnapshotStore};

// Repository re-exports for convenience
pub use repository::catalog::{CatalogEntry, CatalogRepository};
pub use repository::interval::SqliteIntervalStore;
pub use repository::snapshot::SnapshotRepository;
