//! # stoplist-sync: Service Layer for the Stoplist Tracker
//!
//! Wires the pure engine and the interval store to the outside world:
//! triggers, configuration, the provider payload and message delivery.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Service Architecture                             │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐     │
//! │  │ WebhookServer  │  │ DailyScheduler │  │  poll interval         │     │
//! │  │ (axum)         │  │ (tokio task)   │  │  (agent ticker)        │     │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘     │
//! │          │ Trigger::Sync     │ Trigger::Report       │ Trigger::Sync    │
//! │          └───────────────────┼───────────────────────┘                  │
//! │                              ▼                                          │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                      SyncAgent (one task)                        │   │
//! │  │                                                                  │   │
//! │  │   SnapshotSource ──► diff ──► IntervalStore ──► Notifier         │   │
//! │  │                                                                  │   │
//! │  │   IntervalStore ──► aggregate ──► render_report ──► Notifier     │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent`, triggers, handle and builder
//! - [`config`] - Service configuration (TOML + environment)
//! - [`error`] - Sync error types
//! - [`notify`] - `Notifier` trait and the log/stdout notifiers
//! - [`scheduler`] - Daily report timer
//! - [`source`] - `SnapshotSource` trait and the provider payload parser
//! - [`webhook`] - Provider push listener

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod source;
pub mod webhook;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{Clock, CycleReport, SyncAgent, SyncAgentBuilder, SyncAgentHandle, Trigger};
pub use config::ServiceConfig;
pub use error::{SyncError, SyncResult};
pub use notify::{LogNotifier, Notifier, StdoutNotifier};
pub use scheduler::{DailyScheduler, SchedulerHandle};
pub use source::{FileSnapshotSource, SnapshotSource};
pub use webhook::{WebhookHandle, WebhookServer};
