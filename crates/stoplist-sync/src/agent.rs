//! # Sync Agent
//!
//! Main orchestrator for the service. Owns the collaborators and runs sync
//! cycles and reports one at a time as triggers arrive.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │   WebhookServer ──┐                                                     │
//! │   poll interval ──┼──► Trigger::Sync ──────┐                            │
//! │                   │                        ▼                            │
//! │   DailyScheduler ─┴──► Trigger::Report ──► SyncAgent::run (one task)    │
//! │                                            │                            │
//! │         ┌──────────────────────────────────┼──────────────────────┐     │
//! │         ▼                                  ▼                      │     │
//! │  ┌──────────────────────────────┐  ┌──────────────────────────┐   │     │
//! │  │ sync_once                    │  │ report_once              │   │     │
//! │  │                              │  │                          │   │     │
//! │  │ source.fetch                 │  │ config → ReportWindow    │   │     │
//! │  │ snapshots.load               │  │ intervals_since(start)   │   │     │
//! │  │ diff(previous, current)      │  │ aggregate::compute       │   │     │
//! │  │ intervals.apply  ◄── commit  │  │ render_report            │   │     │
//! │  │ snapshots.replace            │  │ notifier.send            │   │     │
//! │  │ notifier.send(summary)       │  └──────────────────────────┘   │     │
//! │  └──────────────────────────────┘                                 │     │
//! │                                                                   │     │
//! │  A failed cycle is logged and retried on the next trigger.        │     │
//! └───────────────────────────────────────────────────────────────────┴─────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use stoplist_core::report::{render_report, render_sync_summary};
use stoplist_core::{aggregate, diff, ApplyOutcome, DiffResult};
use stoplist_db::{IntervalStore, SnapshotStore};

use crate::config::ServiceConfig;
use crate::error::{SyncError, SyncResult};
use crate::notify::Notifier;
use crate::source::SnapshotSource;

/// Source of "now" for every cycle.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Capacity of the trigger queue.
const TRIGGER_BUFFER: usize = 32;

// =============================================================================
// Triggers
// =============================================================================

/// Work the agent can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fetch a snapshot and apply it.
    Sync,

    /// Send the report for a local date (`None` = today in the report timezone).
    Report { date: Option<NaiveDate> },
}

/// What one sync cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub diff: DiffResult,
    pub outcome: ApplyOutcome,
    /// Whether a summary was sent.
    pub notified: bool,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Runs sync cycles and reports against the configured collaborators.
pub struct SyncAgent {
    config: ServiceConfig,
    timezone: Tz,
    intervals: Arc<dyn IntervalStore>,
    snapshots: Arc<dyn SnapshotStore>,
    source: Arc<dyn SnapshotSource>,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
}

impl SyncAgent {
    /// Returns the report timezone.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Runs one sync cycle.
    ///
    /// The interval store is committed before the snapshot is replaced, so a
    /// failure between the two only repeats the same diff next time, which
    /// applies as a no-op.
    pub async fn sync_once(&self) -> SyncResult<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("sync_cycle", cycle_id = %cycle_id);

        async move {
            let now = (self.clock)();

            let current = self.source.fetch(now).await?;
            let previous = self.snapshots.load().await?;
            let changes = diff::diff(previous.as_ref(), &current);

            debug!(
                entered = changes.entered.len(),
                exited = changes.exited.len(),
                unchanged = changes.unchanged.len(),
                changed = changes.changed.len(),
                "Snapshot diffed"
            );

            let outcome = self.intervals.apply(&changes, now).await?;
            self.snapshots.replace(&current).await?;

            info!(
                opened = outcome.opened,
                closed = outcome.closed,
                drift = outcome.drift,
                clock_skew = outcome.clock_skew,
                "Sync cycle applied"
            );

            let mut notified = false;
            if !changes.is_empty() || self.config.notify.always_send {
                // Intervals and snapshot are committed by now.
                match self.deliver(&render_sync_summary(&changes)).await {
                    Ok(()) => notified = true,
                    Err(e) => warn!(error = %e, "Failed to send sync summary"),
                }
            } else {
                debug!("No changes, summary not sent");
            }

            Ok(CycleReport {
                cycle_id,
                diff: changes,
                outcome,
                notified,
            })
        }
        .instrument(span)
        .await
    }

    /// Builds and sends the report for a local date, returning its text.
    pub async fn report_once(&self, date: Option<NaiveDate>) -> SyncResult<String> {
        let now = (self.clock)();
        let date = date.unwrap_or_else(|| now.with_timezone(&self.timezone).date_naive());

        let window = self.config.report_window_for(date)?;
        let resolved = window.resolve()?;

        let intervals = self.intervals.intervals_since(resolved.start).await?;
        let entries = aggregate::compute(&window, &intervals, now)?;
        let text = render_report(&entries, &window.label());

        info!(
            date = %date,
            items = entries.len(),
            intervals = intervals.len(),
            "Report built"
        );

        self.deliver(&text).await?;
        Ok(text)
    }

    /// Sends through the notifier; any failure is reported as `NotifyFailed`.
    async fn deliver(&self, text: &str) -> SyncResult<()> {
        self.notifier.send(text).await.map_err(|e| match e {
            SyncError::NotifyFailed(_) => e,
            other => SyncError::NotifyFailed(other.to_string()),
        })
    }

    /// Spawns the agent loop and returns a handle for feeding it triggers.
    pub fn start(self) -> (SyncAgentHandle, JoinHandle<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_BUFFER);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(self.run(trigger_rx, shutdown_rx));
        (SyncAgentHandle::new(trigger_tx, shutdown_tx), task)
    }

    /// Main loop: waits for triggers, the poll tick or shutdown.
    async fn run(
        self,
        mut trigger_rx: mpsc::Receiver<Trigger>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let poll = self.config.poll_interval();
        info!(poll_secs = ?poll.map(|p| p.as_secs()), "Sync agent starting");

        let mut ticker = tokio::time::interval(poll.unwrap_or(std::time::Duration::from_secs(3600)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick(), if poll.is_some() => {
                    self.handle(Trigger::Sync).await;
                }

                maybe = trigger_rx.recv() => {
                    match maybe {
                        Some(trigger) => self.handle(trigger).await,
                        None => {
                            info!("All trigger senders dropped");
                            break;
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Sync agent shutting down");
                    break;
                }
            }
        }

        info!("Sync agent stopped");
    }

    async fn handle(&self, trigger: Trigger) {
        let result = match trigger {
            Trigger::Sync => self.sync_once().await.map(|_| ()),
            Trigger::Report { date } => self.report_once(date).await.map(|_| ()),
        };

        if let Err(e) = result {
            if e.is_retryable() {
                warn!(?trigger, error = %e, "Cycle failed, will retry on next trigger");
            } else {
                error!(?trigger, error = %e, "Cycle failed");
            }
        }
    }
}

// =============================================================================
// Agent Handle
// =============================================================================

/// Handle for controlling a running SyncAgent from outside.
#[derive(Debug, Clone)]
pub struct SyncAgentHandle {
    trigger_tx: mpsc::Sender<Trigger>,
    shutdown_tx: mpsc::Sender<()>,
}

impl SyncAgentHandle {
    pub(crate) fn new(trigger_tx: mpsc::Sender<Trigger>, shutdown_tx: mpsc::Sender<()>) -> Self {
        SyncAgentHandle {
            trigger_tx,
            shutdown_tx,
        }
    }

    /// Queues a sync cycle.
    pub async fn trigger_sync(&self) -> SyncResult<()> {
        self.send(Trigger::Sync).await
    }

    /// Queues a report for `date` (today when `None`).
    pub async fn trigger_report(&self, date: Option<NaiveDate>) -> SyncResult<()> {
        self.send(Trigger::Report { date }).await
    }

    /// A sender other components can use to queue triggers.
    pub fn sender(&self) -> mpsc::Sender<Trigger> {
        self.trigger_tx.clone()
    }

    /// Fails with [`SyncError::ShuttingDown`] once the agent loop has exited.
    async fn send(&self, trigger: Trigger) -> SyncResult<()> {
        self.trigger_tx
            .send(trigger)
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }

    /// Signals the agent to shut down gracefully.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a SyncAgent.
pub struct SyncAgentBuilder {
    config: ServiceConfig,
    intervals: Option<Arc<dyn IntervalStore>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    source: Option<Arc<dyn SnapshotSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Clock>,
}

impl SyncAgentBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: ServiceConfig) -> Self {
        SyncAgentBuilder {
            config,
            intervals: None,
            snapshots: None,
            source: None,
            notifier: None,
            clock: None,
        }
    }

    pub fn with_interval_store(mut self, store: Arc<dyn IntervalStore>) -> Self {
        self.intervals = Some(store);
        self
    }

    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the wall clock. Defaults to `Utc::now`.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the SyncAgent.
    pub fn build(self) -> SyncResult<SyncAgent> {
        let timezone = self.config.timezone()?;

        let intervals = self
            .intervals
            .ok_or_else(|| SyncError::InvalidConfig("Interval store required".into()))?;
        let snapshots = self
            .snapshots
            .ok_or_else(|| SyncError::InvalidConfig("Snapshot store required".into()))?;
        let source = self
            .source
            .ok_or_else(|| SyncError::InvalidConfig("Snapshot source required".into()))?;
        let notifier = self
            .notifier
            .ok_or_else(|| SyncError::InvalidConfig("Notifier required".into()))?;
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Utc::now),
        };

        Ok(SyncAgent {
            config: self.config,
            timezone,
            intervals,
            snapshots,
            source,
            notifier,
            clock,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
