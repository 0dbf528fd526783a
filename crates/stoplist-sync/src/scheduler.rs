//! # Daily Report Scheduler
//!
//! Sends a [`Trigger::Report`] once a day at the configured local time.
//!
//! ## Timing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Scheduler Loop                                    │
//! │                                                                         │
//! │  now ──► next_run_after(now, send_at, tz) ──► sleep until then          │
//! │                                                 │                       │
//! │           shutdown ◄── select! ─────────────────┤                       │
//! │                                                 ▼                       │
//! │                     report_date_for(fire time) ──► Trigger::Report      │
//! │                                                                         │
//! │  send_at is wall-clock time in the report timezone, so the UTC fire     │
//! │  time moves with DST.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stoplist_core::time::resolve_local;

use crate::agent::Trigger;
use crate::config::ServiceConfig;
use crate::error::SyncResult;

// =============================================================================
// Pure Timing Helpers
// =============================================================================

/// The first instant strictly after `now` whose local time in `tz` is `send_at`.
pub fn next_run_after(now: DateTime<Utc>, send_at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();

    let mut date = today;
    // A DST gap can push one day's candidate into the past; two days ahead
    // always lands after `now`.
    for _ in 0..3 {
        if let Ok(candidate) = resolve_local(date.and_time(send_at), tz) {
            if candidate > now {
                return candidate;
            }
        }
        date = date.checked_add_days(Days::new(1)).unwrap_or(date);
    }

    now + chrono::Duration::days(1)
}

/// The local date whose window a report fired at `fire_local` covers.
///
/// That is the latest window that has already started: with a `18:00-02:00`
/// window a report at 01:30 belongs to the previous day.
pub fn report_date_for(fire_local: NaiveDateTime, window_start: NaiveTime) -> NaiveDate {
    let date = fire_local.date();
    if fire_local.time() < window_start {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

// =============================================================================
// Scheduler Task
// =============================================================================

/// Background task firing the daily report.
pub struct DailyScheduler {
    send_at: NaiveTime,
    window_start: NaiveTime,
    timezone: Tz,
    trigger_tx: mpsc::Sender<Trigger>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl DailyScheduler {
    /// Spawns the scheduler from the report settings.
    pub fn start(
        config: &ServiceConfig,
        trigger_tx: mpsc::Sender<Trigger>,
    ) -> SyncResult<(SchedulerHandle, JoinHandle<()>)> {
        let (window_start, _) = config.window_times()?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let scheduler = DailyScheduler {
            send_at: config.send_at()?,
            window_start,
            timezone: config.timezone()?,
            trigger_tx,
            shutdown_rx,
        };

        let task = tokio::spawn(scheduler.run());
        Ok((SchedulerHandle { shutdown_tx }, task))
    }

    async fn run(mut self) {
        info!(send_at = %self.send_at, timezone = %self.timezone, "Daily scheduler starting");

        let mut last_fire = Utc::now();

        loop {
            let now = Utc::now();
            // Never fire the same slot twice if the wall clock lags the timer.
            let next = next_run_after(now.max(last_fire), self.send_at, self.timezone);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, "Next report scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_fire = next;
                    let fire_local = next.with_timezone(&self.timezone).naive_local();
                    let date = report_date_for(fire_local, self.window_start);

                    info!(date = %date, "Daily report due");
                    if self.trigger_tx.send(Trigger::Report { date: Some(date) }).await.is_err() {
                        warn!("Agent is gone, stopping scheduler");
                        break;
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Daily scheduler shutting down");
                    break;
                }
            }
        }

        info!("Daily scheduler stopped");
    }
}

/// Handle for stopping a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Signals the scheduler to stop.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
