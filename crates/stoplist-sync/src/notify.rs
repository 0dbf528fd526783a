//! # Notifiers
//!
//! Delivery of sync summaries and daily reports.

use async_trait::async_trait;
use std::io::Write;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};

/// Delivers rendered text to whoever should read it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> SyncResult<()>;
}

/// Writes each message to the log once per configured recipient.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    recipients: Vec<String>,
}

impl LogNotifier {
    pub fn new(recipients: Vec<String>) -> Self {
        LogNotifier { recipients }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> SyncResult<()> {
        if self.recipients.is_empty() {
            warn!("No recipients configured, message not delivered");
            return Ok(());
        }

        for recipient in &self.recipients {
            info!(recipient = %recipient, chars = message.chars().count(), "Delivering message");
            info!(recipient = %recipient, "{}", message);
        }
        Ok(())
    }
}

/// Prints messages to stdout. Used by the one-shot CLI commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, message: &str) -> SyncResult<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", message)
            .and_then(|()| stdout.flush())
            .map_err(|e| SyncError::NotifyFailed(format!("stdout: {}", e)))
    }
}

/// Keeps every message in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    messages: tokio::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub(crate) async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> SyncResult<()> {
        self.messages.lock().await.push(message.to_string());
        Ok(())
    }
}

/// Fails every delivery with `error`.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct FailingNotifier {
    pub(crate) error: fn() -> SyncError,
}

#[cfg(test)]
#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _message: &str) -> SyncResult<()> {
        Err((self.error)())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_without_recipients_succeeds() {
        let notifier = LogNotifier::new(Vec::new());
        assert!(notifier.send("report").await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::default();
        notifier.send("first").await.unwrap();
        notifier.send("second").await.unwrap();
        assert_eq!(notifier.messages().await, vec!["first", "second"]);
    }
}
