//! # Sync Error Types
//!
//! Error types for the service layer.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Configuration  │  │     Source      │  │       Store             │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  InvalidConfig  │  │  SourceUnavail. │  │  StoreUnavailable       │  │
//! │  │  ConfigLoad     │  │  InvalidPayload │  │  DatabaseError          │  │
//! │  │  ConfigSave     │  │                 │  │                         │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │     Report      │  │     Notify      │  │      Runtime            │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  ReportFailed   │  │  NotifyFailed   │  │  ChannelError           │  │
//! │  │                 │  │                 │  │  BindFailed             │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  A failed cycle is logged; the next trigger tries again.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use stoplist_core::CoreError;
use stoplist_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every service-layer failure.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Source Errors
    // =========================================================================
    /// The provider could not be reached or its payload could not be read.
    #[error("Snapshot source unavailable: {0}")]
    SourceUnavailable(String),

    /// The provider payload is not the expected shape at all.
    #[error("Invalid provider payload: {0}")]
    InvalidPayload(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// The interval store could not be reached; nothing was committed.
    #[error("Interval store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Report / Notify Errors
    // =========================================================================
    /// Report window or aggregation failed.
    #[error("Report failed: {0}")]
    ReportFailed(String),

    /// Delivering a message failed.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Webhook listener could not bind.
    #[error("Failed to bind {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    /// The agent loop has stopped and no longer takes triggers.
    #[error("Sync agent is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            SyncError::StoreUnavailable(err.to_string())
        } else {
            SyncError::DatabaseError(err.to_string())
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        SyncError::ReportFailed(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidPayload(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the next trigger may succeed without intervention.
    ///
    /// ## Retryable Errors
    /// - Provider or store temporarily unreachable
    /// - Notification channel hiccups
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Malformed provider payloads
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable(_)
                | SyncError::StoreUnavailable(_)
                | SyncError::NotifyFailed(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::SourceUnavailable("timeout".into()).is_retryable());
        assert!(SyncError::from(DbError::PoolExhausted).is_retryable());

        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::from(DbError::QueryFailed("syntax".into())).is_retryable());
        assert!(!SyncError::InvalidPayload("not json".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidConfig("port".into()).is_config_error());
        assert!(!SyncError::ShuttingDown.is_config_error());
    }

    #[test]
    fn test_core_error_maps_to_report_failure() {
        let err: SyncError = CoreError::InvalidWindow {
            start: "2026-03-01 12:00".into(),
            end: "2026-03-01 11:00".into(),
        }
        .into();
        assert!(matches!(err, SyncError::ReportFailed(_)));
        assert!(err.to_string().contains("2026-03-01 11:00"));
    }
}
