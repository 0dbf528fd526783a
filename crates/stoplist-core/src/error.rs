//! # Error Types
//!
//! Domain-specific error types for stoplist-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stoplist-core errors (this file)                                       │
//! │  ├── CoreError        - Window / timezone / engine failures             │
//! │  └── ValidationError  - One malformed snapshot entry (skipped)          │
//! │                                                                         │
//! │  stoplist-db errors (separate crate)                                    │
//! │  └── DbError          - Store unavailable, query failures               │
//! │                                                                         │
//! │  stoplist-sync errors (separate crate)                                  │
//! │  └── SyncError        - Config, source, notifier, channel failures      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → logged, retried        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! State drift (closing an interval that is not open) and clock skew are NOT
//! errors. They are counted in `ApplyOutcome` and logged by the store.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core engine errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Report window ends before it starts.
    ///
    /// ## When This Occurs
    /// - `end < start` after resolving both ends to UTC instants
    /// - A window that straddles a DST change and collapses to negative length
    #[error("Invalid report window: {start} .. {end}")]
    InvalidWindow { start: String, end: String },

    /// A local wall-clock time could not be mapped to an instant.
    #[error("Local time {local} does not exist in {timezone}")]
    NonexistentLocalTime { local: String, timezone: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised for a single snapshot entry or a single config value. A malformed
/// entry is skipped by the caller; it never aborts the whole snapshot.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., unparsable timestamp, non-finite number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
