//! # Validation Module
//!
//! Input validation for snapshot entries and report settings.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Provider payload (stoplist-sync::source)                      │
//! │  ├── Deserialization into loose structs (all fields optional)           │
//! │  └── THIS MODULE: per-entry checks, bad entries are skipped             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine (diff / lifecycle)                                     │
//! │  └── Works only with validated ItemIdentity / ItemState values          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL constraints                                               │
//! │  └── Partial UNIQUE index: one open interval per identity               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest identity accepted from a provider.
pub const MAX_IDENTITY_LEN: usize = 100;

// =============================================================================
// Snapshot Entry Validators
// =============================================================================

/// Validates an item identity (already trimmed).
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_IDENTITY_LEN`] characters
pub fn validate_identity(identity: &str) -> ValidationResult<()> {
    if identity.is_empty() {
        return Err(ValidationError::Required {
            field: "identity".to_string(),
        });
    }

    if identity.chars().count() > MAX_IDENTITY_LEN {
        return Err(ValidationError::TooLong {
            field: "identity".to_string(),
            max: MAX_IDENTITY_LEN,
        });
    }

    Ok(())
}

/// Validates a stock level reported by the provider.
///
/// NaN and infinities cannot be compared meaningfully between snapshots.
pub fn validate_stock_level(stock_level: f64) -> ValidationResult<()> {
    if !stock_level.is_finite() {
        return Err(ValidationError::invalid_format(
            "stock_level",
            format!("{} is not a finite number", stock_level),
        ));
    }
    Ok(())
}

// =============================================================================
// Report Setting Validators
// =============================================================================

/// Parses an IANA timezone name such as `Europe/Moscow`.
pub fn parse_timezone(name: &str) -> ValidationResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::invalid_format("timezone", format!("unknown zone '{}'", name)))
}

/// Parses a wall-clock time written as `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(raw: &str) -> ValidationResult<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ValidationError::invalid_format("time", format!("expected HH:MM, got '{}'", raw)))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identity() {
        assert!(validate_identity("00412").is_ok());
        assert!(validate_identity("COKE-330").is_ok());

        assert!(validate_identity("").is_err());
        assert!(validate_identity(&"A".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        assert!(validate_stock_level(0.0).is_ok());
        assert!(validate_stock_level(-1.5).is_ok());
        assert!(validate_stock_level(f64::NAN).is_err());
        assert!(validate_stock_level(f64::INFINITY).is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Europe/Moscow").unwrap(), chrono_tz::Europe::Moscow);
        assert_eq!(parse_timezone(" UTC ").unwrap(), chrono_tz::UTC);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(
            parse_clock_time("08:00").unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(
            parse_clock_time("21:30:15").unwrap(),
            NaiveTime::from_hms_opt(21, 30, 15).unwrap()
        );
        assert!(parse_clock_time("25:00").is_err());
        assert!(parse_clock_time("noon").is_err());
    }
}
