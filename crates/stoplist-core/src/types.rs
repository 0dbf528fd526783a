//! # Domain Types
//!
//! Core domain types used throughout the stoplist tracker.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    Snapshot     │   │  StopInterval   │   │ AggregatedEntry │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  captured_at    │   │  id (auto)      │   │  identity       │        │
//! │  │  items: map of  │   │  identity       │   │  display_name   │        │
//! │  │   ItemState     │   │  started_at     │   │  unavailable_   │        │
//! │  │                 │   │  ended_at?      │   │    seconds      │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │  ItemIdentity   │   │    ItemState    │                              │
//! │  │  ─────────────  │   │  ─────────────  │                              │
//! │  │  SKU / product  │   │  display_name   │                              │
//! │  │  id (opaque)    │   │  stock_level    │                              │
//! │  │                 │   │  is_stopped     │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshots, diffs and aggregated entries are plain values. Only the
//! interval store creates or mutates [`StopInterval`] records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation::{validate_identity, validate_stock_level, ValidationResult};

// =============================================================================
// Item Identity
// =============================================================================

/// Opaque, stable key for a catalog item (SKU or product id).
///
/// Equality defines "same item" across snapshots. Ordering is used wherever
/// output must be deterministic (diff buckets, aggregation ties).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIdentity(String);

impl ItemIdentity {
    /// Parses an identity, trimming surrounding whitespace.
    ///
    /// ## Example
    /// ```rust
    /// use stoplist_core::ItemIdentity;
    ///
    /// let id = ItemIdentity::parse("  00412 ").unwrap();
    /// assert_eq!(id.as_str(), "00412");
    /// assert!(ItemIdentity::parse("   ").is_err());
    /// ```
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let trimmed = raw.trim();
        validate_identity(trimmed)?;
        Ok(ItemIdentity(trimmed.to_string()))
    }

    /// Returns the identity as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ItemIdentity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemIdentity::parse(s)
    }
}

// =============================================================================
// Item State
// =============================================================================

/// Availability of one item inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    /// Stable item key.
    pub identity: ItemIdentity,

    /// Name shown in reports.
    pub display_name: String,

    /// Remaining stock as reported by the provider.
    pub stock_level: f64,

    /// True when the item cannot be sold right now.
    pub is_stopped: bool,
}

impl ItemState {
    /// Creates an item state whose stop flag is derived from stock alone.
    ///
    /// Zero or negative stock means stopped.
    pub fn new(identity: ItemIdentity, display_name: impl Into<String>, stock_level: f64) -> Self {
        ItemState {
            identity,
            display_name: display_name.into(),
            stock_level,
            is_stopped: stock_level <= 0.0,
        }
    }

    /// Creates an item state the provider explicitly lists as stopped.
    ///
    /// Stop-list payloads carry a residual balance for items that are blocked
    /// before they are fully sold out; those are stopped regardless of stock.
    pub fn reported_stopped(
        identity: ItemIdentity,
        display_name: impl Into<String>,
        stock_level: f64,
    ) -> Self {
        ItemState {
            identity,
            display_name: display_name.into(),
            stock_level,
            is_stopped: true,
        }
    }

    /// Like [`ItemState::new`], rejecting a stock level that is not finite.
    pub fn try_new(
        identity: ItemIdentity,
        display_name: impl Into<String>,
        stock_level: f64,
    ) -> ValidationResult<Self> {
        validate_stock_level(stock_level)?;
        Ok(Self::new(identity, display_name, stock_level))
    }

    /// Like [`ItemState::reported_stopped`], rejecting a stock level that is
    /// not finite.
    pub fn try_reported_stopped(
        identity: ItemIdentity,
        display_name: impl Into<String>,
        stock_level: f64,
    ) -> ValidationResult<Self> {
        validate_stock_level(stock_level)?;
        Ok(Self::reported_stopped(identity, display_name, stock_level))
    }

    /// True if any attribute other than identity and stop flag differs.
    pub fn attributes_differ(&self, other: &ItemState) -> bool {
        self.stock_level != other.stock_level || self.display_name != other.display_name
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// The provider's view of item availability at one instant.
///
/// Built atomically from a single provider response. Keyed by identity, so
/// insertion order never matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the provider response was captured.
    pub captured_at: DateTime<Utc>,

    /// Items keyed by identity.
    pub items: BTreeMap<ItemIdentity, ItemState>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Snapshot {
            captured_at,
            items: BTreeMap::new(),
        }
    }

    /// Builds a snapshot from item states. Later duplicates replace earlier ones.
    pub fn from_items(
        captured_at: DateTime<Utc>,
        items: impl IntoIterator<Item = ItemState>,
    ) -> Self {
        let mut snapshot = Snapshot::new(captured_at);
        for item in items {
            snapshot.insert(item);
        }
        snapshot
    }

    /// Inserts an item, returning the state it replaced (if any).
    pub fn insert(&mut self, item: ItemState) -> Option<ItemState> {
        self.items.insert(item.identity.clone(), item)
    }

    /// Looks up an item by identity.
    pub fn get(&self, identity: &ItemIdentity) -> Option<&ItemState> {
        self.items.get(identity)
    }

    /// True if the identity is present and stopped.
    pub fn is_stopped(&self, identity: &ItemIdentity) -> bool {
        self.items.get(identity).is_some_and(|item| item.is_stopped)
    }

    /// Iterates over stopped items in identity order.
    pub fn stopped(&self) -> impl Iterator<Item = &ItemState> {
        self.items.values().filter(|item| item.is_stopped)
    }

    /// Number of items (stopped or not).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the snapshot holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Stop Interval
// =============================================================================

/// A maximal contiguous period during which an item was unavailable.
///
/// `ended_at == None` means the interval is still open. When present,
/// `ended_at >= started_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopInterval {
    /// Auto-assigned by the store.
    pub id: i64,

    /// Item this interval belongs to.
    pub identity: ItemIdentity,

    /// Name at the time the interval was opened.
    pub display_name: String,

    /// When the item became unavailable.
    pub started_at: DateTime<Utc>,

    /// When the item became available again.
    pub ended_at: Option<DateTime<Utc>>,
}

impl StopInterval {
    /// True while the item is still stopped.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// End of the interval, substituting `now` for open intervals.
    #[inline]
    pub fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.ended_at.unwrap_or(now)
    }

    /// Length in whole seconds as of `now`, never negative.
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.effective_end(now) - self.started_at).num_seconds().max(0)
    }
}

// =============================================================================
// Aggregated Entry
// =============================================================================

/// Total unavailable time of one item inside a report window.
///
/// Derived on every report request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedEntry {
    pub identity: ItemIdentity,
    pub display_name: String,
    pub unavailable_seconds: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn id(raw: &str) -> ItemIdentity {
        ItemIdentity::parse(raw).unwrap()
    }

    #[test]
    fn test_identity_trims_and_rejects_empty() {
        assert_eq!(id(" A-1 ").as_str(), "A-1");
        assert!(ItemIdentity::parse("").is_err());
        assert!("  ".parse::<ItemIdentity>().is_err());
    }

    #[test]
    fn test_identity_serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&id("00412")).unwrap(), r#""00412""#);

        let back: ItemIdentity = serde_json::from_str(r#""COKE-330""#).unwrap();
        assert_eq!(back, id("COKE-330"));
    }

    #[test]
    fn test_item_state_stop_flag() {
        assert!(ItemState::new(id("A"), "Soup", 0.0).is_stopped);
        assert!(ItemState::new(id("A"), "Soup", -2.0).is_stopped);
        assert!(!ItemState::new(id("A"), "Soup", 3.0).is_stopped);
        assert!(ItemState::reported_stopped(id("A"), "Soup", 3.0).is_stopped);
    }

    #[test]
    fn test_item_state_rejects_non_finite_stock() {
        assert!(ItemState::try_new(id("A"), "A", f64::NAN).is_err());
        assert!(ItemState::try_reported_stopped(id("A"), "A", f64::INFINITY).is_err());

        let item = ItemState::try_new(id("A"), "A", -2.0).unwrap();
        assert!(item.is_stopped);
        let item = ItemState::try_reported_stopped(id("B"), "B", 3.0).unwrap();
        assert!(item.is_stopped);
    }

    #[test]
    fn test_snapshot_last_duplicate_wins() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let snapshot = Snapshot::from_items(
            at,
            vec![
                ItemState::new(id("A"), "Soup", 0.0),
                ItemState::new(id("A"), "Soup", 4.0),
            ],
        );

        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.is_stopped(&id("A")));
    }

    #[test]
    fn test_interval_duration_clamps_and_uses_now() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 15, 0).unwrap();
        let mut interval = StopInterval {
            id: 1,
            identity: id("A"),
            display_name: "Soup".to_string(),
            started_at: start,
            ended_at: None,
        };
        assert!(interval.is_open());
        assert_eq!(interval.duration_seconds(now), 4500);

        // Clock went backwards: never negative.
        interval.ended_at = Some(start - chrono::Duration::minutes(5));
        assert_eq!(interval.duration_seconds(now), 0);
    }
}
