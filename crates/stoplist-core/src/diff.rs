//! # Snapshot Differ
//!
//! Compares the previous known availability state with a new snapshot.
//!
//! ## Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  previous            current           bucket           │
//! │  ─────────────────────────────────────────────────────────────────────  │
//! │  absent / available  →  stopped              →  entered                 │
//! │  stopped             →  absent / available   →  exited                  │
//! │  stopped             →  stopped, same attrs  →  unchanged               │
//! │  stopped             →  stopped, new stock   →  changed                 │
//! │  available           →  available            →  (omitted)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `changed` never opens an interval: the store already holds the open one.
//! It exists so the formatter can surface stock movements inside the stop list.

use serde::{Deserialize, Serialize};

use crate::types::{ItemIdentity, ItemState, Snapshot};

/// An identity that left the stop list, with the name it was last seen under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitedItem {
    pub identity: ItemIdentity,
    pub display_name: String,
}

/// Result of comparing two snapshots. Every bucket is sorted by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub entered: Vec<ItemState>,
    pub exited: Vec<ExitedItem>,
    pub unchanged: Vec<ItemState>,
    pub changed: Vec<ItemState>,
}

impl DiffResult {
    /// True when nothing entered, exited or changed.
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty() && self.changed.is_empty()
    }

    /// True when the set of stopped identities moved.
    pub fn has_transitions(&self) -> bool {
        !self.entered.is_empty() || !self.exited.is_empty()
    }

    /// Identities stopped in the current snapshot (entered + unchanged + changed).
    pub fn still_stopped_count(&self) -> usize {
        self.entered.len() + self.unchanged.len() + self.changed.len()
    }
}

/// Classifies every identity in `previous` and `current`.
///
/// Pure function. With no previous snapshot every stopped item is entered.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use stoplist_core::{diff, ItemIdentity, ItemState, Snapshot};
///
/// let soup = ItemIdentity::parse("SOUP").unwrap();
/// let current = Snapshot::from_items(Utc::now(), vec![ItemState::new(soup, "Soup", 0.0)]);
///
/// let result = diff::diff(None, &current);
/// assert_eq!(result.entered.len(), 1);
/// assert!(diff::diff(Some(&current), &current).is_empty());
/// ```
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot) -> DiffResult {
    let mut result = DiffResult::default();

    // Both maps iterate in identity order, so every bucket comes out sorted.
    for item in current.stopped() {
        match previous.and_then(|p| p.get(&item.identity)) {
            Some(prev) if prev.is_stopped => {
                if prev.attributes_differ(item) {
                    result.changed.push(item.clone());
                } else {
                    result.unchanged.push(item.clone());
                }
            }
            _ => result.entered.push(item.clone()),
        }
    }

    if let Some(previous) = previous {
        for prev in previous.stopped() {
            if !current.is_stopped(&prev.identity) {
                result.exited.push(ExitedItem {
                    identity: prev.identity.clone(),
                    display_name: prev.display_name.clone(),
                });
            }
        }
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
