//! # Snapshot Source
//!
//! Turns the provider's stop-list payload into a [`Snapshot`].
//!
//! ## Payload Shape
//! ```text
//! {
//!   "terminalGroupStopLists": [            ← one per organization
//!     { "items": [                         ← one per terminal group
//!         { "items": [                     ← stopped products
//!             { "productId": "…", "sku": "00412", "balance": 0.0 }
//!         ] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Every entry in the payload is stopped, whatever its balance says. Entries
//! without a usable `sku` or with a non-finite balance are skipped with a
//! warning and never abort the snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use stoplist_core::validation::validate_stock_level;
use stoplist_core::{ItemIdentity, ItemState, Snapshot, UNKNOWN_ITEM_NAME};
use stoplist_db::CatalogRepository;

use crate::error::{SyncError, SyncResult};

/// Produces the provider's current view of stopped items.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches a fresh snapshot captured at `now`.
    async fn fetch(&self, now: DateTime<Utc>) -> SyncResult<Snapshot>;
}

// =============================================================================
// Payload Parsing
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopListPayload {
    terminal_group_stop_lists: Vec<OrganizationStopList>,
}

#[derive(Debug, Deserialize)]
struct OrganizationStopList {
    #[serde(default)]
    items: Vec<TerminalGroupStopList>,
}

#[derive(Debug, Deserialize)]
struct TerminalGroupStopList {
    #[serde(default)]
    items: Vec<RawStopEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStopEntry {
    product_id: Option<String>,
    sku: Option<String>,
    balance: Option<f64>,
}

/// One well-formed stop-list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StopEntry {
    pub identity: ItemIdentity,
    pub product_id: Option<String>,
    pub balance: f64,
}

/// Parses a stop-list payload, skipping malformed entries.
///
/// ## Errors
/// - [`SyncError::InvalidPayload`] if the document is not JSON or lacks
///   `terminalGroupStopLists`
pub fn parse_stop_list(json: &str) -> SyncResult<Vec<StopEntry>> {
    let payload: StopListPayload = serde_json::from_str(json)?;

    let mut entries = Vec::new();
    let mut skipped = 0usize;

    let raw_entries = payload
        .terminal_group_stop_lists
        .into_iter()
        .flat_map(|org| org.items)
        .flat_map(|group| group.items);

    for raw in raw_entries {
        match stop_entry_from(raw) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                skipped += 1;
                warn!(reason = %reason, "Malformed stop-list entry, skipping");
            }
        }
    }

    debug!(entries = entries.len(), skipped, "Parsed stop-list payload");
    Ok(entries)
}

/// Checks one raw entry. A missing balance counts as zero.
fn stop_entry_from(raw: RawStopEntry) -> Result<StopEntry, String> {
    let product = raw.product_id.as_deref().unwrap_or("?");

    let sku = raw
        .sku
        .as_deref()
        .ok_or_else(|| format!("product {}: no sku", product))?;
    let identity = ItemIdentity::parse(sku).map_err(|e| format!("product {}: {}", product, e))?;

    let balance = raw.balance.unwrap_or(0.0);
    validate_stock_level(balance).map_err(|e| format!("product {}: {}", product, e))?;

    Ok(StopEntry {
        identity,
        product_id: raw.product_id,
        balance,
    })
}

// =============================================================================
// File Source
// =============================================================================

/// Reads the payload from a file and names items from the catalog.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
    catalog: CatalogRepository,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>, catalog: CatalogRepository) -> Self {
        FileSnapshotSource {
            path: path.into(),
            catalog,
        }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch(&self, now: DateTime<Utc>) -> SyncResult<Snapshot> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SyncError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let entries = parse_stop_list(&contents)?;

        let codes: Vec<&str> = entries.iter().map(|e| e.identity.as_str()).collect();
        let names = self.catalog.names_for(&codes).await?;

        let mut snapshot = Snapshot::new(now);
        for entry in entries {
            let name = names
                .get(entry.identity.as_str())
                .cloned()
                .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string());
            let identity = entry.identity.clone();

            let item = match ItemState::try_reported_stopped(entry.identity, name, entry.balance) {
                Ok(item) => item,
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Invalid stop-list entry, skipping");
                    continue;
                }
            };

            if snapshot.insert(item).is_some() {
                warn!(identity = %identity, "Item listed more than once, keeping the last entry");
            }
        }

        Ok(snapshot)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stoplist_db::{CatalogEntry, Database, DbConfig};

    const PAYLOAD: &str = r#"{
        "terminalGroupStopLists": [
            { "organizationId": "org-1", "items": [
                { "terminalGroupId": "tg-1", "items": [
                    { "productId": "p-1", "sku": "00412", "balance": 0.0 },
                    { "productId": "p-2", "sku": "  ", "balance": 0.0 },
                    { "productId": "p-3", "balance": 1.0 },
                    { "productId": "p-4", "sku": "00977", "balance": 2.5 }
                ] },
                { "terminalGroupId": "tg-2", "items": [
                    { "productId": "p-5", "sku": "00100" }
                ] }
            ] }
        ]
    }"#;

    #[test]
    fn test_parse_skips_malformed_entries() {
        let entries = parse_stop_list(PAYLOAD).unwrap();
        let skus: Vec<&str> = entries.iter().map(|e| e.identity.as_str()).collect();

        assert_eq!(skus, vec!["00412", "00977", "00100"]);
        assert_eq!(entries[1].balance, 2.5);
        assert_eq!(entries[2].balance, 0.0);
        assert_eq!(entries[0].product_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_entry_with_non_finite_balance_is_rejected() {
        let raw = |balance: f64| RawStopEntry {
            product_id: Some("p-9".into()),
            sku: Some("00412".into()),
            balance: Some(balance),
        };

        assert!(stop_entry_from(raw(f64::NAN)).is_err());
        assert!(stop_entry_from(raw(f64::NEG_INFINITY)).is_err());
        assert_eq!(stop_entry_from(raw(-1.0)).unwrap().balance, -1.0);

        let no_sku = RawStopEntry {
            product_id: Some("p-9".into()),
            sku: None,
            balance: None,
        };
        assert!(stop_entry_from(no_sku).unwrap_err().contains("no sku"));
    }

    #[test]
    fn test_parse_rejects_wrong_document() {
        assert!(matches!(
            parse_stop_list("not json"),
            Err(SyncError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_stop_list(r#"{"items": []}"#),
            Err(SyncError::InvalidPayload(_))
        ));
        assert!(parse_stop_list(r#"{"terminalGroupStopLists": []}"#)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_file_source_resolves_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop_list.json");
        std::fs::write(&path, PAYLOAD).unwrap();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .upsert_many(&[CatalogEntry {
                code: "00412".into(),
                name: "Borscht".into(),
            }])
            .await
            .unwrap();

        let now = Utc::now();
        let source = FileSnapshotSource::new(&path, db.catalog());
        let snapshot = source.fetch(now).await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.captured_at, now);

        let borscht = snapshot.get(&ItemIdentity::parse("00412").unwrap()).unwrap();
        assert_eq!(borscht.display_name, "Borscht");

        let unknown = snapshot.get(&ItemIdentity::parse("00977").unwrap()).unwrap();
        assert_eq!(unknown.display_name, UNKNOWN_ITEM_NAME);
        assert!(unknown.is_stopped);
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let source = FileSnapshotSource::new("/nonexistent/stop_list.json", db.catalog());

        let err = source.fetch(Utc::now()).await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable(_)));
        assert!(err.is_retryable());
    }
}
