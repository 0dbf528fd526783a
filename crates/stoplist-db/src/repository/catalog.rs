//! # Catalog Repository
//!
//! Display names for provider SKUs (`nomenclature` table).
//!
//! Stop-list payloads only carry SKUs and balances; names come from here.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// SQLite caps bound parameters per statement; stay well below it.
const LOOKUP_CHUNK: usize = 500;

/// A single catalog row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub name: String,
}

/// Repository for catalog name lookups.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Looks up one name.
    pub async fn name_for(&self, code: &str) -> DbResult<Option<String>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM nomenclature WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    /// Looks up names for many codes. Unknown codes are absent from the map.
    pub async fn names_for(&self, codes: &[&str]) -> DbResult<HashMap<String, String>> {
        let mut names = HashMap::with_capacity(codes.len());

        for chunk in codes.chunks(LOOKUP_CHUNK) {
            let mut query: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT code, name FROM nomenclature WHERE code IN (");
            let mut separated = query.separated(", ");
            for code in chunk {
                separated.push_bind(*code);
            }
            separated.push_unseparated(")");

            let rows = query.build().fetch_all(&self.pool).await?;
            for row in rows {
                names.insert(row.try_get("code")?, row.try_get("name")?);
            }
        }

        debug!(requested = codes.len(), found = names.len(), "Resolved catalog names");
        Ok(names)
    }

    /// Inserts or renames entries in one transaction. Returns rows written.
    pub async fn upsert_many(&self, entries: &[CatalogEntry]) -> DbResult<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO nomenclature (code, name) VALUES (?1, ?2) \
                 ON CONFLICT(code) DO UPDATE SET name = excluded.name",
            )
            .bind(entry.code.trim())
            .bind(entry.name.trim())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(entries.len())
    }

    /// Number of catalog entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nomenclature")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn entry(code: &str, name: &str) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        catalog
            .upsert_many(&[entry("00412", "Mushroom soup"), entry("00977", "Cheesecake")])
            .await
            .unwrap();
        catalog.upsert_many(&[entry("00412", "Soup of the day")]).await.unwrap();

        assert_eq!(catalog.count().await.unwrap(), 2);
        assert_eq!(
            catalog.name_for("00412").await.unwrap().as_deref(),
            Some("Soup of the day")
        );
        assert!(catalog.name_for("missing").await.unwrap().is_none());

        let names = catalog.names_for(&["00977", "missing"]).await.unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names["00977"], "Cheesecake");
    }

    #[tokio::test]
    async fn test_names_for_handles_many_codes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let entries: Vec<CatalogEntry> = (0..1200)
            .map(|n| entry(&format!("SKU-{n}"), &format!("Item {n}")))
            .collect();
        catalog.upsert_many(&entries).await.unwrap();

        let codes: Vec<String> = (0..1200).map(|n| format!("SKU-{n}")).collect();
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        assert_eq!(catalog.names_for(&refs).await.unwrap().len(), 1200);

        assert!(catalog.names_for(&[]).await.unwrap().is_empty());
    }
}
