use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ImageSearchError, ImageSearchResult};
use crate::models::{
    BulkLoadReport, CatalogItem, CatalogRow, Embedding, LookupEntry, NEIGHBOR_LIMIT, RowFailure,
};
use crate::queries::{FilterMode, QUERY_TEMPLATES};

/// Persistence for catalog and lookup embeddings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Drop and recreate all tables, then seed the query templates.
    /// Destroys existing data; bootstrap only.
    async fn create_schema(&self) -> ImageSearchResult<()>;

    /// Insert scalar catalog rows. A failing row is recorded in the report
    /// and the remaining rows are still loaded.
    async fn bulk_load(&self, rows: Vec<CatalogRow>) -> ImageSearchResult<BulkLoadReport>;

    /// Set path and embedding of an existing catalog row
    async fn set_catalog_embedding(
        &self,
        id: i32,
        path: &str,
        embedding: &Embedding,
    ) -> ImageSearchResult<()>;

    /// Append a lookup row and return its generated id
    async fn append_lookup(&self, path: &str, embedding: &Embedding) -> ImageSearchResult<i64>;

    /// Highest lookup id recorded for `path`, i.e. its most recent ingestion
    async fn lookup_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i64>>;

    /// Up to three catalog paths closest (L2) to the lookup row's embedding,
    /// nearest first, among rows that pass `mode`'s predicate.
    async fn nearest_neighbors(
        &self,
        query_id: i64,
        mode: FilterMode,
        max_price: i32,
    ) -> ImageSearchResult<Vec<String>>;

    async fn catalog_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i32>>;

    /// Persisted template text for `mode`
    async fn query_text(&self, mode: FilterMode) -> ImageSearchResult<Option<String>>;

    async fn health(&self) -> ImageSearchResult<()>;
}

#[derive(Debug, Default)]
struct MemoryTables {
    catalog: BTreeMap<i32, CatalogItem>,
    lookup: Vec<LookupEntry>,
    queries: HashMap<FilterMode, String>,
    next_lookup_id: i64,
}

impl MemoryTables {
    fn seeded() -> Self {
        Self {
            queries: QUERY_TEMPLATES
                .iter()
                .map(|t| (t.mode, t.text.to_string()))
                .collect(),
            next_lookup_id: 1,
            ..Default::default()
        }
    }
}

/// In-memory implementation of ImageStore (for development/testing)
#[derive(Debug, Clone)]
pub struct InMemoryImageStore {
    tables: Arc<RwLock<MemoryTables>>,
}

impl Default for InMemoryImageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(MemoryTables::seeded())),
        }
    }

    /// Snapshot of a catalog row
    pub async fn catalog_item(&self, id: i32) -> Option<CatalogItem> {
        self.tables.read().await.catalog.get(&id).cloned()
    }

    pub async fn lookup_len(&self) -> usize {
        self.tables.read().await.lookup.len()
    }
}

fn passes(item: &CatalogItem, mode: FilterMode, max_price: i32) -> bool {
    let stock_ok = !mode.requires_stock() || item.in_stock();
    let price_ok = !mode.uses_price() || item.price < max_price;
    stock_ok && price_ok
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn create_schema(&self) -> ImageSearchResult<()> {
        let mut tables = self.tables.write().await;
        *tables = MemoryTables::seeded();
        tracing::info!("Recreated in-memory image store");
        Ok(())
    }

    async fn bulk_load(&self, rows: Vec<CatalogRow>) -> ImageSearchResult<BulkLoadReport> {
        let mut tables = self.tables.write().await;
        let mut report = BulkLoadReport::default();

        for row in rows {
            if tables.catalog.contains_key(&row.id) {
                tracing::warn!(catalog_id = row.id, "Duplicate catalog id, skipping row");
                report.failures.push(RowFailure {
                    reference: row.id.to_string(),
                    reason: "duplicate catalog id".to_string(),
                });
                continue;
            }
            tables.catalog.insert(row.id, CatalogItem::from(row));
            report.inserted += 1;
        }

        Ok(report)
    }

    async fn set_catalog_embedding(
        &self,
        id: i32,
        path: &str,
        embedding: &Embedding,
    ) -> ImageSearchResult<()> {
        let mut tables = self.tables.write().await;
        let item = tables
            .catalog
            .get_mut(&id)
            .ok_or_else(|| ImageSearchError::not_found(format!("catalog id {}", id)))?;

        item.path = Some(path.to_string());
        item.embedding = Some(embedding.clone());
        Ok(())
    }

    async fn append_lookup(&self, path: &str, embedding: &Embedding) -> ImageSearchResult<i64> {
        let mut tables = self.tables.write().await;
        let id = tables.next_lookup_id;
        tables.next_lookup_id += 1;
        tables.lookup.push(LookupEntry {
            id,
            path: path.to_string(),
            embedding: embedding.clone(),
        });
        Ok(id)
    }

    async fn lookup_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .lookup
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.id)
            .max())
    }

    async fn nearest_neighbors(
        &self,
        query_id: i64,
        mode: FilterMode,
        max_price: i32,
    ) -> ImageSearchResult<Vec<String>> {
        let tables = self.tables.read().await;
        let query = tables
            .lookup
            .iter()
            .find(|e| e.id == query_id)
            .ok_or_else(|| ImageSearchError::not_found(format!("lookup id {}", query_id)))?;

        let mut ranked: Vec<(f32, &str)> = tables
            .catalog
            .values()
            .filter(|item| passes(item, mode, max_price))
            .filter_map(|item| match (&item.path, &item.embedding) {
                (Some(path), Some(embedding)) => {
                    Some((query.embedding.l2_distance(embedding), path.as_str()))
                }
                _ => None,
            })
            .collect();

        // Stable sort keeps catalog id order for exact ties
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(ranked
            .into_iter()
            .take(NEIGHBOR_LIMIT)
            .map(|(_, path)| path.to_string())
            .collect())
    }

    async fn catalog_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i32>> {
        let tables = self.tables.read().await;
        Ok(tables
            .catalog
            .values()
            .find(|item| item.path.as_deref() == Some(path))
            .map(|item| item.id))
    }

    async fn query_text(&self, mode: FilterMode) -> ImageSearchResult<Option<String>> {
        Ok(self.tables.read().await.queries.get(&mode).cloned())
    }

    async fn health(&self) -> ImageSearchResult<()> {
        Ok(())
    }
}
