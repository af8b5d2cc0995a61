use async_trait::async_trait;
use database::postgres::{DatabaseConnection, check_health, ensure_vector_extension};
use sea_orm::{ConnectionTrait, DbBackend, FromQueryResult, Statement, TransactionTrait, Value};

use crate::error::{ImageSearchError, ImageSearchResult};
use crate::models::{BulkLoadReport, CatalogRow, EMBEDDING_DIMENSION, Embedding, RowFailure};
use crate::queries::{FilterMode, QUERY_TEMPLATES};
use crate::repository::ImageStore;

/// PostgreSQL + pgvector implementation of ImageStore
#[derive(Clone)]
pub struct PgImageStore {
    db: DatabaseConnection,
}

impl PgImageStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[derive(Debug, FromQueryResult)]
struct IdRow {
    id: i64,
}

#[derive(Debug, FromQueryResult)]
struct CatalogIdRow {
    id: i32,
}

#[derive(Debug, FromQueryResult)]
struct PathRow {
    path: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct QueryTextRow {
    query_text: String,
}

fn schema_statements() -> [String; 6] {
    [
        "DROP TABLE IF EXISTS catalog".to_string(),
        "DROP TABLE IF EXISTS lookup".to_string(),
        "DROP TABLE IF EXISTS queries".to_string(),
        format!(
            "CREATE TABLE catalog (id INT PRIMARY KEY, path VARCHAR, price INT, units INT, embedding VECTOR({}))",
            EMBEDDING_DIMENSION
        ),
        format!(
            "CREATE TABLE lookup (id BIGSERIAL, path VARCHAR NOT NULL, embedding VECTOR({}), PRIMARY KEY (id, path))",
            EMBEDDING_DIMENSION
        ),
        "CREATE TABLE queries (mode INT PRIMARY KEY, query_text TEXT NOT NULL)".to_string(),
    ]
}

#[async_trait]
impl ImageStore for PgImageStore {
    async fn create_schema(&self) -> ImageSearchResult<()> {
        ensure_vector_extension(&self.db).await?;

        let txn = self.db.begin().await?;

        for sql in schema_statements() {
            txn.execute_unprepared(&sql).await?;
        }

        for template in QUERY_TEMPLATES.iter() {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO queries (mode, query_text) VALUES ($1, $2)",
                [template.mode.as_i32().into(), template.text.into()],
            );
            txn.execute_raw(stmt).await?;
        }

        txn.commit().await?;
        tracing::info!("Created catalog, lookup and queries tables");
        Ok(())
    }

    async fn bulk_load(&self, rows: Vec<CatalogRow>) -> ImageSearchResult<BulkLoadReport> {
        let mut report = BulkLoadReport::default();

        // One statement per row so a bad row does not abort the rest
        for row in rows {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO catalog (id, price, units) VALUES ($1, $2, $3)",
                [row.id.into(), row.price.into(), row.units.into()],
            );

            match self.db.execute_raw(stmt).await {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    tracing::warn!(catalog_id = row.id, error = %e, "Failed to insert catalog row");
                    report.failures.push(RowFailure {
                        reference: row.id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            inserted = report.inserted,
            failed = report.failures.len(),
            "Loaded catalog rows"
        );
        Ok(report)
    }

    async fn set_catalog_embedding(
        &self,
        id: i32,
        path: &str,
        embedding: &Embedding,
    ) -> ImageSearchResult<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE catalog SET path = $1, embedding = CAST($2 AS vector) WHERE id = $3",
            [
                path.into(),
                embedding.to_pgvector_literal().into(),
                id.into(),
            ],
        );

        let result = self.db.execute_raw(stmt).await?;
        if result.rows_affected() == 0 {
            return Err(ImageSearchError::not_found(format!("catalog id {}", id)));
        }

        tracing::debug!(catalog_id = id, path, "Stored catalog embedding");
        Ok(())
    }

    async fn append_lookup(&self, path: &str, embedding: &Embedding) -> ImageSearchResult<i64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO lookup (path, embedding) VALUES ($1, CAST($2 AS vector)) RETURNING id",
            [path.into(), embedding.to_pgvector_literal().into()],
        );

        let row = IdRow::find_by_statement(stmt)
            .one(&self.db)
            .await?
            .ok_or_else(|| ImageSearchError::Storage("insert into lookup returned no id".to_string()))?;

        tracing::debug!(lookup_id = row.id, path, "Appended lookup row");
        Ok(row.id)
    }

    async fn lookup_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i64>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT id FROM lookup WHERE path = $1 ORDER BY id DESC LIMIT 1",
            [path.into()],
        );

        let row = IdRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(|r| r.id))
    }

    async fn nearest_neighbors(
        &self,
        query_id: i64,
        mode: FilterMode,
        max_price: i32,
    ) -> ImageSearchResult<Vec<String>> {
        // Both statements run on one pooled connection; dropping the
        // transaction on an early return releases it.
        let txn = self.db.begin().await?;

        let exists = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT id FROM lookup WHERE id = $1",
            [query_id.into()],
        );
        if IdRow::find_by_statement(exists).one(&txn).await?.is_none() {
            return Err(ImageSearchError::not_found(format!("lookup id {}", query_id)));
        }

        let mut values: Vec<Value> = vec![query_id.into()];
        if mode.uses_price() {
            values.push(max_price.into());
        }
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, mode.sql(), values);

        let rows = PathRow::find_by_statement(stmt).all(&txn).await?;
        txn.commit().await?;

        let paths: Vec<String> = rows.into_iter().filter_map(|r| r.path).collect();
        tracing::debug!(query_id, mode = mode.as_i32(), matches = paths.len(), "Ranked catalog");
        Ok(paths)
    }

    async fn catalog_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i32>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT id FROM catalog WHERE path = $1 ORDER BY id LIMIT 1",
            [path.into()],
        );

        let row = CatalogIdRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(|r| r.id))
    }

    async fn query_text(&self, mode: FilterMode) -> ImageSearchResult<Option<String>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT query_text FROM queries WHERE mode = $1",
            [mode.as_i32().into()],
        );

        let row = QueryTextRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(|r| r.query_text))
    }

    async fn health(&self) -> ImageSearchResult<()> {
        check_health(&self.db).await?;
        Ok(())
    }
}
