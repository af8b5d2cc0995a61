//! Catalog bootstrap: schema, scalar rows from CSV, then catalog embeddings
//! computed from the images in a bucket.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use crate::error::{ImageSearchError, ImageSearchResult};
use crate::models::{BulkLoadReport, CatalogRow, RowFailure};
use crate::repository::ImageStore;
use crate::service::ImageSearchService;
use crate::storage::ObjectReader;

pub const DEFAULT_IMAGE_LIMIT: usize = 100;
pub const DEFAULT_EMBED_DELAY: Duration = Duration::from_secs(2);

/// Rows parsed from a catalog CSV plus the records that were rejected
#[derive(Debug, Default)]
pub struct ParsedCatalog {
    pub rows: Vec<CatalogRow>,
    pub failures: Vec<RowFailure>,
}

fn column(headers: &csv::StringRecord, name: &str) -> ImageSearchResult<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| ImageSearchError::Validation(format!("catalog CSV has no '{}' column", name)))
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<i32, String> {
    let raw = record.get(index).map(str::trim).unwrap_or_default();
    raw.parse::<i32>()
        .map_err(|e| format!("{} '{}': {}", name, raw, e))
}

/// Parse `ID,PRICE,UNITS` records (header names are case-insensitive,
/// extra columns are ignored).
///
/// A missing column fails the whole file; a bad record is reported and skipped.
pub fn parse_catalog_csv<R: Read>(source: R) -> ImageSearchResult<ParsedCatalog> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let id_col = column(&headers, "id")?;
    let price_col = column(&headers, "price")?;
    let units_col = column(&headers, "units")?;

    let mut parsed = ParsedCatalog::default();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                tracing::warn!(line, error = %e, "Unreadable catalog record");
                parsed.failures.push(RowFailure {
                    reference: format!("line {}", line),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row = parse_field(&record, id_col, "id").and_then(|id| {
            Ok(CatalogRow {
                id,
                price: parse_field(&record, price_col, "price")?,
                units: parse_field(&record, units_col, "units")?,
            })
        });

        match row {
            Ok(row) => parsed.rows.push(row),
            Err(reason) => {
                tracing::warn!(line, %reason, "Skipping malformed catalog record");
                parsed.failures.push(RowFailure {
                    reference: format!("line {}", line),
                    reason,
                });
            }
        }
    }

    Ok(parsed)
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Maximum number of bucket images to embed
    pub limit: usize,
    /// Pause between embedding calls, to stay under the model quota
    pub delay: Duration,
    /// Drop and recreate the tables first
    pub recreate_schema: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_IMAGE_LIMIT,
            delay: DEFAULT_EMBED_DELAY,
            recreate_schema: true,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct EmbedReport {
    pub embedded: usize,
    pub failures: Vec<RowFailure>,
}

#[derive(Debug, Default, Serialize)]
pub struct BootstrapReport {
    pub schema_created: bool,
    pub rows: BulkLoadReport,
    pub images: EmbedReport,
}

/// Loads a fresh catalog into an [`ImageStore`]
pub struct CatalogBootstrap<S: ImageStore> {
    service: ImageSearchService<S>,
    objects: Arc<dyn ObjectReader>,
}

impl<S: ImageStore> CatalogBootstrap<S> {
    pub fn new(service: ImageSearchService<S>, objects: Arc<dyn ObjectReader>) -> Self {
        Self { service, objects }
    }

    pub async fn create_schema(&self) -> ImageSearchResult<()> {
        self.service.store().create_schema().await
    }

    /// Parse and insert catalog rows; parse and insert failures share one report
    #[instrument(skip(self, source))]
    pub async fn load_rows<R: Read>(&self, source: R) -> ImageSearchResult<BulkLoadReport> {
        let parsed = parse_catalog_csv(source)?;
        let mut report = self.service.store().bulk_load(parsed.rows).await?;

        let mut failures = parsed.failures;
        failures.append(&mut report.failures);
        report.failures = failures;

        tracing::info!(
            inserted = report.inserted,
            failed = report.failures.len(),
            "Loaded catalog CSV"
        );
        Ok(report)
    }

    /// Embed the first `limit` images of `bucket`, assigning catalog ids
    /// 1..=n in listing order.
    #[instrument(skip(self, options), fields(limit = options.limit))]
    pub async fn embed_catalog(
        &self,
        bucket: &str,
        options: &BootstrapOptions,
    ) -> ImageSearchResult<EmbedReport> {
        let names = self.objects.list_objects(bucket).await?;
        let selected: Vec<String> = names.into_iter().take(options.limit).collect();
        let total = selected.len();
        let mut report = EmbedReport::default();

        for (index, name) in selected.iter().enumerate() {
            let catalog_id = (index + 1) as i32;

            let result = match self.objects.read_bytes(bucket, name).await {
                Ok(bytes) => self.service.ingest_catalog(catalog_id, &bytes, name).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => report.embedded += 1,
                Err(e) => {
                    tracing::warn!(catalog_id, object = %name, error = %e, "Failed to embed catalog image");
                    report.failures.push(RowFailure {
                        reference: name.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            if index + 1 < total && !options.delay.is_zero() {
                tokio::time::sleep(options.delay).await;
            }
        }

        tracing::info!(
            embedded = report.embedded,
            failed = report.failures.len(),
            "Embedded catalog images"
        );
        Ok(report)
    }

    /// Full bootstrap: schema, CSV rows, then image embeddings
    pub async fn run<R: Read>(
        &self,
        csv_source: R,
        catalog_bucket: &str,
        options: &BootstrapOptions,
    ) -> ImageSearchResult<BootstrapReport> {
        let mut report = BootstrapReport::default();

        if options.recreate_schema {
            self.create_schema().await?;
            report.schema_created = true;
        }

        report.rows = self.load_rows(csv_source).await?;
        report.images = self.embed_catalog(catalog_bucket, options).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockImageEmbedder;
    use crate::models::{EMBEDDING_DIMENSION, Embedding};
    use crate::queries::FilterMode;
    use crate::repository::InMemoryImageStore;
    use crate::storage::MockObjectReader;
    use mockall::predicate::eq;

    fn embedder() -> Arc<MockImageEmbedder> {
        let mut embedder = MockImageEmbedder::new();
        embedder.expect_model_name().return_const("test-model");
        // First byte of the image picks the vector
        embedder.expect_embed().returning(|image| {
            let mut values = vec![0.0; EMBEDDING_DIMENSION];
            values[0] = image[0] as f32;
            Embedding::new(values)
        });
        Arc::new(embedder)
    }

    #[test]
    fn test_parse_catalog_csv_case_insensitive_headers() {
        let csv = "Id,Name,PRICE,units\n1,shirt,120,4\n2,dress,80,0\n";
        let parsed = parse_catalog_csv(csv.as_bytes()).unwrap();
        assert!(parsed.failures.is_empty());
        assert_eq!(
            parsed.rows,
            vec![
                CatalogRow { id: 1, price: 120, units: 4 },
                CatalogRow { id: 2, price: 80, units: 0 },
            ]
        );
    }

    #[test]
    fn test_parse_catalog_csv_skips_malformed_rows() {
        let csv = "ID,PRICE,UNITS\n1,100,2\nx,100,2\n3,,1\n4,40,1\n";
        let parsed = parse_catalog_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.failures.len(), 2);
        assert_eq!(parsed.failures[0].reference, "line 3");
        assert!(parsed.failures[1].reason.starts_with("price"));
    }

    #[test]
    fn test_parse_catalog_csv_missing_column() {
        let err = parse_catalog_csv("ID,PRICE\n1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImageSearchError::Validation(ref m) if m.contains("units")));
    }

    #[tokio::test]
    async fn test_run_loads_rows_and_embeds_listed_images() {
        let mut objects = MockObjectReader::new();
        objects
            .expect_list_objects()
            .with(eq("catalog"))
            .returning(|_| Ok(vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()]));
        objects
            .expect_read_bytes()
            .returning(|_, name| Ok(vec![name.as_bytes()[0]]));

        let store = InMemoryImageStore::new();
        let service = ImageSearchService::new(store.clone(), embedder());
        let bootstrap = CatalogBootstrap::new(service, Arc::new(objects));

        let options = BootstrapOptions {
            limit: 2,
            delay: Duration::ZERO,
            recreate_schema: true,
        };
        let csv = "ID,PRICE,UNITS\n1,10,1\n2,20,1\n3,30,1\n";
        let report = bootstrap.run(csv.as_bytes(), "catalog", &options).await.unwrap();

        assert!(report.schema_created);
        assert_eq!(report.rows.inserted, 3);
        assert_eq!(report.images.embedded, 2);
        assert!(report.images.failures.is_empty());

        let item = store.catalog_item(2).await.unwrap();
        assert_eq!(item.path.as_deref(), Some("b.jpg"));
        assert!(store.catalog_item(3).await.unwrap().embedding.is_none());
        assert_eq!(
            store.query_text(FilterMode::All).await.unwrap().as_deref(),
            Some(FilterMode::All.sql())
        );
    }

    #[tokio::test]
    async fn test_embed_catalog_counts_failures_and_continues() {
        let mut objects = MockObjectReader::new();
        objects
            .expect_list_objects()
            .returning(|_| Ok(vec!["gone.jpg".into(), "ok.jpg".into()]));
        objects.expect_read_bytes().returning(|_, name| {
            if name == "gone.jpg" {
                Err(ImageSearchError::not_found("object gs://catalog/gone.jpg"))
            } else {
                Ok(vec![7])
            }
        });

        let store = InMemoryImageStore::new();
        store
            .bulk_load(vec![
                CatalogRow { id: 1, price: 1, units: 1 },
                CatalogRow { id: 2, price: 1, units: 1 },
            ])
            .await
            .unwrap();

        let bootstrap = CatalogBootstrap::new(
            ImageSearchService::new(store.clone(), embedder()),
            Arc::new(objects),
        );
        let options = BootstrapOptions {
            delay: Duration::ZERO,
            ..Default::default()
        };
        let report = bootstrap.embed_catalog("catalog", &options).await.unwrap();

        assert_eq!(report.embedded, 1);
        assert_eq!(report.failures[0].reference, "gone.jpg");
        assert_eq!(store.catalog_id_by_path("ok.jpg").await.unwrap(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_embed_catalog_paces_calls() {
        let mut objects = MockObjectReader::new();
        objects
            .expect_list_objects()
            .returning(|_| Ok(vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()]));
        objects.expect_read_bytes().returning(|_, _| Ok(vec![1]));

        let store = InMemoryImageStore::new();
        store
            .bulk_load((1..=3).map(|id| CatalogRow { id, price: 1, units: 1 }).collect())
            .await
            .unwrap();

        let bootstrap = CatalogBootstrap::new(
            ImageSearchService::new(store, embedder()),
            Arc::new(objects),
        );

        let started = tokio::time::Instant::now();
        bootstrap
            .embed_catalog("catalog", &BootstrapOptions::default())
            .await
            .unwrap();
        // No pause after the last image
        assert!(started.elapsed() >= DEFAULT_EMBED_DELAY * 2);
        assert!(started.elapsed() < DEFAULT_EMBED_DELAY * 3);
    }
}
