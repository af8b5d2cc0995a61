use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ImageSearchError, ImageSearchResult};
use crate::queries::FilterMode;

/// Output width of `multimodalembedding@001`; every stored vector has this length
pub const EMBEDDING_DIMENSION: usize = 1408;

/// Number of catalog paths returned per similarity query
pub const NEIGHBOR_LIMIT: usize = 3;

/// Fixed-length image embedding.
///
/// The length is checked on construction and on deserialization, so any
/// `Embedding` in hand can be compared against any other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> ImageSearchResult<Self> {
        if values.len() != EMBEDDING_DIMENSION {
            return Err(ImageSearchError::Validation(format!(
                "embedding has {} dimensions, expected {}",
                values.len(),
                EMBEDDING_DIMENSION
            )));
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ImageSearchError::Validation(format!(
                "embedding component {} is not a finite number",
                index
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Euclidean distance, the metric pgvector applies for `<->`
    pub fn l2_distance(&self, other: &Embedding) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }

    /// Text form accepted by `CAST($n AS vector)`, e.g. `[0.1,0.2]`
    pub fn to_pgvector_literal(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 10 + 2);
        out.push('[');
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&v.to_string());
        }
        out.push(']');
        out
    }

    /// Parse pgvector's text output back into an embedding
    pub fn from_pgvector_literal(text: &str) -> ImageSearchResult<Self> {
        let inner = text
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| ImageSearchError::Validation(format!("not a vector literal: {:.32}", text)))?;

        let values = inner
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.trim()
                    .parse::<f32>()
                    .map_err(|e| ImageSearchError::Validation(format!("bad vector component '{}': {}", s, e)))
            })
            .collect::<ImageSearchResult<Vec<f32>>>()?;

        Self::new(values)
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = ImageSearchError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

/// Inventory item eligible to be returned as a match.
///
/// Rows are created by the bootstrap loader with only `price` and `units`;
/// `path` and `embedding` are filled in when the catalog image is ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: i32,
    pub path: Option<String>,
    pub price: i32,
    pub units: i32,
    pub embedding: Option<Embedding>,
}

impl CatalogItem {
    pub fn in_stock(&self) -> bool {
        self.units > 0
    }
}

impl From<CatalogRow> for CatalogItem {
    fn from(row: CatalogRow) -> Self {
        Self {
            id: row.id,
            path: None,
            price: row.price,
            units: row.units,
            embedding: None,
        }
    }
}

/// One submitted query image. Lookup rows are never updated or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupEntry {
    pub id: i64,
    pub path: String,
    pub embedding: Embedding,
}

/// Scalar catalog fields parsed from the bootstrap CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub id: i32,
    pub price: i32,
    pub units: i32,
}

/// A bootstrap row that could not be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Catalog id when it could be parsed, otherwise the CSV line number
    pub reference: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkLoadReport {
    pub inserted: usize,
    pub failures: Vec<RowFailure>,
}

impl BulkLoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Stock and price constraints for a similarity search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub in_stock_only: bool,
    /// Exclusive price ceiling; 0 disables the price filter
    pub max_price: i32,
}

impl SearchFilter {
    pub fn new(in_stock_only: bool, max_price: i32) -> Self {
        Self {
            in_stock_only,
            max_price,
        }
    }

    pub fn mode(&self) -> FilterMode {
        FilterMode::select(self.in_stock_only, self.max_price)
    }
}

/// Query parameters for `GET /find_similar_images`
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct FindSimilarParams {
    /// Object name of the uploaded query image
    pub image_name: String,
    /// Bucket the query image was uploaded to
    pub landing_repo: String,
    /// "True" restricts results to items with units in stock
    #[serde(alias = "in_stock_only")]
    pub stock: Option<String>,
    /// Exclusive price ceiling, 0 or absent for none
    pub max_price: Option<i32>,
}

/// Query parameters for `POST /images/{name}/similar`
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct FilterParams {
    #[serde(alias = "in_stock_only")]
    pub stock: Option<String>,
    pub max_price: Option<i32>,
}

impl FilterParams {
    pub fn to_filter(&self) -> SearchFilter {
        SearchFilter::new(parse_stock_flag(self.stock.as_deref()), self.max_price.unwrap_or(0))
    }
}

impl FindSimilarParams {
    pub fn to_filter(&self) -> SearchFilter {
        SearchFilter::new(parse_stock_flag(self.stock.as_deref()), self.max_price.unwrap_or(0))
    }
}

/// The web front end sends Python-style booleans ("True"/"False")
pub fn parse_stock_flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some(v) if v.eq_ignore_ascii_case("true") || v == "1")
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SimilarImagesResponse {
    /// Catalog image paths, closest first
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct QueryTextParams {
    pub mode: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryTextResponse {
    pub query_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_rejects_wrong_dimension() {
        let err = Embedding::new(vec![0.0; 512]).unwrap_err();
        assert!(matches!(err, ImageSearchError::Validation(_)));
        assert!(err.to_string().contains("512"));
    }

    #[test]
    fn test_embedding_rejects_non_finite_values() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut values = vec![0.5; EMBEDDING_DIMENSION];
            values[7] = bad;
            let err = Embedding::new(values).unwrap_err();
            assert!(matches!(err, ImageSearchError::Validation(_)));
            assert!(err.to_string().contains("component 7"));
        }
    }

    #[test]
    fn test_embedding_deserialize_checks_dimension() {
        let short: Result<Embedding, _> = serde_json::from_str("[1.0, 2.0]");
        assert!(short.is_err());
    }

    #[test]
    fn test_l2_distance() {
        let mut a = vec![0.0; EMBEDDING_DIMENSION];
        let mut b = vec![0.0; EMBEDDING_DIMENSION];
        a[0] = 3.0;
        b[1] = 4.0;
        let a = Embedding::new(a).unwrap();
        let b = Embedding::new(b).unwrap();
        assert!((a.l2_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.l2_distance(&a), 0.0);
    }

    #[test]
    fn test_pgvector_literal_parses_back() {
        let values: Vec<f32> = (0..EMBEDDING_DIMENSION).map(|i| i as f32 * 0.5).collect();
        let embedding = Embedding::new(values).unwrap();
        let literal = embedding.to_pgvector_literal();
        assert!(literal.starts_with("[0,0.5,1,"));
        assert_eq!(Embedding::from_pgvector_literal(&literal).unwrap(), embedding);
    }

    #[test]
    fn test_parse_stock_flag() {
        assert!(parse_stock_flag(Some("True")));
        assert!(parse_stock_flag(Some("true")));
        assert!(parse_stock_flag(Some("1")));
        assert!(!parse_stock_flag(Some("False")));
        assert!(!parse_stock_flag(Some("")));
        assert!(!parse_stock_flag(None));
    }

    #[test]
    fn test_catalog_item_from_row_has_no_embedding() {
        let item = CatalogItem::from(CatalogRow {
            id: 7,
            price: 120,
            units: 0,
        });
        assert_eq!(item.path, None);
        assert!(item.embedding.is_none());
        assert!(!item.in_stock());
    }
}
