//! Fixed nearest-neighbor query templates.
//!
//! `$1` is always the lookup row id and `$2` the exclusive price ceiling.
//! Templates are never assembled at runtime.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ImageSearchError, ImageSearchResult};

/// Predicate applied to catalog rows before ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(into = "i32", try_from = "i32")]
pub enum FilterMode {
    /// No filter
    All = 1,
    /// `units > 0` and `price < $2`
    InStockUnderPrice = 2,
    /// `units > 0`
    InStock = 3,
    /// `price < $2`
    UnderPrice = 4,
}

impl FilterMode {
    pub const ALL_MODES: [FilterMode; 4] = [
        FilterMode::All,
        FilterMode::InStockUnderPrice,
        FilterMode::InStock,
        FilterMode::UnderPrice,
    ];

    /// A `max_price` of 0 means no price ceiling.
    pub fn select(in_stock_only: bool, max_price: i32) -> Self {
        match (in_stock_only, max_price > 0) {
            (true, true) => FilterMode::InStockUnderPrice,
            (true, false) => FilterMode::InStock,
            (false, true) => FilterMode::UnderPrice,
            (false, false) => FilterMode::All,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether the template binds `$2`
    pub fn uses_price(self) -> bool {
        matches!(self, FilterMode::InStockUnderPrice | FilterMode::UnderPrice)
    }

    pub fn requires_stock(self) -> bool {
        matches!(self, FilterMode::InStockUnderPrice | FilterMode::InStock)
    }

    pub fn template(self) -> &'static QueryTemplate {
        // ALL_MODES and QUERY_TEMPLATES share ordering
        &QUERY_TEMPLATES[(self.as_i32() - 1) as usize]
    }

    pub fn sql(self) -> &'static str {
        self.template().text
    }
}

impl TryFrom<i32> for FilterMode {
    type Error = ImageSearchError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FilterMode::All),
            2 => Ok(FilterMode::InStockUnderPrice),
            3 => Ok(FilterMode::InStock),
            4 => Ok(FilterMode::UnderPrice),
            other => Err(ImageSearchError::not_found(format!("query mode {}", other))),
        }
    }
}

impl From<FilterMode> for i32 {
    fn from(mode: FilterMode) -> Self {
        mode.as_i32()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTemplate {
    pub mode: FilterMode,
    pub text: &'static str,
}

pub static QUERY_TEMPLATES: [QueryTemplate; 4] = [
    QueryTemplate {
        mode: FilterMode::All,
        text: "SELECT path FROM catalog \
               WHERE embedding IS NOT NULL \
               ORDER BY embedding <-> (SELECT embedding FROM lookup WHERE id = $1) \
               LIMIT 3",
    },
    QueryTemplate {
        mode: FilterMode::InStockUnderPrice,
        text: "SELECT path FROM catalog \
               WHERE embedding IS NOT NULL AND units > 0 AND price < $2 \
               ORDER BY embedding <-> (SELECT embedding FROM lookup WHERE id = $1) \
               LIMIT 3",
    },
    QueryTemplate {
        mode: FilterMode::InStock,
        text: "SELECT path FROM catalog \
               WHERE embedding IS NOT NULL AND units > 0 \
               ORDER BY embedding <-> (SELECT embedding FROM lookup WHERE id = $1) \
               LIMIT 3",
    },
    QueryTemplate {
        mode: FilterMode::UnderPrice,
        text: "SELECT path FROM catalog \
               WHERE embedding IS NOT NULL AND price < $2 \
               ORDER BY embedding <-> (SELECT embedding FROM lookup WHERE id = $1) \
               LIMIT 3",
    },
];

/// Template text for a raw mode number, as shown in the UI
pub fn text_for_mode(mode: i32) -> ImageSearchResult<&'static str> {
    FilterMode::try_from(mode).map(FilterMode::sql)
}
