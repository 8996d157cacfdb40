//! Catalog listing queries: filters, sorting and pagination.
//!
//! Raw query-string values arrive as strings and are parsed here into a
//! [`ProductQuery`] whose sort column and direction come from a closed set,
//! so nothing the client sends is ever spliced into SQL.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Money;

/// Page size used when the client does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;
/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

/// Errors from parsing listing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogQueryError {
    #[error("{field} must be a number")]
    NotANumber { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("minPrice must not exceed maxPrice")]
    InvertedPriceRange,
}

/// Columns a listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Price,
    Rating,
    #[default]
    CreatedAt,
    Name,
    IsPopular,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "price" => Some(Self::Price),
            "rating" => Some(Self::Rating),
            "created_at" => Some(Self::CreatedAt),
            "name" => Some(Self::Name),
            "is_popular" => Some(Self::IsPopular),
            _ => None,
        }
    }

    /// Column name on the `products` table.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Rating => "rating",
            Self::CreatedAt => "created_at",
            Self::Name => "name",
            Self::IsPopular => "is_popular",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    /// SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Query-string parameters as the client sent them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub brand: Option<String>,
    pub in_stock: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Row filters for a listing. `None` means "do not filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive substring over name, description and brand.
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub brand: Option<String>,
    pub in_stock_only: bool,
}

/// A page request, `page` starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Rows to skip.
    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub fn page_count(self, total: i64) -> i64 {
        if total <= 0 {
            return 0;
        }
        let limit = i64::from(self.limit);
        (total + limit - 1) / limit
    }
}

/// A fully validated listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub filter: ProductFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: PageRequest,
}

impl ProductQuery {
    /// Validate raw listing parameters.
    ///
    /// An unknown sort column falls back to `created_at` and an unknown
    /// direction to descending, each independently of the other. Page and
    /// limit are clamped into range.
    ///
    /// # Errors
    ///
    /// Returns an error when a price, page or limit is not a number, or when
    /// a price bound is negative or the range is inverted.
    pub fn parse(params: &ProductListParams) -> Result<Self, CatalogQueryError> {
        let min_price = parse_price(params.min_price.as_deref(), "minPrice")?;
        let max_price = parse_price(params.max_price.as_deref(), "maxPrice")?;
        if matches!((min_price, max_price), (Some(min), Some(max)) if min > max) {
            return Err(CatalogQueryError::InvertedPriceRange);
        }

        let filter = ProductFilter {
            category: non_blank(params.category.as_deref()),
            search: non_blank(params.search.as_deref()),
            min_price,
            max_price,
            brand: non_blank(params.brand.as_deref()),
            in_stock_only: params.in_stock.as_deref().map(str::trim) == Some("true"),
        };

        let sort = params
            .sort
            .as_deref()
            .map(str::trim)
            .and_then(SortField::parse)
            .unwrap_or_default();
        let order = params
            .order
            .as_deref()
            .map(str::trim)
            .and_then(SortOrder::parse)
            .unwrap_or_default();

        let page = parse_count(params.page.as_deref(), "page")?.map_or(1, |p| p.max(1));
        let limit = parse_count(params.limit.as_deref(), "limit")?
            .map_or(DEFAULT_LIMIT, |l| l.clamp(1, MAX_LIMIT));

        Ok(Self {
            filter,
            sort,
            order,
            page: PageRequest { page, limit },
        })
    }
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn parse_price(raw: Option<&str>, field: &'static str) -> Result<Option<Money>, CatalogQueryError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let amount: rust_decimal::Decimal = raw
        .parse()
        .map_err(|_| CatalogQueryError::NotANumber { field })?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(CatalogQueryError::Negative { field });
    }
    Ok(Some(Money::new(amount)))
}

fn parse_count(raw: Option<&str>, field: &'static str) -> Result<Option<u32>, CatalogQueryError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| CatalogQueryError::NotANumber { field })?;
    // Anything past u32 is far beyond any real page or limit
    Ok(Some(u32::try_from(value.max(0)).unwrap_or(u32::MAX)))
}
