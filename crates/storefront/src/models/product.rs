//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use lumiere_core::catalog::PageRequest;
use lumiere_core::{CategoryId, Money, ProductId, ReviewId, UserId};

/// A catalog product, joined with its category's name and slug.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub rating: Decimal,
    pub in_stock: bool,
    pub is_new: bool,
    pub is_popular: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
}

/// A product review with the reviewer's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub rating: i16,
    pub comment: Option<String>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Product page payload.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub reviews: Vec<Review>,
    pub similar_products: Vec<Product>,
}

/// Pagination block of a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl Pagination {
    #[must_use]
    pub fn new(page: PageRequest, total: i64) -> Self {
        Self {
            total,
            page: page.page,
            limit: page.limit,
            pages: page.page_count(total),
        }
    }
}

/// One page of products.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

/// A category row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
}

/// A top-level category with its direct children.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<Category>,
}

impl CategoryTree {
    /// Group a flat category list into top-level entries with children.
    ///
    /// Top-level order follows the input; children keep their input order
    /// too. Children whose parent is missing from the list are dropped.
    #[must_use]
    pub fn build(categories: Vec<Category>) -> Vec<Self> {
        let (roots, children): (Vec<_>, Vec<_>) =
            categories.into_iter().partition(|c| c.parent_id.is_none());

        roots
            .into_iter()
            .map(|category| {
                let subcategories = children
                    .iter()
                    .filter(|child| child.parent_id == Some(category.id))
                    .cloned()
                    .collect();
                Self {
                    category,
                    subcategories,
                }
            })
            .collect()
    }
}
