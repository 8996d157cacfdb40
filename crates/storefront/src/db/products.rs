//! Product repository.
//!
//! Listing SQL is assembled with `sqlx::QueryBuilder`. Every client value is
//! a bound parameter; the only identifiers spliced into the text are the sort
//! column and direction, which come from closed enums in `lumiere_core::catalog`.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use lumiere_core::catalog::{ProductFilter, ProductQuery};
use lumiere_core::{CategoryId, Money, ProductId};

use super::RepositoryError;
use crate::models::{Product, Review};

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.description, p.price, p.original_price, \
     p.image_url, p.category_id, p.brand, p.rating, p.in_stock, p.is_new, p.is_popular, \
     p.created_at, p.updated_at, c.name AS category_name, c.slug AS category_slug \
     FROM products p \
     LEFT JOIN categories c ON c.id = p.category_id";

/// Number of related products shown on a product page.
const SIMILAR_LIMIT: i64 = 4;

/// Fields for a new catalog product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub image_url: Option<String>,
    pub category_id: CategoryId,
    pub brand: String,
    pub rating: Decimal,
    pub in_stock: bool,
    pub is_new: bool,
    pub is_popular: bool,
}

/// A partial product update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Money>,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub rating: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub is_new: Option<bool>,
    pub is_popular: Option<bool>,
}

impl ProductPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.original_price.is_none()
            && self.image_url.is_none()
            && self.category_id.is_none()
            && self.brand.is_none()
            && self.rating.is_none()
            && self.in_stock.is_none()
            && self.is_new.is_none()
            && self.is_popular.is_none()
    }
}

/// Repository for catalog reads and admin writes.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products plus the number of rows matching the filters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, query: &ProductQuery) -> Result<(Vec<Product>, i64), RepositoryError> {
        let products = list_query(query)
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        let total: i64 = count_query(&query.filter)
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        Ok((products, total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(product)
    }

    /// ID of the product with this name in this category, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_name(
        &self,
        name: &str,
        category_id: CategoryId,
    ) -> Result<Option<ProductId>, RepositoryError> {
        let id = sqlx::query_scalar(
            "SELECT id FROM products WHERE name = $1 AND category_id = $2 ORDER BY id LIMIT 1",
        )
        .bind(name)
        .bind(category_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reviews(&self, id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT r.id, r.user_id, r.product_id, r.rating, r.comment, \
                    u.name AS user_name, r.created_at \
             FROM reviews r \
             LEFT JOIN users u ON u.id = r.user_id \
             WHERE r.product_id = $1 \
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(reviews)
    }

    /// Up to four random products from the same category, excluding `product`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn similar(&self, product: &Product) -> Result<Vec<Product>, RepositoryError> {
        let Some(category_id) = product.category_id else {
            return Ok(Vec::new());
        };

        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.category_id = $1 AND p.id <> $2 ORDER BY RANDOM() LIMIT $3"
        ))
        .bind(category_id)
        .bind(product.id)
        .bind(SIMILAR_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            "INSERT INTO products \
                 (name, description, price, original_price, image_url, category_id, brand, \
                  rating, in_stock, is_new, is_popular) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(new.price)
        .bind(new.original_price)
        .bind(new.image_url.as_deref())
        .bind(new.category_id)
        .bind(&new.brand)
        .bind(new.rating)
        .bind(new.in_stock)
        .bind(new.is_new)
        .bind(new.is_popular)
        .fetch_one(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, id: ProductId, patch: &ProductPatch) -> Result<Product, RepositoryError> {
        if !patch.is_empty() {
            let updated = update_query(id, patch)
                .build()
                .execute(self.pool)
                .await?
                .rows_affected();
            if updated == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

// =============================================================================
// Query construction
// =============================================================================

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    builder.push(" WHERE TRUE");

    if let Some(slug) = &filter.category {
        builder.push(" AND c.slug = ").push_bind(slug.clone());
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.brand ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min) = filter.min_price {
        builder.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        builder.push(" AND p.price <= ").push_bind(max);
    }
    if let Some(brand) = &filter.brand {
        builder.push(" AND LOWER(p.brand) = LOWER(").push_bind(brand.clone()).push(")");
    }
    if filter.in_stock_only {
        builder.push(" AND p.in_stock");
    }
}

fn list_query(query: &ProductQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(PRODUCT_SELECT);
    push_filters(&mut builder, &query.filter);

    let direction = query.order.keyword();
    builder.push(format!(
        " ORDER BY p.{} {direction}, p.id {direction}",
        query.sort.column()
    ));
    builder
        .push(" LIMIT ")
        .push_bind(i64::from(query.page.limit))
        .push(" OFFSET ")
        .push_bind(query.page.offset());
    builder
}

fn count_query(filter: &ProductFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id",
    );
    push_filters(&mut builder, filter);
    builder
}

fn update_query(id: ProductId, patch: &ProductPatch) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("UPDATE products SET ");
    let mut set = builder.separated(", ");

    if let Some(name) = &patch.name {
        set.push("name = ").push_bind_unseparated(name.clone());
    }
    if let Some(description) = &patch.description {
        set.push("description = ").push_bind_unseparated(description.clone());
    }
    if let Some(price) = patch.price {
        set.push("price = ").push_bind_unseparated(price);
    }
    if let Some(original_price) = patch.original_price {
        set.push("original_price = ").push_bind_unseparated(original_price);
    }
    if let Some(image_url) = &patch.image_url {
        set.push("image_url = ").push_bind_unseparated(image_url.clone());
    }
    if let Some(category_id) = patch.category_id {
        set.push("category_id = ").push_bind_unseparated(category_id);
    }
    if let Some(brand) = &patch.brand {
        set.push("brand = ").push_bind_unseparated(brand.clone());
    }
    if let Some(rating) = patch.rating {
        set.push("rating = ").push_bind_unseparated(rating);
    }
    if let Some(in_stock) = patch.in_stock {
        set.push("in_stock = ").push_bind_unseparated(in_stock);
    }
    if let Some(is_new) = patch.is_new {
        set.push("is_new = ").push_bind_unseparated(is_new);
    }
    if let Some(is_popular) = patch.is_popular {
        set.push("is_popular = ").push_bind_unseparated(is_popular);
    }
    set.push("updated_at = NOW()");

    builder.push(" WHERE id = ").push_bind(id);
    builder
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lumiere_core::catalog::ProductListParams;

    use super::*;

    fn parse(params: ProductListParams) -> ProductQuery {
        ProductQuery::parse(&params).unwrap()
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rose"), "%rose%");
        assert_eq!(like_pattern("100%_pure\\"), "%100\\%\\_pure\\\\%");
    }

    #[test]
    fn test_default_listing_sql() {
        let query = parse(ProductListParams::default());
        let sql = list_query(&query).into_sql();
        assert!(sql.starts_with(PRODUCT_SELECT));
        assert!(sql.contains(" WHERE TRUE ORDER BY p.created_at DESC, p.id DESC"));
        assert!(sql.ends_with(" LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_filters_are_bound_parameters() {
        let query = parse(ProductListParams {
            category: Some("skincare".into()),
            search: Some("'; DROP TABLE products; --".into()),
            min_price: Some("100".into()),
            max_price: Some("900".into()),
            brand: Some("Lumière".into()),
            in_stock: Some("true".into()),
            sort: Some("price".into()),
            order: Some("ASC".into()),
            ..ProductListParams::default()
        });
        let sql = list_query(&query).into_sql();

        assert!(!sql.contains("DROP TABLE"));
        assert!(!sql.contains("skincare"));
        assert!(sql.contains("c.slug = $1"));
        assert!(sql.contains("p.name ILIKE $2 OR p.description ILIKE $3 OR p.brand ILIKE $4"));
        assert!(sql.contains("p.price >= $5"));
        assert!(sql.contains("p.price <= $6"));
        assert!(sql.contains("LOWER(p.brand) = LOWER($7)"));
        assert!(sql.contains("AND p.in_stock"));
        assert!(sql.contains("ORDER BY p.price ASC, p.id ASC LIMIT $8 OFFSET $9"));
    }

    #[test]
    fn test_count_uses_same_filters() {
        let query = parse(ProductListParams {
            category: Some("makeup".into()),
            brand: Some("Glow".into()),
            in_stock: Some("true".into()),
            ..ProductListParams::default()
        });
        let sql = count_query(&query.filter).into_sql();
        assert!(sql.starts_with("SELECT COUNT(*) FROM products p"));
        assert!(sql.contains("c.slug = $1"));
        assert!(sql.contains("LOWER(p.brand) = LOWER($2)"));
        assert!(sql.contains("AND p.in_stock"));
        assert!(!sql.contains("ORDER BY"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_update_sets_only_given_columns() {
        let patch = ProductPatch {
            price: Some(Money::from_units(1500)),
            in_stock: Some(false),
            ..ProductPatch::default()
        };
        let sql = update_query(ProductId::new(7), &patch).into_sql();
        assert_eq!(
            sql,
            "UPDATE products SET price = $1, in_stock = $2, updated_at = NOW() WHERE id = $3"
        );
    }

    #[test]
    fn test_empty_patch() {
        assert!(ProductPatch::default().is_empty());
        assert!(
            !ProductPatch {
                is_new: Some(true),
                ..ProductPatch::default()
            }
            .is_empty()
        );
    }
}
