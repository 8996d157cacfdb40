//! Catalog route handlers.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumiere_core::catalog::{ProductListParams, ProductQuery};
use lumiere_core::{CategoryId, Money, ProductId};

use super::{Message, parse_id};
use crate::db::products::{NewProduct, ProductPatch};
use crate::db::{CategoryRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, JsonBody, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Pagination, Product, ProductDetail, ProductPage};
use crate::state::AppState;

/// Product create body. Required fields are optional here so that a missing
/// one yields a field-specific 400 instead of a generic JSON error.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProductBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    #[serde(alias = "originalPrice")]
    pub original_price: Option<Money>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(alias = "categoryId")]
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub rating: Option<Decimal>,
    #[serde(alias = "inStock")]
    pub in_stock: Option<bool>,
    #[serde(alias = "isNew")]
    pub is_new: Option<bool>,
    #[serde(alias = "isPopular")]
    pub is_popular: Option<bool>,
}

/// Product update body; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    #[serde(alias = "originalPrice")]
    pub original_price: Option<Money>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(alias = "categoryId")]
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub rating: Option<Decimal>,
    #[serde(alias = "inStock")]
    pub in_stock: Option<bool>,
    #[serde(alias = "isNew")]
    pub is_new: Option<bool>,
    #[serde(alias = "isPopular")]
    pub is_popular: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProductWritten {
    pub success: bool,
    pub message: &'static str,
    pub product: Product,
}

/// List products with filters, sorting and pagination.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> Result<impl IntoResponse> {
    let query = ProductQuery::parse(&params).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (products, total) = ProductRepository::new(state.pool()).list(&query).await?;

    Ok(axum::Json(ProductPage {
        products,
        pagination: Pagination::new(query.page, total),
    }))
}

/// Product detail with reviews and similar products.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id: ProductId = parse_id(&id, "product")?;
    let repo = ProductRepository::new(state.pool());

    let product = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    let reviews = repo.reviews(id).await?;
    let similar_products = repo.similar(&product).await?;

    Ok(axum::Json(ProductDetail {
        product,
        reviews,
        similar_products,
    }))
}

/// Create a product.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(body): JsonBody<CreateProductBody>,
) -> Result<impl IntoResponse> {
    let new = validate_create(body)?;
    ensure_category(&state, new.category_id).await?;

    let product = ProductRepository::new(state.pool()).create(&new).await?;
    tracing::info!(product_id = %product.id, "Product created");

    Ok(axum::Json(ProductWritten {
        success: true,
        message: "Product created successfully",
        product,
    }))
}

/// Partially update a product.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateProductBody>,
) -> Result<impl IntoResponse> {
    let id: ProductId = parse_id(&id, "product")?;
    let patch = validate_update(body)?;
    if let Some(category_id) = patch.category_id {
        ensure_category(&state, category_id).await?;
    }

    let product = ProductRepository::new(state.pool())
        .update(id, &patch)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product not found".to_owned()),
            other => other.into(),
        })?;
    tracing::info!(product_id = %product.id, "Product updated");

    Ok(axum::Json(ProductWritten {
        success: true,
        message: "Product updated successfully",
        product,
    }))
}

/// Delete a product. Past orders keep their line snapshot.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id: ProductId = parse_id(&id, "product")?;

    if !ProductRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("Product not found".to_owned()));
    }
    tracing::info!(product_id = %id, "Product deleted");

    Ok(axum::Json(Message::ok("Product deleted successfully")))
}

async fn ensure_category(state: &AppState, id: CategoryId) -> Result<()> {
    if CategoryRepository::new(state.pool()).exists(id).await? {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Category {id} does not exist")))
    }
}

fn validate_create(body: CreateProductBody) -> Result<NewProduct> {
    let name = required_text(body.name, "name")?;
    let brand = required_text(body.brand, "brand")?;
    let price = body
        .price
        .ok_or_else(|| AppError::BadRequest("Field 'price' is required".to_owned()))?;
    let category_id = body
        .category_id
        .ok_or_else(|| AppError::BadRequest("Field 'category_id' is required".to_owned()))?;

    validate_prices(Some(price), body.original_price)?;
    let rating = body.rating.unwrap_or_default();
    validate_rating(rating)?;

    Ok(NewProduct {
        name,
        description: blank_to_none(body.description),
        price,
        original_price: body.original_price,
        image_url: blank_to_none(body.image_url),
        category_id,
        brand,
        rating,
        in_stock: body.in_stock.unwrap_or(true),
        is_new: body.is_new.unwrap_or(false),
        is_popular: body.is_popular.unwrap_or(false),
    })
}

fn validate_update(body: UpdateProductBody) -> Result<ProductPatch> {
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Field 'name' must not be empty".to_owned()));
    }
    validate_prices(body.price, body.original_price)?;
    if let Some(rating) = body.rating {
        validate_rating(rating)?;
    }

    let patch = ProductPatch {
        name: body.name.map(|n| n.trim().to_owned()),
        description: body.description,
        price: body.price,
        original_price: body.original_price,
        image_url: body.image_url,
        category_id: body.category_id,
        brand: body.brand.map(|b| b.trim().to_owned()),
        rating: body.rating,
        in_stock: body.in_stock,
        is_new: body.is_new,
        is_popular: body.is_popular,
    };

    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_owned()));
    }
    Ok(patch)
}

fn validate_prices(price: Option<Money>, original_price: Option<Money>) -> Result<()> {
    if price.is_some_and(|p| !p.is_positive()) {
        return Err(AppError::BadRequest("Price must be greater than 0".to_owned()));
    }
    if original_price.is_some_and(|p| !p.is_positive()) {
        return Err(AppError::BadRequest(
            "Original price must be greater than 0".to_owned(),
        ));
    }
    if price.into_iter().chain(original_price).any(|p| p > Money::MAX_PRICE) {
        return Err(AppError::BadRequest(format!(
            "Price must not exceed {}",
            Money::MAX_PRICE
        )));
    }
    Ok(())
}

fn validate_rating(rating: Decimal) -> Result<()> {
    if rating < Decimal::ZERO || rating > Decimal::from(5) {
        return Err(AppError::BadRequest("Rating must be between 0 and 5".to_owned()));
    }
    Ok(())
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    blank_to_none(value).ok_or_else(|| AppError::BadRequest(format!("Field '{field}' is required")))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> CreateProductBody {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_create_requires_fields() {
        let err = validate_create(body(serde_json::json!({
            "price": 1200,
            "category_id": 1,
            "brand": "Lumière"
        })))
        .unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Field 'name' is required");

        let err = validate_create(body(serde_json::json!({
            "name": "Rose Serum",
            "category_id": 1,
            "brand": "Lumière"
        })))
        .unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Field 'price' is required");
    }

    #[test]
    fn test_create_defaults_and_camel_case() {
        let new = validate_create(body(serde_json::json!({
            "name": "  Rose Serum ",
            "price": "1200.50",
            "originalPrice": 1500,
            "categoryId": 3,
            "brand": "Lumière"
        })))
        .unwrap();
        assert_eq!(new.name, "Rose Serum");
        assert_eq!(new.price, Money::new(Decimal::new(120_050, 2)));
        assert_eq!(new.original_price, Some(Money::from_units(1500)));
        assert_eq!(new.category_id, CategoryId::new(3));
        assert!(new.in_stock);
        assert!(!new.is_new);
        assert_eq!(new.rating, Decimal::ZERO);
    }

    #[test]
    fn test_price_must_be_positive() {
        let err = validate_create(body(serde_json::json!({
            "name": "Rose Serum",
            "price": 0,
            "category_id": 1,
            "brand": "Lumière"
        })))
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_price_above_column_limit_rejected() {
        let patch = UpdateProductBody {
            price: Some(Money::from_units(100_000_000)),
            ..UpdateProductBody::default()
        };
        let err = validate_update(patch).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Price must not exceed 99999999.99");

        let patch = UpdateProductBody {
            original_price: Some(Money::MAX_PRICE),
            ..UpdateProductBody::default()
        };
        assert!(validate_update(patch).is_ok());
    }

    #[test]
    fn test_non_numeric_original_price_rejected_by_json() {
        let parsed = serde_json::from_value::<CreateProductBody>(serde_json::json!({
            "original_price": "cheap"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_update_rejected() {
        let err = validate_update(UpdateProductBody::default()).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: No fields to update");
    }

    #[test]
    fn test_update_rating_range() {
        let patch = UpdateProductBody {
            rating: Some(Decimal::new(55, 1)),
            ..UpdateProductBody::default()
        };
        assert!(validate_update(patch).is_err());

        let patch = UpdateProductBody {
            in_stock: Some(false),
            ..UpdateProductBody::default()
        };
        assert_eq!(validate_update(patch).unwrap().in_stock, Some(false));
    }
}
