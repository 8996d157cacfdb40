//! Category route handlers.

use axum::{Json, extract::State};

use crate::db::CategoryRepository;
use crate::error::Result;
use crate::models::CategoryTree;
use crate::state::AppState;

/// Top-level categories, each with its subcategories.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<CategoryTree>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(CategoryTree::build(categories)))
}
