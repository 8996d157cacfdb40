//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and serialize with the snake_case column
//! names clients already know. Request bodies live next to their handlers.

pub mod order;
pub mod product;
pub mod user;

pub use order::{Order, OrderDetail, OrderItem, OrderSummary};
pub use product::{Category, CategoryTree, Pagination, Product, ProductDetail, ProductPage, Review};
pub use user::{CurrentUser, User};
