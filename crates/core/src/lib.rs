//! Lumière Core - domain types and cart pricing.
//!
//! This crate provides the types shared by every Lumière component:
//! - `storefront` - JSON API for catalog, cart, checkout and accounts
//! - `cli` - migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. The cart and its pricing formula live here so that the
//! service and its tests share exactly one implementation.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`promo`] - The fixed promo code table
//! - [`cart`] - Cart lines and their mutations
//! - [`pricing`] - Subtotal, discount, shipping and total
//! - [`catalog`] - Validated product listing queries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod pricing;
pub mod promo;
pub mod types;

pub use cart::{Cart, CartLine, NewCartLine, Quantity};
pub use pricing::CartSummary;
pub use promo::{PromoCode, PromoError};
pub use types::*;
