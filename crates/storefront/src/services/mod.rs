//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login, profile and access tokens
//! - `cart` - Server-side cart mutations
//! - `orders` - Checkout and order history

pub mod auth;
pub mod cart;
pub mod orders;
