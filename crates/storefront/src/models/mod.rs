//! Domain models for storefront.
//!
//! Products and sales come from the Palermo API (see [`crate::api`]); the
//! cart lives in [`crate::cart`]. This module only holds what the storefront
//! keeps in the visitor's session besides the cart.

pub mod session;

pub use session::keys as session_keys;
