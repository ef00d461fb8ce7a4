//! Palermo Core - Shared types library.
//!
//! This crate provides the domain types shared by the Palermo components:
//! - `storefront` - Public catalog, cart and checkout site
//! - `cli` - Operational commands (session store migrations, API diagnostics)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! The remote Palermo API is the source of truth for products and sales;
//! these types describe the values the storefront reads from and sends to it.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails and stock levels

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
