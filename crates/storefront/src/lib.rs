//! Palermo Storefront library.
//!
//! Public catalog, cart and checkout for Palermo furniture. Products and
//! sales live in the Palermo REST API; this crate reads the catalog, keeps
//! each visitor's cart in their session and hands the cart over to the API
//! as a sale at checkout.
//!
//! Exposed as a library so the binary, the CLI and tests share one
//! implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
