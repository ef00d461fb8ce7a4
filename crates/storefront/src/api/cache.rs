//! Cache types for Palermo API responses.

use std::sync::Arc;

use palermo_core::ProductId;

use super::types::Product;

/// Cache key for product reads.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Catalog,
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Catalog(Arc<Vec<Product>>),
    Product(Box<Product>),
}
