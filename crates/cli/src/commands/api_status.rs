//! Palermo API health check.
//!
//! Fetches the product list the storefront would show and summarizes stock
//! levels, so an operator can confirm the API URL and token before starting
//! the server.
//!
//! # Environment Variables
//!
//! - `PALERMO_API_URL` - Base URL of the Palermo REST API
//! - `PALERMO_API_TOKEN` - Optional bearer token

use std::fmt;

use palermo_core::StockStatus;
use palermo_storefront::api::{ApiClient, ApiError, Product};
use palermo_storefront::config::{ConfigError, StorefrontConfig};
use thiserror::Error;

/// Errors that can occur while checking the API.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Stock summary of the catalog.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub total: usize,
    pub active: usize,
    pub listed: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
    /// `(name, stock)` for every product when running verbose.
    pub details: Vec<(String, u32)>,
}

impl CatalogSummary {
    #[must_use]
    pub fn from_products(products: &[Product], verbose: bool) -> Self {
        let mut summary = Self {
            total: products.len(),
            ..Self::default()
        };

        for product in products {
            if product.active {
                summary.active += 1;
            }
            if product.is_listed() {
                summary.listed += 1;
            }
            match product.stock_status() {
                StockStatus::OutOfStock => summary.out_of_stock += 1,
                StockStatus::Low => summary.low_stock += 1,
                StockStatus::InStock => {}
            }
            if verbose {
                summary.details.push((product.name.clone(), product.stock));
            }
        }

        summary
    }
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} products ({} active, {} listed), {} low on stock, {} out of stock",
            self.total, self.active, self.listed, self.low_stock, self.out_of_stock
        )?;
        for (name, stock) in &self.details {
            write!(f, "\n  {name}: {stock}")?;
        }
        Ok(())
    }
}

/// Fetch the catalog and summarize it.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete or the API call fails.
pub async fn run(verbose: bool) -> Result<CatalogSummary, StatusError> {
    let config = StorefrontConfig::from_env()?;
    let client = ApiClient::new(&config.api)?;

    tracing::info!(url = %config.api.base_url, "Fetching products...");
    let products = client.list_products().await?;

    Ok(CatalogSummary::from_products(&products, verbose))
}

#[cfg(test)]
mod tests {
    use super::*;
    use palermo_core::{Price, ProductId};

    fn product(id: i64, stock: u32, min_stock: u32, active: bool) -> Product {
        Product {
            id: ProductId::new(id),
            sku: format!("SKU-{id}"),
            name: format!("Producto {id}"),
            description: None,
            category: "Living".to_string(),
            price: Price::default(),
            stock,
            min_stock,
            active,
            image_url: None,
        }
    }

    #[test]
    fn test_summary_counts_stock_levels() {
        let products = vec![
            product(1, 20, 5, true),
            product(2, 3, 5, true),
            product(3, 0, 5, true),
            product(4, 8, 2, false),
        ];

        let summary = CatalogSummary::from_products(&products, false);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.active, 3);
        assert_eq!(summary.listed, 2);
        assert_eq!(summary.low_stock, 1);
        assert_eq!(summary.out_of_stock, 1);
        assert!(summary.details.is_empty());
    }

    #[test]
    fn test_verbose_lists_every_product() {
        let products = vec![product(1, 20, 5, true), product(2, 0, 5, false)];
        let summary = CatalogSummary::from_products(&products, true);

        let text = summary.to_string();
        assert!(text.starts_with("2 products (1 active, 1 listed)"));
        assert!(text.contains("Producto 1: 20"));
        assert!(text.contains("Producto 2: 0"));
    }
}
