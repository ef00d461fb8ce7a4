//! Stock level classification.

use serde::{Deserialize, Serialize};

/// Availability of a product as shown on catalog cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Nothing left to sell.
    OutOfStock,
    /// At or below the product's minimum-stock threshold.
    Low,
    /// Comfortably stocked.
    InStock,
}

impl StockStatus {
    /// Classify a stock level against its minimum-stock threshold.
    #[must_use]
    pub const fn from_levels(stock: u32, min_stock: u32) -> Self {
        if stock == 0 {
            Self::OutOfStock
        } else if stock <= min_stock {
            Self::Low
        } else {
            Self::InStock
        }
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OutOfStock => "Out of stock",
            Self::Low => "Low stock",
            Self::InStock => "In stock",
        }
    }

    /// Whether the product can be added to a cart at all.
    #[must_use]
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::OutOfStock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_levels() {
        assert_eq!(StockStatus::from_levels(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_levels(5, 5), StockStatus::Low);
        assert_eq!(StockStatus::from_levels(3, 5), StockStatus::Low);
        assert_eq!(StockStatus::from_levels(6, 5), StockStatus::InStock);
        assert_eq!(StockStatus::from_levels(1, 0), StockStatus::InStock);
    }

    #[test]
    fn test_availability() {
        assert!(!StockStatus::OutOfStock.is_available());
        assert!(StockStatus::Low.is_available());
        assert_eq!(StockStatus::Low.label(), "Low stock");
    }
}
