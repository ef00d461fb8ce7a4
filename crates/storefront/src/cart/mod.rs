//! Shopping cart.
//!
//! The cart is what the current visitor intends to buy. It is split in two:
//!
//! - [`CartState`] - an immutable list of [`CartEntry`] values. Every mutation
//!   returns a new state; totals are derived on every read.
//! - [`CartStore`] - the current state plus a [`CartStorage`] backend. After
//!   every mutation the store swaps in the new state and persists it. Storage
//!   failures are logged and swallowed: a broken backend degrades to an empty
//!   or stale cart, never to a failed request.
//!
//! Stock is advisory. The store accepts quantities above a product's known
//! stock and reports them as [`StockCheck::ExceedsStock`] so the view can warn;
//! the API is the authority when the order is placed.

mod storage;
mod store;

pub use storage::{CartStorage, MemoryStorage, SessionStorage, StorageError};
pub use store::{CART_STORAGE_KEY, CartStore};

use palermo_core::{Price, ProductId};
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::Product;

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    /// Product as it was when first added.
    #[serde(rename = "producto")]
    pub product: Product,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
}

impl CartEntry {
    /// `quantity * price`, computed on read.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.product.price * self.quantity
    }

    /// Whether another unit may be added without passing known stock.
    #[must_use]
    pub const fn can_increment(&self) -> bool {
        self.quantity < self.product.stock
    }

    /// Whether one unit may be taken away without dropping the line.
    #[must_use]
    pub const fn can_decrement(&self) -> bool {
        self.quantity > 1
    }
}

/// Result of comparing a cart quantity with the product's known stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockCheck {
    /// Quantity is within stock (or the product is not in the cart).
    Available,
    /// Quantity passes the stock seen when the product was added.
    ExceedsStock { requested: u32, available: u32 },
}

impl StockCheck {
    /// Whether the quantity is above the known stock.
    #[must_use]
    pub const fn is_exceeded(self) -> bool {
        matches!(self, Self::ExceedsStock { .. })
    }

    /// Non-blocking warning to show next to the cart line.
    #[must_use]
    pub fn warning(self) -> Option<String> {
        match self {
            Self::Available => None,
            Self::ExceedsStock {
                requested,
                available,
            } => Some(format!(
                "Only {available} available, you asked for {requested}. \
                 We will confirm availability when you place the order."
            )),
        }
    }
}

/// The visitor's cart: ordered, at most one entry per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CartState {
    entries: Vec<CartEntry>,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a cart from raw entries.
    ///
    /// Zero-quantity entries are dropped and repeated products are merged into
    /// the first occurrence, so stored payloads always hydrate into a valid
    /// cart.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = CartEntry>) -> Self {
        let mut merged: Vec<CartEntry> = Vec::new();
        for entry in entries.into_iter().filter(|e| e.quantity > 0) {
            match merged.iter_mut().find(|m| m.product.id == entry.product.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(entry.quantity);
                }
                None => merged.push(entry),
            }
        }
        Self { entries: merged }
    }

    #[must_use]
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.product.id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sum of line subtotals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.entries.iter().map(CartEntry::subtotal).sum()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.entries
            .iter()
            .fold(0, |count, e| count.saturating_add(e.quantity))
    }

    /// Compare the quantity held for `product_id` with its snapshot stock.
    #[must_use]
    pub fn stock_check(&self, product_id: ProductId) -> StockCheck {
        match self.get(product_id) {
            Some(entry) if entry.quantity > entry.product.stock => StockCheck::ExceedsStock {
                requested: entry.quantity,
                available: entry.product.stock,
            },
            _ => StockCheck::Available,
        }
    }

    /// Add `quantity` units of `product`.
    ///
    /// Increments the existing entry (keeping its snapshot) or appends a new
    /// one. Adding zero units changes nothing.
    #[must_use]
    pub fn with_added(&self, product: &Product, quantity: u32) -> Self {
        if quantity == 0 {
            return self.clone();
        }

        let mut entries = self.entries.clone();
        match entries.iter_mut().find(|e| e.product.id == product.id) {
            Some(entry) => entry.quantity = entry.quantity.saturating_add(quantity),
            None => entries.push(CartEntry {
                product: product.clone(),
                quantity,
            }),
        }
        Self { entries }
    }

    /// Drop the entry for `product_id`, if any.
    #[must_use]
    pub fn without(&self, product_id: ProductId) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| e.product.id != product_id)
                .cloned()
                .collect(),
        }
    }

    /// Set the quantity for `product_id`.
    ///
    /// Zero or negative quantities remove the entry. Unknown products are
    /// left alone. Quantities above stock are accepted.
    #[must_use]
    pub fn with_quantity(&self, product_id: ProductId, quantity: i64) -> Self {
        if quantity <= 0 {
            return self.without(product_id);
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let mut entries = self.entries.clone();
        if let Some(entry) = entries.iter_mut().find(|e| e.product.id == product_id) {
            entry.quantity = quantity;
        }
        Self { entries }
    }
}

impl<'de> Deserialize<'de> for CartState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<CartEntry>::deserialize(deserializer).map(Self::from_entries)
    }
}
