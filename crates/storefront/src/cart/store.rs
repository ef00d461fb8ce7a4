//! Cart state bound to a storage backend.

use palermo_core::{Price, ProductId};
use tracing::{instrument, warn};

use super::{CartEntry, CartState, CartStorage, StockCheck};
use crate::api::Product;

/// Storage key the cart payload is written under.
pub const CART_STORAGE_KEY: &str = "palermo-cart";

/// The current cart and where it is persisted.
///
/// Mutations replace the state wholesale and then write it back. Readers of
/// [`CartStore::state`] therefore always see a complete state, either the
/// one before a mutation or the one after it.
pub struct CartStore<S> {
    storage: S,
    key: String,
    state: CartState,
}

impl<S: CartStorage> CartStore<S> {
    /// Hydrate the cart from `storage` under [`CART_STORAGE_KEY`].
    pub async fn load(storage: S) -> Self {
        Self::load_with_key(storage, CART_STORAGE_KEY).await
    }

    /// Hydrate the cart from `storage` under `key`.
    ///
    /// An absent, unreadable or malformed payload yields an empty cart.
    #[instrument(skip(storage, key), fields(key = %key.as_ref()))]
    pub async fn load_with_key(storage: S, key: impl AsRef<str>) -> Self {
        let key = key.as_ref().to_string();
        let state = match storage.read(&key).await {
            Ok(Some(raw)) => serde_json::from_str::<CartState>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored cart is malformed, starting empty");
                CartState::new()
            }),
            Ok(None) => CartState::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart, starting empty");
                CartState::new()
            }
        };

        Self {
            storage,
            key,
            state,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    #[must_use]
    pub fn entries(&self) -> &[CartEntry] {
        self.state.entries()
    }

    #[must_use]
    pub fn total(&self) -> Price {
        self.state.total()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.state.item_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Add `quantity` units of `product` and persist.
    pub async fn add_to_cart(&mut self, product: &Product, quantity: u32) -> StockCheck {
        let next = self.state.with_added(product, quantity);
        self.commit(next).await;
        self.state.stock_check(product.id)
    }

    /// Remove `product_id` from the cart and persist.
    pub async fn remove_from_cart(&mut self, product_id: ProductId) {
        let next = self.state.without(product_id);
        self.commit(next).await;
    }

    /// Set the quantity of `product_id` and persist. `quantity <= 0` removes.
    pub async fn update_quantity(&mut self, product_id: ProductId, quantity: i64) -> StockCheck {
        let next = self.state.with_quantity(product_id, quantity);
        self.commit(next).await;
        self.state.stock_check(product_id)
    }

    /// Empty the cart and persist.
    pub async fn clear_cart(&mut self) {
        self.commit(CartState::new()).await;
    }

    /// Swap in `next`, then write it back. Write failures are logged only.
    async fn commit(&mut self, next: CartState) {
        self.state = next;

        let payload = match serde_json::to_string(&self.state) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode cart");
                return;
            }
        };

        if let Err(e) = self.storage.write(&self.key, payload).await {
            warn!(error = %e, key = %self.key, "Failed to persist cart");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::product;
    use crate::cart::{MemoryStorage, StorageError};

    struct BrokenStorage;

    impl CartStorage for BrokenStorage {
        async fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disk on fire".to_string()))
        }

        async fn write(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk on fire".to_string()))
        }
    }

    #[tokio::test]
    async fn test_persists_and_rehydrates() {
        let storage = MemoryStorage::new();
        let mut cart = CartStore::load(storage.clone()).await;
        cart.add_to_cart(&product(1, 100, 10), 2).await;
        cart.add_to_cart(&product(2, 50, 10), 1).await;

        let reloaded = CartStore::load(storage).await;
        assert_eq!(reloaded.state(), cart.state());
        assert_eq!(reloaded.item_count(), 3);
    }

    #[tokio::test]
    async fn test_malformed_payload_hydrates_empty() {
        let storage = MemoryStorage::new();
        assert!(
            storage
                .write(CART_STORAGE_KEY, "{not json".to_string())
                .await
                .is_ok()
        );

        let cart = CartStore::load(storage).await;
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_hydrates_empty() {
        let storage = MemoryStorage::new();
        assert!(
            storage
                .write(CART_STORAGE_KEY, r#"{"producto": 1}"#.to_string())
                .await
                .is_ok()
        );

        assert!(CartStore::load(storage).await.is_empty());
    }

    #[tokio::test]
    async fn test_broken_storage_degrades_to_memory_only() {
        let mut cart = CartStore::load(BrokenStorage).await;
        assert!(cart.is_empty());

        let check = cart.add_to_cart(&product(1, 100, 10), 2).await;
        assert_eq!(check, StockCheck::Available);
        assert_eq!(cart.item_count(), 2);
    }

    #[tokio::test]
    async fn test_update_reports_stock_excess() {
        let p = product(1, 100, 3);
        let mut cart = CartStore::load(MemoryStorage::new()).await;
        cart.add_to_cart(&p, 1).await;

        let check = cart.update_quantity(p.id, 4).await;
        assert!(check.is_exceeded());
        assert_eq!(cart.item_count(), 4);
    }

    #[tokio::test]
    async fn test_remove_and_clear_persist() {
        let storage = MemoryStorage::new();
        let mut cart = CartStore::load(storage.clone()).await;
        cart.add_to_cart(&product(1, 100, 10), 1).await;
        cart.add_to_cart(&product(2, 100, 10), 1).await;

        cart.remove_from_cart(ProductId::new(1)).await;
        assert_eq!(CartStore::load(storage.clone()).await.state().len(), 1);

        cart.clear_cart().await;
        assert!(CartStore::load(storage.clone()).await.is_empty());
        assert_eq!(
            storage.read(CART_STORAGE_KEY).await.ok().flatten().as_deref(),
            Some("[]")
        );
    }

    #[tokio::test]
    async fn test_separate_keys_are_independent() {
        let storage = MemoryStorage::new();
        let mut a = CartStore::load_with_key(storage.clone(), "a").await;
        a.add_to_cart(&product(1, 100, 10), 1).await;

        assert!(CartStore::load_with_key(storage, "b").await.is_empty());
    }
}
