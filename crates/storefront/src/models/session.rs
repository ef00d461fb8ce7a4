//! Session-related types.

/// Session keys.
pub mod keys {
    /// Key for the serialized cart.
    pub const CART: &str = crate::cart::CART_STORAGE_KEY;

    /// Key for the confirmation of the order just placed, shown once on the
    /// success page.
    pub const LAST_ORDER: &str = "last_order";
}
