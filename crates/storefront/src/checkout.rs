//! Checkout handoff: turn the cart into a sale on the Palermo API.
//!
//! The storefront does not own orders. It validates the customer's contact
//! details, sends the cart lines at their snapshot prices, and empties the
//! cart only once the API has confirmed the sale. Any failure leaves the cart
//! exactly as it was so the shopper can fix the problem and retry.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use palermo_core::{Email, EmailError, Price, SaleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, ApiError, FieldErrors, OrderLine, OrderRequest, Sale};
use crate::cart::{CartState, CartStorage, CartStore};

/// Maximum length accepted for the customer name.
const MAX_NAME_LENGTH: usize = 120;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Please enter your name")]
    MissingName,

    #[error("Name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Order rejected: {0}")]
    Api(#[from] ApiError),

    #[error("Your order is already being placed")]
    InFlight,
}

impl CheckoutError {
    /// Message to render on the checkout form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// Field-level validation messages from the API, if any.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Api(e) => e.field_errors(),
            _ => None,
        }
    }

    /// Whether the failure is ours (or the network's) rather than the
    /// shopper's input.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_transport())
    }
}

/// Validated customer contact details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerInfo {
    pub name: String,
    pub email: Email,
    /// Empty when not given.
    pub phone: String,
}

impl CustomerInfo {
    /// Validate raw form input.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or too long, or the email is
    /// invalid.
    pub fn parse(name: &str, email: &str, phone: Option<&str>) -> Result<Self, CheckoutError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CheckoutError::MissingName);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(CheckoutError::NameTooLong {
                max: MAX_NAME_LENGTH,
            });
        }

        Ok(Self {
            name: name.to_string(),
            email: Email::parse(email)?,
            phone: phone.map(str::trim).unwrap_or_default().to_string(),
        })
    }
}

impl OrderRequest {
    /// Build the sale request for `cart`, preserving line order.
    ///
    /// Unit prices are the snapshot prices stored in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart has no entries.
    pub fn from_cart(cart: &CartState, customer: &CustomerInfo) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        Ok(Self {
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            customer_phone: customer.phone.clone(),
            lines: cart
                .entries()
                .iter()
                .map(|entry| OrderLine {
                    product_id: entry.product.id,
                    quantity: entry.quantity,
                    unit_price: entry.product.price.amount(),
                })
                .collect(),
        })
    }
}

/// Something that can turn an order into a sale.
pub trait OrderGateway: Send + Sync {
    fn place_order(&self, order: &OrderRequest)
    -> impl Future<Output = Result<Sale, ApiError>> + Send;
}

impl OrderGateway for ApiClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<Sale, ApiError> {
        self.create_sale(order).await
    }
}

/// What the shopper sees after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub sale_id: SaleId,
    /// Total as computed by the API.
    pub total: Price,
    pub message: String,
}

impl From<Sale> for OrderConfirmation {
    fn from(sale: Sale) -> Self {
        Self {
            message: format!("Order #{} has been placed. We will contact you shortly.", sale.id),
            sale_id: sale.id,
            total: sale.total,
        }
    }
}

/// Place the order for the cart in `store`.
///
/// The cart is cleared only after the gateway confirms the sale.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` for an empty cart, or
/// `CheckoutError::Api` when the gateway fails. The cart is untouched in
/// both cases.
#[instrument(skip_all, fields(lines = store.state().len(), total = %store.total()))]
pub async fn submit<S, G>(
    store: &mut CartStore<S>,
    gateway: &G,
    customer: &CustomerInfo,
) -> Result<OrderConfirmation, CheckoutError>
where
    S: CartStorage,
    G: OrderGateway,
{
    let order = OrderRequest::from_cart(store.state(), customer)?;

    let sale = match gateway.place_order(&order).await {
        Ok(sale) => sale,
        Err(e) => {
            warn!(error = %e, "Order was not placed, keeping cart");
            return Err(e.into());
        }
    };

    if sale.total != store.total() {
        info!(
            cart_total = %store.total(),
            sale_total = %sale.total,
            "Sale total differs from cart snapshot"
        );
    }

    store.clear_cart().await;
    info!(sale_id = %sale.id, "Checkout completed");

    Ok(sale.into())
}

// =============================================================================
// In-flight guard
// =============================================================================

/// Allows one pending checkout per cart owner.
///
/// Cheap to clone; clones share the same set of owners.
#[derive(Debug, Clone, Default)]
pub struct CheckoutLocks {
    pending: Arc<Mutex<HashSet<String>>>,
}

impl CheckoutLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `owner` as having a checkout in flight.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InFlight` if `owner` already has one.
    pub fn acquire(&self, owner: &str) -> Result<CheckoutGuard, CheckoutError> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !pending.insert(owner.to_string()) {
            return Err(CheckoutError::InFlight);
        }

        Ok(CheckoutGuard {
            pending: Arc::clone(&self.pending),
            owner: owner.to_string(),
        })
    }

    /// Whether `owner` has a checkout in flight.
    #[must_use]
    pub fn is_pending(&self, owner: &str) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains(owner))
            .unwrap_or(false)
    }
}

/// Releases the owner's slot when dropped.
#[derive(Debug)]
pub struct CheckoutGuard {
    pending: Arc<Mutex<HashSet<String>>>,
    owner: String,
}

impl Drop for CheckoutGuard {
    fn drop(&mut self) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pending.remove(&self.owner);
    }
}
