//! Wire types for the Palermo REST API.
//!
//! Field names on the wire are the API's own (Spanish); the Rust side uses
//! English names and `#[serde(rename)]` to bridge them. The cart persists
//! [`Product`] snapshots with the same serde mapping, so stored carts use the
//! exact shape the API returns.

use std::collections::BTreeMap;

use palermo_core::{Email, Price, ProductId, SaleId, StockStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Below this many units a product is flagged as "last units".
pub const LAST_UNITS_THRESHOLD: u32 = 10;

// =============================================================================
// Products
// =============================================================================

/// A product as returned by `GET /productos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(rename = "codigo_sku", default)]
    pub sku: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "precio", default)]
    pub price: Price,
    #[serde(default)]
    pub stock: u32,
    #[serde(rename = "stock_minimo", default)]
    pub min_stock: u32,
    #[serde(rename = "activo", default)]
    pub active: bool,
    #[serde(rename = "url_imagen", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Product {
    /// Whether the product should appear on public listings.
    #[must_use]
    pub const fn is_listed(&self) -> bool {
        self.active && self.stock > 0
    }

    /// Stock classification against the product's minimum-stock threshold.
    #[must_use]
    pub const fn stock_status(&self) -> StockStatus {
        StockStatus::from_levels(self.stock, self.min_stock)
    }

    /// Whether to show the "last units" badge.
    #[must_use]
    pub const fn is_last_units(&self) -> bool {
        self.stock < LAST_UNITS_THRESHOLD
    }

    /// Image to show for the product.
    ///
    /// Uses the product's own image when it has one, otherwise a stock photo
    /// picked from keywords in the product name.
    #[must_use]
    pub fn image_path(&self) -> String {
        if let Some(url) = self.image_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.to_string();
        }
        fallback_image(&self.name).to_string()
    }
}

/// Keyword → stock photo table for products without an image.
///
/// First match wins, so compound names ("silla de escritorio", "lámpara de
/// mesa") resolve to the more specific piece.
const FALLBACK_IMAGES: &[(&[&str], &str)] = &[
    (&["sofa", "sofá", "sillón"], "/static/img/sofa.svg"),
    (&["silla", "chair", "banqueta"], "/static/img/chair.svg"),
    (&["lampara", "lámpara", "lamp"], "/static/img/lamp.svg"),
    (&["escritorio", "desk"], "/static/img/desk.svg"),
    (&["mesa", "table"], "/static/img/table.svg"),
    (&["cama", "bed", "colchón"], "/static/img/bed.svg"),
    (&["estante", "librero", "repisa", "shelf"], "/static/img/shelf.svg"),
    (&["comoda", "cómoda", "dresser"], "/static/img/dresser.svg"),
    (&["armario", "ropero", "closet", "wardrobe"], "/static/img/wardrobe.svg"),
    (&["espejo", "mirror"], "/static/img/mirror.svg"),
    (&["alfombra", "rug"], "/static/img/rug.svg"),
    (&["cortina", "curtain"], "/static/img/curtain.svg"),
];

const DEFAULT_IMAGE: &str = "/static/img/living-room.svg";

fn fallback_image(name: &str) -> &'static str {
    let name = name.to_lowercase();
    FALLBACK_IMAGES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| name.contains(k)))
        .map_or(DEFAULT_IMAGE, |(_, path)| path)
}

/// Payload of `GET /productos`.
///
/// Older API deployments return a bare array; newer ones wrap it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProductList {
    Bare(Vec<Product>),
    Wrapped {
        #[serde(rename = "productos")]
        products: Vec<Product>,
    },
}

impl ProductList {
    pub(crate) fn into_vec(self) -> Vec<Product> {
        match self {
            Self::Bare(products) | Self::Wrapped { products } => products,
        }
    }
}

// =============================================================================
// Sales
// =============================================================================

/// One order line sent to `POST /ventas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "precio_unitario", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// Body of `POST /ventas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "nombre_cliente")]
    pub customer_name: String,
    #[serde(rename = "email_cliente")]
    pub customer_email: Email,
    /// Empty when the customer left it blank.
    #[serde(rename = "telefono_cliente")]
    pub customer_phone: String,
    #[serde(rename = "productos")]
    pub lines: Vec<OrderLine>,
}

/// A sale as echoed back by `POST /ventas`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    #[serde(default)]
    pub total: Price,
    #[serde(rename = "fecha", default)]
    pub date: Option<String>,
    #[serde(rename = "estado", default)]
    pub status: Option<String>,
}

// =============================================================================
// Envelope
// =============================================================================

/// Field-level validation messages, keyed by wire field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default, deserialize_with = "field_errors")]
    pub errors: FieldErrors,
}

impl<T> ApiResponse<T> {
    /// Best human-readable failure message the envelope offers.
    pub(crate) fn failure_message(&self) -> String {
        self.message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "The request could not be completed".to_string())
    }
}

/// Validation maps carry either one message or a list per field. Anything
/// else (including the empty array some deployments send) means "no errors".
fn field_errors<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FieldErrors, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Object(fields) = raw else {
        return Ok(FieldErrors::new());
    };

    Ok(fields
        .into_iter()
        .map(|(field, value)| {
            let messages = match value {
                serde_json::Value::String(message) => vec![message],
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(message) => message,
                        other => other.to_string(),
                    })
                    .collect(),
                other => vec![other.to_string()],
            };
            (field, messages)
        })
        .collect())
}
