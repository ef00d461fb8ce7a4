//! Client for the Palermo REST API.
//!
//! # Architecture
//!
//! - The API is the source of truth for products, stock and sales. The
//!   storefront never writes products; it only reads them and creates sales.
//! - Every response is wrapped in an envelope (`success`, `message`, `data`,
//!   `errors`). [`ApiClient`] unwraps it and turns failures into [`ApiError`].
//! - Product reads are cached in `moka` for a short TTL (stock moves, so the
//!   default is 30 seconds). Creating a sale invalidates the cache.
//!
//! # Example
//!
//! ```rust,ignore
//! use palermo_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config.api)?;
//! let products = client.list_products().await?;
//! let sofa = client.get_product(ProductId::new(3)).await?;
//! ```

mod cache;
pub mod types;

use std::sync::Arc;

use moka::future::Cache;
use palermo_core::ProductId;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ApiConfig;

use cache::{CacheKey, CacheValue};
pub use types::{FieldErrors, OrderLine, OrderRequest, Product, Sale};
use types::{ApiResponse, ProductList};

/// Errors that can occur when talking to the Palermo API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a failure envelope or a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
        field_errors: FieldErrors,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A success envelope without the `data` it should carry.
    #[error("Response from {0} has no data")]
    MissingData(&'static str),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl ApiError {
    /// Message safe to show to a shopper.
    ///
    /// Business failures reported by the API are passed through verbatim;
    /// transport failures get a generic retry hint.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::NotFound(_) => "The product is no longer available".to_string(),
            Self::RateLimited(_) => "Too many requests, please try again in a moment".to_string(),
            Self::Http(_) | Self::Parse(_) | Self::MissingData(_) => {
                "We could not reach the store right now. Please try again.".to_string()
            }
        }
    }

    /// Field-level validation messages, if the API sent any.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Api { field_errors, .. } if !field_errors.is_empty() => Some(field_errors),
            _ => None,
        }
    }

    /// Whether this is a failure of the request itself rather than a
    /// business answer from the API.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_) | Self::MissingData(_))
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Palermo REST API.
///
/// Cheap to clone; all clones share the HTTP connection pool and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("palermo-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                token: config.token.clone(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and unwrap the response envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &'static str,
    ) -> Result<T, ApiError> {
        let request = match &self.inner.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(
                    endpoint,
                    status = %status,
                    error = %e,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to parse Palermo API response"
                );
                if status == StatusCode::NOT_FOUND {
                    return Err(ApiError::NotFound(endpoint.to_string()));
                }
                return Err(ApiError::Parse(e));
            }
        };

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(envelope.failure_message()));
        }

        if !status.is_success() || !envelope.success {
            tracing::warn!(
                endpoint,
                status = %status,
                code = ?envelope.error_code,
                "Palermo API reported a failure"
            );
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: envelope.failure_message(),
                code: envelope.error_code.clone(),
                field_errors: envelope.errors,
            });
        }

        envelope.data.ok_or(ApiError::MissingData(endpoint))
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get every product the API knows about, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, ApiError> {
        if let Some(CacheValue::Catalog(products)) =
            self.inner.cache.get(&CacheKey::Catalog).await
        {
            debug!("Cache hit for catalog");
            return Ok(products);
        }

        let request = self.inner.client.get(self.url("/productos"));
        let products = Arc::new(
            self.execute::<ProductList>(request, "/productos")
                .await?
                .into_vec(),
        );
        debug!(count = products.len(), "Fetched catalog");

        self.inner
            .cache
            .insert(CacheKey::Catalog, CacheValue::Catalog(Arc::clone(&products)))
            .await;

        Ok(products)
    }

    /// Get products that can be shown and sold: active and in stock.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn listed_products(&self) -> Result<Vec<Product>, ApiError> {
        Ok(self
            .list_products()
            .await?
            .iter()
            .filter(|p| p.is_listed())
            .cloned()
            .collect())
    }

    /// Get a single product by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist, or another
    /// error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let request = self.inner.client.get(self.url(&format!("/productos/{id}")));
        let product: Product = self.execute(request, "/productos/{id}").await?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    // =========================================================================
    // Sale Methods
    // =========================================================================

    /// Create a sale from a checkout order.
    ///
    /// Never cached. Invalidates cached products on success because the API
    /// has just moved stock.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` with the API's message and field errors when
    /// the order is rejected, or another error if the request fails.
    #[instrument(skip(self, order), fields(lines = order.lines.len()))]
    pub async fn create_sale(&self, order: &OrderRequest) -> Result<Sale, ApiError> {
        let request = self.inner.client.post(self.url("/ventas")).json(order);
        let sale: Sale = self.execute(request, "/ventas").await?;

        self.inner.cache.invalidate_all();
        tracing::info!(sale_id = %sale.id, total = %sale.total, "Sale created");

        Ok(sale)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::get, routing::post};
    use palermo_core::{Email, Price, SaleId};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};

    use super::*;

    /// Serve `app` on an ephemeral port and return a client pointed at it.
    async fn client_for(app: Router) -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = ApiConfig {
            base_url: format!("http://{addr}/api/").parse().unwrap(),
            token: None,
            timeout: Duration::from_secs(5),
            product_cache_ttl: Duration::from_secs(60),
        };
        ApiClient::new(&config).unwrap()
    }

    fn sofa() -> Value {
        json!({
            "id": 1, "nombre": "Sofá Nórdico", "categoria": "Living",
            "precio": "100.00", "stock": 5, "stock_minimo": 2, "activo": true
        })
    }

    fn order() -> OrderRequest {
        OrderRequest {
            customer_name: "Ana".to_string(),
            customer_email: Email::parse("ana@palermo.com").unwrap(),
            customer_phone: String::new(),
            lines: vec![OrderLine {
                product_id: ProductId::new(1),
                quantity: 2,
                unit_price: Decimal::from(100),
            }],
        }
    }

    #[tokio::test]
    async fn test_list_products_is_cached() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let app = Router::new().route(
            "/api/productos",
            get(|| async {
                HITS.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "success": true,
                    "data": {"productos": [sofa(), {"id": 2, "nombre": "Mesa", "precio": 50, "stock": 0, "activo": true}]}
                }))
            }),
        );
        let client = client_for(app).await;

        let first = client.list_products().await.unwrap();
        let second = client.list_products().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(HITS.load(Ordering::SeqCst), 1);

        let listed = client.listed_products().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].price, Price::from_cents(10_000));
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let app = Router::new().route(
            "/api/productos/{id}",
            get(|| async {
                (
                    AxumStatus::NOT_FOUND,
                    Json(json!({"success": false, "message": "Producto no encontrado"})),
                )
            }),
        );
        let client = client_for(app).await;

        let err = client.get_product(ProductId::new(99)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Producto no encontrado"));
    }

    #[tokio::test]
    async fn test_create_sale_success() {
        let app = Router::new().route(
            "/api/ventas",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["productos"][0]["cantidad"], 2);
                Json(json!({
                    "success": true,
                    "message": "Venta registrada",
                    "data": {"id": 77, "total": 200, "estado": "pendiente"}
                }))
            }),
        );
        let client = client_for(app).await;

        let sale = client.create_sale(&order()).await.unwrap();
        assert_eq!(sale.id, SaleId::new(77));
        assert_eq!(sale.total, Price::from_cents(20_000));
    }

    #[tokio::test]
    async fn test_create_sale_validation_failure() {
        let app = Router::new().route(
            "/api/ventas",
            post(|| async {
                (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "success": false,
                        "message": "Stock insuficiente para Sofá Nórdico",
                        "error_code": "STOCK",
                        "errors": {"productos.0.cantidad": ["Disponible: 1"]}
                    })),
                )
            }),
        );
        let client = client_for(app).await;

        let err = client.create_sale(&order()).await.unwrap_err();
        assert_eq!(err.user_message(), "Stock insuficiente para Sofá Nórdico");
        assert!(!err.is_transport());
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["productos.0.cantidad"], vec!["Disponible: 1".to_string()]);
        assert!(matches!(err, ApiError::Api { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_success_status_with_failure_flag() {
        let app = Router::new().route(
            "/api/ventas",
            post(|| async { Json(json!({"success": false, "error": "Cliente bloqueado"})) }),
        );
        let client = client_for(app).await;

        let err = client.create_sale(&order()).await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 200, .. }));
        assert_eq!(err.user_message(), "Cliente bloqueado");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_transport_error() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9/api".parse().unwrap(),
            token: None,
            timeout: Duration::from_secs(2),
            product_cache_ttl: Duration::from_secs(1),
        };
        let client = ApiClient::new(&config).unwrap();

        let err = client.list_products().await.unwrap_err();
        assert!(err.is_transport());
    }
}
