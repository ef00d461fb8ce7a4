//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::api::{ApiClient, ApiError};
use crate::checkout::CheckoutLocks;
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds the configuration, the session
/// database pool, the Palermo API client and the checkout in-flight guard.
/// Cart contents are not here: each request loads its own cart from the
/// visitor's session.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: SqlitePool,
    api: ApiClient,
    checkout_locks: CheckoutLocks,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn new(config: StorefrontConfig, pool: SqlitePool) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;
        Ok(Self::with_client(config, pool, api))
    }

    /// Create application state around an existing API client.
    #[must_use]
    pub fn with_client(config: StorefrontConfig, pool: SqlitePool, api: ApiClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                api,
                checkout_locks: CheckoutLocks::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Session database pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Palermo API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn checkout_locks(&self) -> &CheckoutLocks {
        &self.inner.checkout_locks
    }
}
