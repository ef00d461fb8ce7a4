//! Durable key/value storage for the cart payload.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tower_sessions::Session;

/// Errors from a cart storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key/value store that outlives a single request.
///
/// Implementations only move opaque strings; encoding the cart is the
/// store's job.
pub trait CartStorage: Send + Sync {
    /// Read the value under `key`, `None` when nothing was written yet.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Replace the value under `key`.
    fn write(&self, key: &str, value: String)
    -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Process-local storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn write(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.values
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Storage backed by the visitor's session record.
///
/// Sessions live in `SQLite` and are keyed by a long-lived cookie, so the cart
/// survives reloads and server restarts.
#[derive(Clone)]
pub struct SessionStorage {
    session: Session,
}

impl SessionStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStorage for SessionStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.session.get::<String>(key).await?)
    }

    async fn write(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.session.insert(key, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_clones_share_values() {
        let storage = MemoryStorage::new();
        let other = storage.clone();

        assert!(matches!(storage.read("k").await, Ok(None)));
        assert!(other.write("k", "v".to_string()).await.is_ok());
        assert_eq!(storage.read("k").await.ok().flatten().as_deref(), Some("v"));
    }
}
