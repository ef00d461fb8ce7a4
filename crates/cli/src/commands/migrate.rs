//! Session database commands.
//!
//! # Usage
//!
//! ```bash
//! palermo-cli migrate
//! palermo-cli sessions prune
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `SQLite` URL for the session database
//!   (falls back to `DATABASE_URL`, then the storefront's default file)
//!
//! The storefront also runs the migration on startup; running it here lets
//! deploys create the table before the first request.

use palermo_storefront::config::DEFAULT_DATABASE_URL;
use palermo_storefront::db;
use palermo_storefront::middleware::session_store;
use secrecy::SecretString;
use thiserror::Error;
use tower_sessions::session_store::ExpiredDeletion;

/// Errors that can occur during session database maintenance.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session store error.
    #[error("Session store error: {0}")]
    Store(#[from] tower_sessions::session_store::Error),
}

fn database_url() -> SecretString {
    dotenvy::dotenv().ok();

    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    SecretString::from(url)
}

/// Create the session table if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the migration fails.
pub async fn sessions() -> Result<(), MigrationError> {
    tracing::info!("Opening session database...");
    let pool = db::create_pool(&database_url()).await?;

    tracing::info!("Running session store migration...");
    session_store(&pool).migrate().await?;

    tracing::info!("Session store migration complete!");
    Ok(())
}

/// Delete every expired session record.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the delete fails.
pub async fn prune_sessions() -> Result<(), MigrationError> {
    let pool = db::create_pool(&database_url()).await?;
    let store = session_store(&pool);
    store.migrate().await?;

    let before = count_sessions(&pool).await?;
    store.delete_expired().await?;
    let after = count_sessions(&pool).await?;

    tracing::info!(
        removed = before.saturating_sub(after),
        remaining = after,
        "Pruned expired sessions"
    );
    Ok(())
}

async fn count_sessions(pool: &sqlx::SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tower_sessions")
        .fetch_one(pool)
        .await
}
