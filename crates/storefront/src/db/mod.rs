//! Session database.
//!
//! The storefront keeps no catalog or order data of its own; the Palermo API
//! owns those. The only local state is the session table that backs
//! visitors' carts, stored in an embedded `SQLite` file.
//!
//! # Migrations
//!
//! The session table is created by the session store itself. The server
//! ensures it exists on startup, and it can be created ahead of time with:
//! ```bash
//! cargo run -p palermo-cli -- migrate
//! ```

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

/// Create a `SQLite` connection pool with sensible defaults.
///
/// The database file (and its parent directory) is created if missing.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the database cannot be
/// opened.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_answers_queries() {
        let url = SecretString::from("sqlite::memory:".to_string());
        let pool = create_pool(&url).await.unwrap();

        let (one,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
    }
}
