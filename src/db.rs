//! SQLite connection pool construction.
//!
//! Provides the bounded connection pool every ledger operation leases
//! from. The database file and its parent directories are created
//! automatically if they don't exist.
//!
//! # Write-Ahead Logging (WAL)
//!
//! WAL mode is enabled for all connections, which allows concurrent
//! readers and a single writer without blocking. This matters for the
//! crawl loop, where paginated reconciliation scans and per-document
//! writes from a fetch pool routinely overlap.
//!
//! # Connection Pool
//!
//! Uses `sqlx::SqlitePool` bounded at `db.max_connections`. Leased
//! connections are returned to the pool on drop, on every exit path.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::error::{LedgerError, Result};

/// Create a connection pool to the configured SQLite database.
///
/// - Creates the database file and parent directories if they don't exist.
/// - Enables WAL journal mode for concurrent read/write.
/// - Bounds the pool at `db.max_connections`.
///
/// # Errors
///
/// Returns [`LedgerError::Connection`] if the database cannot be created
/// or connected to.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LedgerError::DatabasePath {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(LedgerError::Connection)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect_with(options)
        .await
        .map_err(LedgerError::Connection)?;

    Ok(pool)
}
