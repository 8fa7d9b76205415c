//! Readers-table operations.
//!
//! One row per `(unid, replica_id, reader_name)`; the rows for a key
//! form the document's effective reader list. The write paths are only
//! reachable from the facade's add/delete operations, which run them
//! inside the same transaction as the index-row write, so the reader set
//! is always replaced whole, never patched.

use std::collections::HashSet;

use sqlx::SqliteConnection;

use crate::config::TableNames;
use crate::error::{LedgerError, Result};

/// Current reader-name set for a key. Empty means "no ACL restriction
/// recorded", which is distinct from "document not indexed".
pub(crate) async fn fetch_all(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
) -> Result<HashSet<String>> {
    let sql = format!(
        "SELECT reader_name FROM {} WHERE unid = ? AND replica_id = ?",
        tables.readers()
    );
    let names: Vec<String> = sqlx::query_scalar(&sql)
        .bind(unid)
        .bind(replica_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.readers(), e))?;
    Ok(names.into_iter().collect())
}

/// Replace the key's reader set: delete all rows, then insert the new
/// names. Runs inside the caller's transaction.
pub(crate) async fn replace_all(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
    names: &[String],
) -> Result<()> {
    delete_all(conn, tables, unid, replica_id).await?;

    let sql = format!(
        "INSERT INTO {} (unid, replica_id, reader_name) VALUES (?, ?, ?)",
        tables.readers()
    );
    for name in names {
        sqlx::query(&sql)
            .bind(unid)
            .bind(replica_id)
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|e| LedgerError::statement(tables.readers(), e))?;
    }
    Ok(())
}

pub(crate) async fn delete_all(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
) -> Result<()> {
    let sql = format!(
        "DELETE FROM {} WHERE unid = ? AND replica_id = ?",
        tables.readers()
    );
    sqlx::query(&sql)
        .bind(unid)
        .bind(replica_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.readers(), e))?;
    Ok(())
}
