//! Attachments-table operations.
//!
//! One row per `(unid, replica_id, attachment_id)`, mirroring the
//! readers store: full replace on every add, cascade delete with the
//! index row, set-valued reads.

use std::collections::HashSet;

use sqlx::SqliteConnection;

use crate::config::TableNames;
use crate::error::{LedgerError, Result};

/// Attachment identifiers recorded for a key; empty if none.
pub(crate) async fn fetch_all(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
) -> Result<HashSet<String>> {
    let sql = format!(
        "SELECT attachment_id FROM {} WHERE unid = ? AND replica_id = ?",
        tables.attachments()
    );
    let ids: Vec<String> = sqlx::query_scalar(&sql)
        .bind(unid)
        .bind(replica_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.attachments(), e))?;
    Ok(ids.into_iter().collect())
}

/// Replace the key's attachment set inside the caller's transaction.
pub(crate) async fn replace_all(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
    ids: &[String],
) -> Result<()> {
    delete_all(conn, tables, unid, replica_id).await?;

    let sql = format!(
        "INSERT INTO {} (unid, replica_id, attachment_id) VALUES (?, ?, ?)",
        tables.attachments()
    );
    for id in ids {
        sqlx::query(&sql)
            .bind(unid)
            .bind(replica_id)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| LedgerError::statement(tables.attachments(), e))?;
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
        tables.attachments()
    );
    sqlx::query(&sql)
        .bind(unid)
        .bind(replica_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.attachments(), e))?;
    Ok(())
}
