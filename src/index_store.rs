//! Primary index-table operations.
//!
//! Owns the `{prefix}_indexed` table: one row per `(unid, replica_id)`
//! with the document's crawl state and last-modified bookkeeping. The
//! facade composes these with the readers/attachments stores under one
//! transaction per public operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::config::TableNames;
use crate::error::{LedgerError, Result};
use crate::models::{DocumentKey, IndexState};

pub(crate) async fn has_document(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE unid = ? AND replica_id = ?)",
        tables.index()
    );
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(unid)
        .bind(replica_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.index(), e))?;
    Ok(exists)
}

/// Insert the index row, or refresh its state/bookkeeping in place when
/// the key already exists.
pub(crate) async fn upsert_row(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
    state: IndexState,
    last_modified: DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (unid, replica_id, state, last_modified)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(unid, replica_id) DO UPDATE SET
             state = excluded.state,
             last_modified = excluded.last_modified",
        tables.index()
    );
    sqlx::query(&sql)
        .bind(unid)
        .bind(replica_id)
        .bind(state.as_str())
        .bind(last_modified.timestamp())
        .execute(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.index(), e))?;
    Ok(())
}

/// Delete the index row. Returns whether a row existed.
pub(crate) async fn delete_row(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    unid: &str,
    replica_id: &str,
) -> Result<bool> {
    let sql = format!(
        "DELETE FROM {} WHERE unid = ? AND replica_id = ?",
        tables.index()
    );
    let result = sqlx::query(&sql)
        .bind(unid)
        .bind(replica_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.index(), e))?;
    Ok(result.rows_affected() > 0)
}

/// One page of the index in ascending `unid` order.
///
/// With no start key the scan begins at the lexically smallest unid;
/// otherwise it begins **at** the start unid (inclusive). A start
/// replica id additionally skips rows of the start unid below that
/// replica, so a resume cursor stays deterministic when one unid exists
/// in several replicas. Rows are ordered `(unid, replica_id)`; when
/// duplicate unids land in one page the later replica wins the map slot.
pub(crate) async fn page(
    conn: &mut SqliteConnection,
    tables: &TableNames,
    start_unid: Option<&str>,
    start_replica_id: Option<&str>,
    batch_size: u32,
) -> Result<BTreeMap<String, DocumentKey>> {
    let limit = i64::from(batch_size);
    let rows: Vec<(String, String)> = match (start_unid, start_replica_id) {
        (None, _) => {
            let sql = format!(
                "SELECT unid, replica_id FROM {} ORDER BY unid, replica_id LIMIT ?",
                tables.index()
            );
            sqlx::query_as(&sql).bind(limit).fetch_all(&mut *conn).await
        }
        (Some(unid), None) => {
            let sql = format!(
                "SELECT unid, replica_id FROM {} WHERE unid >= ?
                 ORDER BY unid, replica_id LIMIT ?",
                tables.index()
            );
            sqlx::query_as(&sql)
                .bind(unid)
                .bind(limit)
                .fetch_all(&mut *conn)
                .await
        }
        (Some(unid), Some(replica_id)) => {
            let sql = format!(
                "SELECT unid, replica_id FROM {} WHERE unid > ? OR (unid = ? AND replica_id >= ?)
                 ORDER BY unid, replica_id LIMIT ?",
                tables.index()
            );
            sqlx::query_as(&sql)
                .bind(unid)
                .bind(unid)
                .bind(replica_id)
                .bind(limit)
                .fetch_all(&mut *conn)
                .await
        }
    }
    .map_err(|e| LedgerError::statement(tables.index(), e))?;

    let mut page = BTreeMap::new();
    for (unid, replica_id) in rows {
        page.insert(unid.clone(), DocumentKey { unid, replica_id });
    }
    Ok(page)
}

pub(crate) async fn count(conn: &mut SqliteConnection, tables: &TableNames) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", tables.index());
    let count: i64 = sqlx::query_scalar(&sql)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| LedgerError::statement(tables.index(), e))?;
    Ok(count as u64)
}

/// Delete every row from all three tables, keeping the schema.
pub(crate) async fn clear_all(conn: &mut SqliteConnection, tables: &TableNames) -> Result<()> {
    for table in [tables.index(), tables.readers(), tables.attachments()] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *conn)
            .await
            .map_err(|e| LedgerError::statement(table, e))?;
    }
    Ok(())
}

/// Drop all three tables. The next constructed manager recreates them.
pub(crate) async fn drop_all(conn: &mut SqliteConnection, tables: &TableNames) -> Result<()> {
    for table in [tables.index(), tables.readers(), tables.attachments()] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *conn)
            .await
            .map_err(|e| LedgerError::statement(table, e))?;
    }
    Ok(())
}
