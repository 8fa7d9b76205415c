//! Schema setup and self-healing migration.
//!
//! Runs once per manager construction: create whichever of the three
//! tables are missing, then verify the declared capacity of the
//! attachment-id column and widen it in place when a previous release
//! created it narrower than [`ATTACHMENT_ID_CAPACITY`]. All DDL is
//! idempotent (check-then-alter, never unconditional), so concurrent
//! managers starting against the same store converge on the same schema.
//!
//! SQLite has no `ALTER TABLE ... ALTER COLUMN`, so widening is the
//! canonical rebuild: inside one transaction, create the wide table
//! under a scratch name, copy every row, drop the old table, rename.
//! Existing rows survive; the column is never narrowed.

use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::config::TableNames;
use crate::error::{LedgerError, Result};

/// Required capacity of the attachment-id column. Attachment identifiers
/// from the source repository can reach 40 characters; stores created by
/// older releases declared 32 and are widened on startup.
pub const ATTACHMENT_ID_CAPACITY: usize = 40;

/// A non-fatal schema problem encountered during setup.
///
/// Construction proceeds so unaffected tables stay usable; the caller
/// inspects these to decide whether degraded capability (for example
/// attachment ids truncated by a store that enforces column width) is
/// acceptable.
#[derive(Debug, Clone)]
pub struct SchemaIssue {
    pub table: String,
    pub column: String,
    pub message: String,
}

fn index_table_ddl(name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {name} (
            unid VARCHAR(32) NOT NULL,
            replica_id VARCHAR(16) NOT NULL,
            state VARCHAR(16) NOT NULL,
            last_modified INTEGER NOT NULL,
            PRIMARY KEY (unid, replica_id)
        )"
    )
}

fn readers_table_ddl(name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {name} (
            unid VARCHAR(32) NOT NULL,
            replica_id VARCHAR(16) NOT NULL,
            reader_name TEXT NOT NULL
        )"
    )
}

fn attachments_table_ddl(name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {name} (
            unid VARCHAR(32) NOT NULL,
            replica_id VARCHAR(16) NOT NULL,
            attachment_id VARCHAR({ATTACHMENT_ID_CAPACITY}) NOT NULL
        )"
    )
}

/// Create missing tables, widen the attachment-id column if needed, and
/// create secondary indexes.
///
/// Every table creation is attempted even if an earlier one fails, so a
/// single bad table does not take down the rest of the ledger; the first
/// creation failure is then returned. A failed widen is reported as a
/// [`SchemaIssue`] instead of an error.
pub async fn ensure_schema(pool: &SqlitePool, tables: &TableNames) -> Result<Vec<SchemaIssue>> {
    let mut conn = pool.acquire().await.map_err(LedgerError::Connection)?;

    let ddl = [
        (tables.index(), index_table_ddl(tables.index())),
        (tables.readers(), readers_table_ddl(tables.readers())),
        (tables.attachments(), attachments_table_ddl(tables.attachments())),
    ];

    let mut first_err: Option<LedgerError> = None;
    for (table, sql) in &ddl {
        if let Err(e) = sqlx::query(sql.as_str()).execute(&mut *conn).await {
            warn!(table = *table, error = %e, "table creation failed");
            if first_err.is_none() {
                first_err = Some(LedgerError::migration(table, e));
            }
        }
    }
    if let Some(err) = first_err {
        return Err(err);
    }

    let mut issues = Vec::new();
    match widen_attachment_id(&mut conn, tables).await {
        Ok(Some(old_capacity)) => {
            info!(
                table = tables.attachments(),
                old_capacity,
                new_capacity = ATTACHMENT_ID_CAPACITY,
                "widened attachment_id column"
            );
        }
        Ok(None) => {}
        Err(e) => {
            warn!(table = tables.attachments(), error = %e, "attachment_id widen failed");
            issues.push(SchemaIssue {
                table: tables.attachments().to_string(),
                column: "attachment_id".to_string(),
                message: format!(
                    "could not widen to VARCHAR({ATTACHMENT_ID_CAPACITY}): {e}"
                ),
            });
        }
    }

    // Secondary indexes last: the widen rebuild drops any index on the
    // old attachments table along with it.
    for (table, index_name) in [
        (tables.readers(), format!("idx_{}_key", tables.readers())),
        (tables.attachments(), format!("idx_{}_key", tables.attachments())),
    ] {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {index_name} ON {table} (unid, replica_id)"
        ))
        .execute(&mut *conn)
        .await
        .map_err(|e| LedgerError::migration(table, e))?;
    }

    Ok(issues)
}

/// Widen `attachment_id` if its live declared capacity is below the
/// required constant. Returns the old capacity when a rebuild happened.
async fn widen_attachment_id(
    conn: &mut SqliteConnection,
    tables: &TableNames,
) -> sqlx::Result<Option<usize>> {
    let table = tables.attachments();

    let capacity = match declared_capacity(conn, table, "attachment_id").await? {
        // No parseable declared width (e.g. a hand-created TEXT column):
        // nothing to compare against, leave it alone.
        None => return Ok(None),
        Some(capacity) => capacity,
    };
    if capacity >= ATTACHMENT_ID_CAPACITY {
        return Ok(None);
    }

    let scratch = format!("{table}_widen");
    let mut tx = conn.begin().await?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {scratch}"))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&attachments_table_ddl(&scratch))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "INSERT INTO {scratch} (unid, replica_id, attachment_id)
         SELECT unid, replica_id, attachment_id FROM {table}"
    ))
    .execute(&mut *tx)
    .await?;
    sqlx::query(&format!("DROP TABLE {table}"))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("ALTER TABLE {scratch} RENAME TO {table}"))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Some(capacity))
}

/// Read a column's declared `VARCHAR(n)` capacity from the live schema.
/// Returns `None` if the table or column is missing, or the declared
/// type carries no width.
async fn declared_capacity(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> sqlx::Result<Option<usize>> {
    let columns: Vec<(i32, String, String, i32, Option<String>, i32)> =
        sqlx::query_as(&format!("PRAGMA table_info({table})"))
            .fetch_all(&mut *conn)
            .await?;

    Ok(columns
        .iter()
        .find(|(_, name, _, _, _, _)| name.eq_ignore_ascii_case(column))
        .and_then(|(_, _, decl, _, _, _)| parse_varchar_capacity(decl)))
}

fn parse_varchar_capacity(decl: &str) -> Option<usize> {
    let decl = decl.trim().to_ascii_uppercase();
    decl.strip_prefix("VARCHAR(")?
        .strip_suffix(')')?
        .trim()
        .parse()
        .ok()
}
