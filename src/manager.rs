//! The document index manager facade.
//!
//! [`DocumentIndexManager`] composes the index, readers, and attachments
//! stores under one transactional boundary per operation. It is a
//! passive, `Send + Sync` handle over the connection pool: any number of
//! crawl threads may call it concurrently, operations on different
//! document keys interleave freely, and same-key races resolve at the
//! store (last commit wins). It schedules nothing in the background.
//!
//! Connection discipline: methods that take a `&mut SqliteConnection`
//! run on the caller's leased connection (the crawl loop typically holds
//! one across a batch); the remaining methods lease one from the pool
//! for the duration of the call. Leases are RAII; dropping a
//! [`PoolConnection`] returns it to the pool on every exit path.

use std::collections::{BTreeMap, HashSet};

use sqlx::pool::PoolConnection;
use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::config::{self, Config, TableNames};
use crate::db;
use crate::error::{LedgerError, Result};
use crate::models::{normalize_unid, DocumentKey, IndexedDocument};
use crate::schema::{self, SchemaIssue};
use crate::{attachments, index_store, readers};

pub struct DocumentIndexManager {
    pool: SqlitePool,
    tables: TableNames,
    schema_issues: Vec<SchemaIssue>,
}

impl DocumentIndexManager {
    /// Build a manager over an existing pool, running schema setup and
    /// migration. Non-fatal schema problems are available afterwards via
    /// [`schema_issues`](Self::schema_issues).
    pub async fn new(pool: SqlitePool, config: &Config) -> Result<Self> {
        config::validate(config)?;
        let tables = config.tables.names();
        let schema_issues = schema::ensure_schema(&pool, &tables).await?;
        debug!(
            index = tables.index(),
            readers = tables.readers(),
            attachments = tables.attachments(),
            "document index manager ready"
        );
        Ok(Self {
            pool,
            tables,
            schema_issues,
        })
    }

    /// Connect to the configured database and build a manager over it.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Self::new(pool, config).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The resolved names of the three ledger tables.
    pub fn table_names(&self) -> &TableNames {
        &self.tables
    }

    /// Non-fatal schema problems from construction (e.g. a failed column
    /// widen). Empty when setup went clean.
    pub fn schema_issues(&self) -> &[SchemaIssue] {
        &self.schema_issues
    }

    /// Lease a connection from the pool. Dropping the lease returns it.
    ///
    /// Blocks (asynchronously) until a connection frees up, or fails
    /// with [`LedgerError::Connection`] on pool timeout/exhaustion.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(LedgerError::Connection)
    }

    /// Whether the document key is present in the index. No side effects.
    pub async fn has_indexed_document(
        &self,
        conn: &mut SqliteConnection,
        unid: &str,
        replica_id: &str,
    ) -> Result<bool> {
        let unid = normalize_unid(unid);
        index_store::has_document(conn, &self.tables, &unid, replica_id).await
    }

    /// Upsert an indexed-document record.
    ///
    /// Inserts the index row if the key is absent, otherwise refreshes
    /// its state and bookkeeping in place; either way the key's reader
    /// and attachment sets are replaced whole from the supplied record.
    /// All of it commits or rolls back as one transaction, so there is no
    /// observable "readers cleared but index row stale" state.
    ///
    /// Calling twice with the same record is a no-op for the observable
    /// state: no duplicate rows accumulate.
    pub async fn add_indexed_document(
        &self,
        conn: &mut SqliteConnection,
        doc: &IndexedDocument,
    ) -> Result<()> {
        let unid = normalize_unid(&doc.unid);
        let mut tx = conn.begin().await.map_err(LedgerError::Connection)?;
        index_store::upsert_row(
            &mut tx,
            &self.tables,
            &unid,
            &doc.replica_id,
            doc.state,
            doc.last_modified,
        )
        .await?;
        readers::replace_all(&mut tx, &self.tables, &unid, &doc.replica_id, &doc.readers).await?;
        attachments::replace_all(
            &mut tx,
            &self.tables,
            &unid,
            &doc.replica_id,
            &doc.attachment_ids,
        )
        .await?;
        tx.commit().await.map_err(LedgerError::Connection)?;
        Ok(())
    }

    /// Delete a document's index row and cascade to its reader and
    /// attachment rows, in one transaction. Returns whether an index row
    /// existed; `false` is a value ("nothing to do"), not a failure.
    pub async fn delete_document_with_conn(
        &self,
        conn: &mut SqliteConnection,
        unid: &str,
        replica_id: &str,
    ) -> Result<bool> {
        let unid = normalize_unid(unid);
        let mut tx = conn.begin().await.map_err(LedgerError::Connection)?;
        let existed = index_store::delete_row(&mut tx, &self.tables, &unid, replica_id).await?;
        readers::delete_all(&mut tx, &self.tables, &unid, replica_id).await?;
        attachments::delete_all(&mut tx, &self.tables, &unid, replica_id).await?;
        tx.commit().await.map_err(LedgerError::Connection)?;
        if existed {
            debug!(unid = %unid, replica_id, "deleted document from index");
        }
        Ok(existed)
    }

    /// [`delete_document_with_conn`](Self::delete_document_with_conn) on
    /// an internally leased connection.
    pub async fn delete_document(&self, unid: &str, replica_id: &str) -> Result<bool> {
        let mut conn = self.acquire().await?;
        self.delete_document_with_conn(&mut conn, unid, replica_id)
            .await
    }

    /// One page of the index, at most `batch_size` entries in ascending
    /// lexical `unid` order (the map's iteration order).
    ///
    /// Passing `None` for `start_unid` starts at the smallest key.
    /// Otherwise the page starts **at** `start_unid` inclusive: a caller
    /// resuming with the last unid it saw gets that row again, by design:
    /// the cursor survives interruption without bookkeeping, and the
    /// caller skips the duplicate if it needs exact-once enumeration.
    /// `start_replica_id` tightens the cursor when one unid exists in
    /// several replicas: rows of the start unid below that replica are
    /// skipped.
    ///
    /// Returns an empty map, never an error, when nothing matches.
    /// Concurrent writers can cause a row to be skipped or repeated
    /// between successive pages; reconciliation passes tolerate both.
    pub async fn get_indexed_documents(
        &self,
        start_unid: Option<&str>,
        start_replica_id: Option<&str>,
        batch_size: u32,
    ) -> Result<BTreeMap<String, DocumentKey>> {
        let mut conn = self.acquire().await?;
        let start = start_unid.map(normalize_unid);
        index_store::page(
            &mut conn,
            &self.tables,
            start.as_deref(),
            start_replica_id,
            batch_size,
        )
        .await
    }

    /// The recorded reader-name set for a key. Empty means "no ACL
    /// restriction recorded"; check
    /// [`has_indexed_document`](Self::has_indexed_document) to
    /// distinguish that from "not indexed".
    pub async fn get_document_readers(
        &self,
        unid: &str,
        replica_id: &str,
    ) -> Result<HashSet<String>> {
        let mut conn = self.acquire().await?;
        let unid = normalize_unid(unid);
        readers::fetch_all(&mut conn, &self.tables, &unid, replica_id).await
    }

    /// The recorded attachment identifiers for a key; empty if none.
    pub async fn get_attachment_ids(
        &self,
        conn: &mut SqliteConnection,
        unid: &str,
        replica_id: &str,
    ) -> Result<HashSet<String>> {
        let unid = normalize_unid(unid);
        attachments::fetch_all(conn, &self.tables, &unid, replica_id).await
    }

    /// Total number of indexed-document rows.
    pub async fn count_indexed_documents(&self) -> Result<u64> {
        let mut conn = self.acquire().await?;
        index_store::count(&mut conn, &self.tables).await
    }

    /// Delete every row from all three tables, keeping the schema.
    pub async fn clear_tables(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        index_store::clear_all(&mut conn, &self.tables).await?;
        info!(index = self.tables.index(), "cleared ledger tables");
        Ok(())
    }

    /// Drop all three tables. This manager is unusable for document
    /// operations afterwards; constructing the next manager recreates
    /// the schema.
    pub async fn drop_tables(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        index_store::drop_all(&mut conn, &self.tables).await?;
        info!(index = self.tables.index(), "dropped ledger tables");
        Ok(())
    }
}
