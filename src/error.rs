//! Error kinds surfaced to the crawl loop.
//!
//! Absence is never an error here: existence checks return `bool`,
//! reader/attachment fetches return empty sets, pagination returns an
//! empty map. The kinds below cover the failures a caller actually has
//! to decide something about: retry (connection), log and investigate
//! (statement), or proceed with degraded capability (migration).

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A pooled connection could not be obtained, or the store went away
    /// mid-operation. The ledger never retries internally; retry policy
    /// belongs to the caller.
    #[error("could not obtain a database connection")]
    Connection(#[source] sqlx::Error),

    /// A statement was rejected by the store. Carries the table name so
    /// the caller can log which part of the ledger failed.
    #[error("statement against table {table} failed")]
    Statement {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// A create/alter statement failed during schema setup.
    #[error("schema migration failed for table {table}")]
    SchemaMigration {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to read config file {path}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to prepare database path {path}")]
    DatabasePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LedgerError {
    pub(crate) fn statement(table: &str, source: sqlx::Error) -> Self {
        LedgerError::Statement {
            table: table.to_string(),
            source,
        }
    }

    pub(crate) fn migration(table: &str, source: sqlx::Error) -> Self {
        LedgerError::SchemaMigration {
            table: table.to_string(),
            source,
        }
    }
}
