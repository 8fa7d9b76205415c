//! TOML configuration for the ledger.
//!
//! Table names are derived from a configured prefix (connectors pointing
//! at different source repositories share one store by choosing distinct
//! prefixes). The prefix is the only value that ends up interpolated
//! into SQL text, so it is validated as a bare identifier both at config
//! load and again at manager construction.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub tables: TablesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct TablesConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    "docledger".to_string()
}

impl TablesConfig {
    /// Resolve the three table names this prefix produces.
    pub fn names(&self) -> TableNames {
        TableNames::from_prefix(&self.prefix)
    }
}

/// The resolved names of the three ledger tables.
#[derive(Debug, Clone)]
pub struct TableNames {
    index: String,
    readers: String,
    attachments: String,
}

impl TableNames {
    fn from_prefix(prefix: &str) -> Self {
        Self {
            index: format!("{prefix}_indexed"),
            readers: format!("{prefix}_readers"),
            attachments: format!("{prefix}_attachments"),
        }
    }

    /// Name of the primary index table.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Name of the one-to-many readers table.
    pub fn readers(&self) -> &str {
        &self.readers
    }

    /// Name of the one-to-many attachments table.
    pub fn attachments(&self) -> &str {
        &self.attachments
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| LedgerError::ConfigIo {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Reject configs that would produce unusable (or injectable) SQL.
///
/// Also called from manager construction, since configs can be built
/// programmatically without going through [`load_config`].
pub(crate) fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        return Err(LedgerError::ConfigInvalid(
            "db.max_connections must be >= 1".to_string(),
        ));
    }

    if !is_identifier(&config.tables.prefix) {
        return Err(LedgerError::ConfigInvalid(format!(
            "tables.prefix '{}' must start with a letter or underscore and contain only \
             letters, digits, and underscores",
            config.tables.prefix
        )));
    }

    if config.tables.prefix.len() > 48 {
        return Err(LedgerError::ConfigInvalid(
            "tables.prefix must be at most 48 characters".to_string(),
        ));
    }

    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_prefix(prefix: &str) -> Config {
        let content = format!(
            r#"
[db]
path = "/tmp/ledger.sqlite"

[tables]
prefix = "{prefix}"
"#
        );
        toml::from_str(&content).unwrap()
    }

    #[test]
    fn test_default_prefix_and_pool_size() {
        let config: Config = toml::from_str("[db]\npath = \"/tmp/ledger.sqlite\"\n").unwrap();
        assert_eq!(config.tables.prefix, "docledger");
        assert_eq!(config.db.max_connections, 5);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_table_names_from_prefix() {
        let names = config_with_prefix("crawl").tables.names();
        assert_eq!(names.index(), "crawl_indexed");
        assert_eq!(names.readers(), "crawl_readers");
        assert_eq!(names.attachments(), "crawl_attachments");
    }

    #[test]
    fn test_valid_prefixes_accepted() {
        for prefix in ["crawl", "_ledger", "conn2", "a"] {
            assert!(
                validate(&config_with_prefix(prefix)).is_ok(),
                "prefix {prefix:?} should be accepted"
            );
        }
    }

    #[test]
    fn test_invalid_prefixes_rejected() {
        for prefix in ["1crawl", "bad-prefix", "with space", "drop;table", ""] {
            assert!(
                validate(&config_with_prefix(prefix)).is_err(),
                "prefix {prefix:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let config: Config =
            toml::from_str("[db]\npath = \"/tmp/ledger.sqlite\"\nmax_connections = 0\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.toml");
        std::fs::write(
            &path,
            "[db]\npath = \"data/ledger.sqlite\"\nmax_connections = 3\n\n[tables]\nprefix = \"crawl\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.db.max_connections, 3);
        assert_eq!(config.tables.names().index(), "crawl_indexed");
    }

    #[test]
    fn test_load_config_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigIo { .. }));
    }
}
