//! Core data models of the ledger.
//!
//! [`IndexedDocument`] is the narrow transfer structure the groupware
//! binding builds once at the boundary: exactly the fields this crate
//! persists, nothing of the binding's dynamically-typed item collection
//! leaks through.

use chrono::{DateTime, Utc};

/// The `(unid, replica_id)` pair uniquely identifying a source document.
///
/// A UNID is only unique within its replica; two replicas of different
/// source databases can legitimately carry the same UNID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKey {
    pub unid: String,
    pub replica_id: String,
}

impl DocumentKey {
    /// Build a key, case-normalizing the UNID.
    pub fn new(unid: &str, replica_id: &str) -> Self {
        Self {
            unid: normalize_unid(unid),
            replica_id: replica_id.to_string(),
        }
    }
}

/// Where a document sits in the crawl pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Content fetched from the source, not yet submitted to the index.
    Fetched,
    /// Submitted to the search index.
    Indexed,
    /// Marked for removal from the search index.
    Deleted,
}

impl IndexState {
    /// The tag persisted in the `state` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Fetched => "fetched",
            IndexState::Indexed => "indexed",
            IndexState::Deleted => "deleted",
        }
    }

    /// Parse a persisted tag. Returns `None` for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "fetched" => Some(IndexState::Fetched),
            "indexed" => Some(IndexState::Indexed),
            "deleted" => Some(IndexState::Deleted),
            _ => None,
        }
    }
}

/// One indexed document, as recorded in the ledger.
///
/// The `readers` list carries document readers and author readers merged
/// by the binding; an empty list means "no ACL restriction recorded",
/// which is a valid state distinct from "not indexed".
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub unid: String,
    pub replica_id: String,
    pub state: IndexState,
    pub last_modified: DateTime<Utc>,
    pub readers: Vec<String>,
    pub attachment_ids: Vec<String>,
}

impl IndexedDocument {
    /// Build a record with empty reader and attachment sets, normalizing
    /// the UNID. Callers fill `readers`/`attachment_ids` from the source
    /// document's fields.
    pub fn new(
        unid: &str,
        replica_id: &str,
        state: IndexState,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            unid: normalize_unid(unid),
            replica_id: replica_id.to_string(),
            state,
            last_modified,
            readers: Vec::new(),
            attachment_ids: Vec::new(),
        }
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(&self.unid, &self.replica_id)
    }
}

/// UNIDs are treated case-insensitively by the source system; the ledger
/// stores and queries them uppercased so lookups match regardless of how
/// the binding happened to render them.
pub fn normalize_unid(unid: &str) -> String {
    unid.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tag_round_trip() {
        for state in [IndexState::Fetched, IndexState::Indexed, IndexState::Deleted] {
            assert_eq!(IndexState::from_tag(state.as_str()), Some(state));
        }
        assert_eq!(IndexState::from_tag("archived"), None);
    }

    #[test]
    fn test_unid_normalization() {
        assert_eq!(
            normalize_unid(" f4b82fbb75e942a6802567ac0016e071"),
            "F4B82FBB75E942A6802567AC0016E071"
        );
        let key = DocumentKey::new("abc123", "85257608004F5587");
        assert_eq!(key.unid, "ABC123");
        assert_eq!(key.replica_id, "85257608004F5587");
    }

    #[test]
    fn test_new_document_has_empty_sets() {
        let doc = IndexedDocument::new(
            "f4b82fbb75e942a6802567ac0016e071",
            "85257608004F5587",
            IndexState::Indexed,
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );
        assert!(doc.readers.is_empty());
        assert!(doc.attachment_ids.is_empty());
        assert_eq!(doc.key().unid, "F4B82FBB75E942A6802567AC0016E071");
    }
}
