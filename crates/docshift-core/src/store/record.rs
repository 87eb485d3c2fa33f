//! Stored document envelope.

use rkyv::{Archive, Deserialize, Serialize};

use super::document::Document;
use super::error::StoreError;

/// A stored document with metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct DocRecord {
    /// JSON-encoded document body (without `_id`/`_rev`).
    pub body: Vec<u8>,

    /// Revision written with this record.
    pub revision: String,

    /// Whether this record is a tombstone.
    pub deleted: bool,

    /// Write timestamp in microseconds since Unix epoch.
    pub updated_at: u64,
}

impl DocRecord {
    /// Encode a document, assigning it the revision that follows `previous`.
    pub fn for_document(doc: &Document, previous: Option<&str>) -> Result<Self, StoreError> {
        let body = if doc.deleted {
            Vec::new()
        } else {
            serde_json::to_vec(&doc.body).map_err(|e| StoreError::Serialization(e.to_string()))?
        };
        let revision = next_revision(previous, &body, doc.deleted);
        Ok(Self {
            body,
            revision,
            deleted: doc.deleted,
            updated_at: super::key::current_timestamp(),
        })
    }

    /// Decode into a document carrying this record's revision.
    pub fn to_document(&self, id: &str) -> Result<Document, StoreError> {
        if self.deleted {
            return Ok(Document::tombstone(id, Some(self.revision.clone())));
        }
        let body = serde_json::from_slice(&self.body)?;
        Ok(Document {
            id: id.to_string(),
            revision: Some(self.revision.clone()),
            deleted: false,
            body,
        })
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

/// Revisions are `<generation>-<content hash prefix>`.
fn next_revision(previous: Option<&str>, body: &[u8], deleted: bool) -> String {
    let generation = previous
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;

    let mut hasher = blake3::Hasher::new();
    hasher.update(previous.unwrap_or_default().as_bytes());
    hasher.update(&[deleted as u8]);
    hasher.update(body);
    let hash = hasher.finalize();
    format!("{}-{}", generation, hex::encode(&hash.as_bytes()[..8]))
}
