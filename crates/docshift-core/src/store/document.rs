//! Documents, pages and the store contract.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::StoreError;
use super::selector::Selector;

/// Body field holding a document's entity type.
pub const TYPE_FIELD: &str = "type";

const ID_FIELD: &str = "_id";
const REV_FIELD: &str = "_rev";
const DELETED_FIELD: &str = "_deleted";

/// A schemaless JSON document.
///
/// The JSON form merges `_id`, `_rev` and `_deleted` into the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Revision this document was read at. `None` for documents that do not
    /// exist yet.
    pub revision: Option<String>,
    /// Tombstone marker. Writing a deleted document deletes it.
    pub deleted: bool,
    pub body: Map<String, Value>,
}

impl Document {
    /// Create a new, never written document.
    pub fn new(id: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            revision: None,
            deleted: false,
            body,
        }
    }

    /// Create a deletion for the document at `revision`.
    pub fn tombstone(id: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            id: id.into(),
            revision,
            deleted: true,
            body: Map::new(),
        }
    }

    /// Turn this document into a deletion of itself.
    pub fn into_tombstone(self) -> Self {
        Self::tombstone(self.id, self.revision)
    }

    /// The `type` body field.
    pub fn doc_type(&self) -> Option<&str> {
        self.body.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// Look up a dotted field path (`settings.feedback`).
    ///
    /// `_id` and `_rev` resolve to the document metadata.
    pub fn field(&self, path: &str) -> Option<Value> {
        match path {
            ID_FIELD => return Some(Value::String(self.id.clone())),
            REV_FIELD => return self.revision.clone().map(Value::String),
            _ => {}
        }
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.body.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Build a document from a typed entity that carries `_id` and `_rev`.
    pub fn from_entity<T: Serialize>(doc_type: &str, entity: &T) -> Result<Self, StoreError> {
        let value =
            serde_json::to_value(entity).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut doc = Self::from_json(value)?;
        doc.body
            .insert(TYPE_FIELD.to_string(), Value::String(doc_type.to_string()));
        Ok(doc)
    }

    /// Deserialize the document into a typed entity.
    pub fn to_entity<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// Merge metadata into the body and return the JSON object.
    pub fn to_json(&self) -> Value {
        let mut object = self.body.clone();
        object.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        if let Some(rev) = &self.revision {
            object.insert(REV_FIELD.to_string(), Value::String(rev.clone()));
        }
        if self.deleted {
            object.insert(DELETED_FIELD.to_string(), Value::Bool(true));
        }
        Value::Object(object)
    }

    /// Split metadata out of a JSON object.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        let Value::Object(mut body) = value else {
            return Err(StoreError::InvalidDocument(
                "document is not a JSON object".to_string(),
            ));
        };
        let id = match body.remove(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => {
                return Err(StoreError::InvalidDocument(
                    "document has no _id".to_string(),
                ))
            }
        };
        let revision = match body.remove(REV_FIELD) {
            Some(Value::String(rev)) => Some(rev),
            _ => None,
        };
        let deleted = matches!(body.remove(DELETED_FIELD), Some(Value::Bool(true)));
        Ok(Self {
            id,
            revision,
            deleted,
            body,
        })
    }
}

/// Opaque continuation token of a paginated query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bookmark(String);

impl Bookmark {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Bookmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-document outcome of a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub id: String,
    /// New revision on success.
    pub revision: Option<String>,
    /// Failure reason (`conflict`, `not_found`, ...).
    pub error: Option<String>,
}

impl WriteResult {
    pub fn ok(id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: Some(revision.into()),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub docs: Vec<Document>,
    /// Resume point after this page.
    pub bookmark: Option<Bookmark>,
}

/// Definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub sort_fields: Vec<String>,
    pub selector: Selector,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, sort_fields: &[&str], selector: Selector) -> Self {
        Self {
            name: name.into(),
            sort_fields: sort_fields.iter().map(|f| f.to_string()).collect(),
            selector,
        }
    }
}

/// The narrow document database contract the migration engine relies on.
///
/// Calls block the calling thread. Index creation is eventually consistent:
/// after `create_index` returns, `index_ready` may report `false` for a while.
pub trait DocumentStore: Send + Sync {
    /// Point read. Deleted documents read as `None`.
    fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Write documents, returning one result per input in input order.
    ///
    /// A document whose `revision` does not match the stored revision fails
    /// with a conflict; other documents of the batch are unaffected.
    fn bulk_write(&self, docs: &[Document]) -> Result<Vec<WriteResult>, StoreError>;

    /// Create an index if it does not exist yet.
    fn create_index(
        &self,
        name: &str,
        sort_fields: &[String],
        selector: &Selector,
    ) -> Result<(), StoreError>;

    /// Whether the index has caught up with all existing documents.
    fn index_ready(&self, name: &str) -> Result<bool, StoreError>;

    /// Read up to `limit` documents matching `selector` through `index`,
    /// continuing after `bookmark`.
    fn query(
        &self,
        selector: &Selector,
        index: &str,
        limit: usize,
        bookmark: Option<&Bookmark>,
    ) -> Result<Page, StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        (**self).get(id)
    }

    fn bulk_write(&self, docs: &[Document]) -> Result<Vec<WriteResult>, StoreError> {
        (**self).bulk_write(docs)
    }

    fn create_index(
        &self,
        name: &str,
        sort_fields: &[String],
        selector: &Selector,
    ) -> Result<(), StoreError> {
        (**self).create_index(name, sort_fields, selector)
    }

    fn index_ready(&self, name: &str) -> Result<bool, StoreError> {
        (**self).index_ready(name)
    }

    fn query(
        &self,
        selector: &Selector,
        index: &str,
        limit: usize,
        bookmark: Option<&Bookmark>,
    ) -> Result<Page, StoreError> {
        (**self).query(selector, index, limit, bookmark)
    }
}
