//! Store-backed resolution of related entities.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use docshift_model::{current, legacy};

use crate::store::{Document, DocumentStore, IndexSpec, StoreError};
use crate::translate::{to_current, to_legacy, RelatedLookup, TranslateError};

/// Documents fetched per page while loading a directory.
const LOAD_PAGE_SIZE: usize = 500;

/// Lazily loaded map from one field's value to the documents of an index.
///
/// Loaded on first use and only refreshed after [`reset`](Self::reset), so it
/// only suits lookups of documents that the running step does not create.
pub struct Directory {
    index: IndexSpec,
    key_field: &'static str,
    entries: Mutex<Option<HashMap<String, Document>>>,
}

impl Directory {
    pub fn new(index: IndexSpec, key_field: &'static str) -> Self {
        Self {
            index,
            key_field,
            entries: Mutex::new(None),
        }
    }

    pub fn index(&self) -> &IndexSpec {
        &self.index
    }

    /// The first document whose key field equals `key`.
    pub fn get(&self, store: &dyn DocumentStore, key: &str) -> Result<Option<Document>, StoreError> {
        let mut entries = self.entries.lock();
        Ok(self.loaded(&mut entries, store)?.get(key).cloned())
    }

    /// Like [`get`](Self::get), but later lookups of `key` find nothing until
    /// the next [`reset`](Self::reset).
    pub fn take(&self, store: &dyn DocumentStore, key: &str) -> Result<Option<Document>, StoreError> {
        let mut entries = self.entries.lock();
        Ok(self.loaded(&mut entries, store)?.remove(key))
    }

    /// Drop the loaded entries so the next lookup reads the index again.
    pub fn reset(&self) {
        *self.entries.lock() = None;
    }

    fn loaded<'m>(
        &self,
        entries: &'m mut Option<HashMap<String, Document>>,
        store: &dyn DocumentStore,
    ) -> Result<&'m mut HashMap<String, Document>, StoreError> {
        if entries.is_none() {
            *entries = Some(self.load(store)?);
        }
        Ok(entries.get_or_insert_with(HashMap::new))
    }

    fn load(&self, store: &dyn DocumentStore) -> Result<HashMap<String, Document>, StoreError> {
        let mut map = HashMap::new();
        let mut bookmark = None;
        loop {
            let page = store.query(
                &self.index.selector,
                &self.index.name,
                LOAD_PAGE_SIZE,
                bookmark.as_ref(),
            )?;
            if page.docs.is_empty() {
                break;
            }
            for doc in page.docs {
                if let Some(Value::String(key)) = doc.field(self.key_field) {
                    map.entry(key).or_insert(doc);
                }
            }
            bookmark = page.bookmark;
        }
        tracing::debug!(index = %self.index.name, entries = map.len(), "directory loaded");
        Ok(map)
    }
}

fn lookup_error(err: StoreError) -> TranslateError {
    TranslateError::Lookup(err.to_string())
}

/// [`RelatedLookup`] over a [`DocumentStore`].
///
/// Contents are found in either shape. Profiles by login come from a
/// directory over the current profiles.
pub struct StoreLookup<'a> {
    store: &'a dyn DocumentStore,
    profiles: &'a Directory,
}

impl<'a> StoreLookup<'a> {
    pub fn new(store: &'a dyn DocumentStore, profiles: &'a Directory) -> Self {
        Self { store, profiles }
    }

    fn typed<T: serde::de::DeserializeOwned>(
        &self,
        id: &str,
        doc_type: &str,
    ) -> Result<Option<T>, TranslateError> {
        match self.store.get(id).map_err(lookup_error)? {
            Some(doc) if doc.doc_type() == Some(doc_type) => {
                doc.to_entity().map(Some).map_err(lookup_error)
            }
            _ => Ok(None),
        }
    }
}

impl RelatedLookup for StoreLookup<'_> {
    fn legacy_content(&self, id: &str) -> Result<Option<legacy::Content>, TranslateError> {
        if let Some(content) = self.typed::<legacy::Content>(id, legacy::CONTENT_TYPE)? {
            return Ok(Some(content));
        }
        Ok(self
            .typed::<current::Content>(id, current::CONTENT_TYPE)?
            .map(|content| to_legacy::content(&content)))
    }

    fn current_content(&self, id: &str) -> Result<Option<current::Content>, TranslateError> {
        if let Some(content) = self.typed::<current::Content>(id, current::CONTENT_TYPE)? {
            return Ok(Some(content));
        }
        self.typed::<legacy::Content>(id, legacy::CONTENT_TYPE)?
            .map(|content| to_current::content(&content))
            .transpose()
    }

    fn profile_by_login(
        &self,
        login: &str,
    ) -> Result<Option<current::UserProfile>, TranslateError> {
        match self.profiles.get(self.store, login).map_err(lookup_error)? {
            Some(doc) => doc.to_entity().map(Some).map_err(lookup_error),
            None => Ok(None),
        }
    }

    fn profile(&self, id: &str) -> Result<Option<current::UserProfile>, TranslateError> {
        self.typed(id, current::USER_PROFILE_TYPE)
    }
}
