//! Sled-backed document store.

use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use sled::{Db, Tree};

use super::config::StoreConfig;
use super::document::{Bookmark, Document, DocumentStore, IndexSpec, Page, WriteResult};
use super::error::StoreError;
use super::index_builder::IndexBuilder;
use super::key::{index_entry_key, index_prefix};
use super::record::DocRecord;
use super::selector::Selector;

/// Tree name for documents (id -> record).
const DOCS_TREE: &str = "docs";

/// Tree name for index definitions (name -> JSON spec).
const INDEX_DEFS_TREE: &str = "index:defs";

/// Tree name for index entries (entry key -> document id).
const INDEX_ENTRIES_TREE: &str = "index:entries";

/// Tree name for readiness markers of fully built indexes.
const INDEX_READY_TREE: &str = "index:ready";

const CONFLICT: &str = "conflict";
const NOT_FOUND: &str = "not_found";

/// State shared between the store handle and the index builder.
pub(crate) struct StoreInner {
    db: Db,
    docs: Tree,
    index_defs: Tree,
    index_entries: Tree,
    index_ready: Tree,
    /// Cached index definitions.
    defs: DashMap<String, IndexSpec>,
    /// Serializes document writes with index builder batches.
    write_lock: Mutex<()>,
    /// Indexes waiting for the builder.
    pending: Mutex<VecDeque<String>>,
}

/// A [`DocumentStore`] on top of sled.
pub struct SledStore {
    inner: Arc<StoreInner>,
    builder: IndexBuilder,
}

impl SledStore {
    /// Open or create a store with the given configuration.
    ///
    /// Indexes whose build was interrupted are queued for building again.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let db = config.to_sled_config().open()?;
        let docs = db.open_tree(DOCS_TREE)?;
        let index_defs = db.open_tree(INDEX_DEFS_TREE)?;
        let index_entries = db.open_tree(INDEX_ENTRIES_TREE)?;
        let index_ready = db.open_tree(INDEX_READY_TREE)?;

        let defs = DashMap::new();
        let mut pending = VecDeque::new();
        for item in index_defs.iter() {
            let (name, bytes) = item?;
            let spec: IndexSpec = serde_json::from_slice(&bytes)?;
            if !index_ready.contains_key(&name)? {
                pending.push_back(spec.name.clone());
            }
            defs.insert(spec.name.clone(), spec);
        }
        if !pending.is_empty() {
            tracing::info!(indexes = pending.len(), "resuming interrupted index builds");
        }

        let inner = Arc::new(StoreInner {
            db,
            docs,
            index_defs,
            index_entries,
            index_ready,
            defs,
            write_lock: Mutex::new(()),
            pending: Mutex::new(pending),
        });
        let builder = IndexBuilder::start(
            Arc::clone(&inner),
            config.builder_poll_interval,
            config.builder_batch_size,
        );

        Ok(Self { inner, builder })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.inner.db.was_recovered()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.inner.db.flush()?;
        Ok(())
    }

    /// Names of all defined indexes.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.defs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of stored documents, tombstones excluded.
    pub fn document_count(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in self.inner.docs.iter() {
            let (_, bytes) = item?;
            if !DocRecord::from_bytes(&bytes)?.deleted {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Whether the background index builder is alive.
    pub fn builder_running(&self) -> bool {
        self.builder.is_running()
    }
}

impl DocumentStore for SledStore {
    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        match self.inner.load(id)? {
            Some(record) if !record.deleted => Ok(Some(record.to_document(id)?)),
            _ => Ok(None),
        }
    }

    fn bulk_write(&self, docs: &[Document]) -> Result<Vec<WriteResult>, StoreError> {
        let _guard = self.inner.write_lock.lock();
        docs.iter().map(|doc| self.inner.write_one(doc)).collect()
    }

    fn create_index(
        &self,
        name: &str,
        sort_fields: &[String],
        selector: &Selector,
    ) -> Result<(), StoreError> {
        if self.inner.defs.contains_key(name) {
            return Ok(());
        }

        let spec = IndexSpec {
            name: name.to_string(),
            sort_fields: sort_fields.to_vec(),
            selector: selector.clone(),
        };
        let bytes =
            serde_json::to_vec(&spec).map_err(|e| StoreError::Serialization(e.to_string()))?;
        {
            // Defined under the write lock so no concurrent write misses it.
            let _guard = self.inner.write_lock.lock();
            self.inner.index_defs.insert(name.as_bytes(), bytes)?;
            self.inner.defs.insert(name.to_string(), spec);
        }
        self.inner.requeue(name);
        tracing::info!(index = %name, "index created");
        Ok(())
    }

    fn index_ready(&self, name: &str) -> Result<bool, StoreError> {
        if !self.inner.defs.contains_key(name) {
            return Err(StoreError::UnknownIndex {
                name: name.to_string(),
            });
        }
        Ok(self.inner.index_ready.contains_key(name.as_bytes())?)
    }

    fn query(
        &self,
        selector: &Selector,
        index: &str,
        limit: usize,
        bookmark: Option<&Bookmark>,
    ) -> Result<Page, StoreError> {
        let spec = self
            .inner
            .defs
            .get(index)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::UnknownIndex {
                name: index.to_string(),
            })?;
        if !self.index_ready(index)? {
            return Err(StoreError::IndexBuilding {
                name: index.to_string(),
            });
        }

        let prefix = index_prefix(index);
        let start = match bookmark {
            Some(bookmark) => {
                let key = hex::decode(bookmark.as_str())
                    .ok()
                    .filter(|key| key.starts_with(&prefix))
                    .ok_or_else(|| StoreError::InvalidBookmark {
                        bookmark: bookmark.to_string(),
                    })?;
                Bound::Excluded(key)
            }
            None => Bound::Included(prefix.clone()),
        };

        let limit = limit.max(1);
        let mut docs = Vec::new();
        let mut last_key: Option<Vec<u8>> = None;

        for item in self.inner.index_entries.range((start, Bound::Unbounded)) {
            let (key, id) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            last_key = Some(key.to_vec());

            let id = String::from_utf8_lossy(&id).into_owned();
            let Some(doc) = self.get(&id)? else {
                continue;
            };
            // Entries may lag behind concurrent writes; trust only live data.
            if StoreInner::entry_key(&spec, &doc).as_deref() != Some(&key[..])
                || !selector.matches(&doc)
            {
                continue;
            }

            docs.push(doc);
            if docs.len() == limit {
                break;
            }
        }

        let bookmark = match last_key {
            Some(key) => Some(Bookmark::new(hex::encode(key))),
            None => bookmark.cloned(),
        };
        Ok(Page { docs, bookmark })
    }
}

impl Drop for SledStore {
    fn drop(&mut self) {
        self.builder.stop();
    }
}

impl StoreInner {
    fn load(&self, id: &str) -> Result<Option<DocRecord>, StoreError> {
        match self.docs.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(DocRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Entry key of `doc` in the index, if the index covers it.
    fn entry_key(spec: &IndexSpec, doc: &Document) -> Option<Vec<u8>> {
        if !spec.selector.matches(doc) {
            return None;
        }
        let sort_values: Vec<_> = spec.sort_fields.iter().map(|f| doc.field(f)).collect();
        Some(index_entry_key(&spec.name, &sort_values, &doc.id))
    }

    /// Write one document. Must be called with the write lock held.
    fn write_one(&self, doc: &Document) -> Result<WriteResult, StoreError> {
        let existing = self.load(&doc.id)?;
        let stored_rev = existing.as_ref().map(|r| r.revision.as_str());
        let live = existing.as_ref().filter(|r| !r.deleted);

        let accepted = match live {
            Some(record) => doc.revision.as_deref() == Some(record.revision.as_str()),
            // Absent or deleted documents may be (re)created without a revision.
            None => doc.revision.is_none() || doc.revision.as_deref() == stored_rev,
        };
        if !accepted {
            return Ok(WriteResult::failed(&doc.id, CONFLICT));
        }
        if doc.deleted && live.is_none() {
            return Ok(WriteResult::failed(&doc.id, NOT_FOUND));
        }

        let previous = match live {
            Some(record) => Some(record.to_document(&doc.id)?),
            None => None,
        };
        let record = DocRecord::for_document(doc, stored_rev)?;
        self.docs.insert(doc.id.as_bytes(), record.to_bytes()?)?;

        for entry in self.defs.iter() {
            let spec = entry.value();
            let old_key = previous.as_ref().and_then(|p| Self::entry_key(spec, p));
            let new_key = Self::entry_key(spec, doc);
            if old_key == new_key {
                continue;
            }
            if let Some(key) = old_key {
                self.index_entries.remove(key)?;
            }
            if let Some(key) = new_key {
                self.index_entries.insert(key, doc.id.as_bytes())?;
            }
        }

        Ok(WriteResult::ok(&doc.id, record.revision))
    }

    pub(crate) fn next_pending(&self) -> Option<String> {
        self.pending.lock().pop_front()
    }

    pub(crate) fn requeue(&self, name: &str) {
        let mut pending = self.pending.lock();
        if !pending.iter().any(|n| n == name) {
            pending.push_back(name.to_string());
        }
    }

    /// Index up to `batch_size` documents after `cursor`.
    ///
    /// Returns the last document key visited and how many entries were
    /// written, or `None` once the document tree is exhausted.
    pub(crate) fn index_batch(
        &self,
        name: &str,
        cursor: Option<&[u8]>,
        batch_size: usize,
    ) -> Result<Option<(Vec<u8>, usize)>, StoreError> {
        let Some(spec) = self.defs.get(name).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let start = match cursor {
            Some(key) => Bound::Excluded(key.to_vec()),
            None => Bound::Unbounded,
        };

        let _guard = self.write_lock.lock();
        let mut last = None;
        let mut written = 0;
        for item in self
            .docs
            .range::<Vec<u8>, _>((start, Bound::Unbounded))
            .take(batch_size)
        {
            let (key, bytes) = item?;
            let id = String::from_utf8_lossy(&key).into_owned();
            let record = DocRecord::from_bytes(&bytes)?;
            if !record.deleted {
                let doc = record.to_document(&id)?;
                if let Some(entry) = Self::entry_key(&spec, &doc) {
                    self.index_entries.insert(entry, &key[..])?;
                    written += 1;
                }
            }
            last = Some(key.to_vec());
        }

        Ok(last.map(|key| (key, written)))
    }

    pub(crate) fn mark_ready(&self, name: &str) -> Result<(), StoreError> {
        self.index_ready.insert(name.as_bytes(), vec![1u8])?;
        Ok(())
    }
}
