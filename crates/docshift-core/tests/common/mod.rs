//! Shared fixtures for the migration integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};

use docshift_core::migration::{MigrationStep, StepMigration, STATE_ID};
use docshift_core::{
    Bookmark, Document, DocumentStore, IndexSpec, IndexWaitConfig, MigrationConfig,
    MigrationError, Page, Selector, SledStore, StoreConfig, StoreError, WriteResult,
};

/// Polling fast enough for tests, generous enough for the index builder.
pub fn fast_config(batch_size: usize) -> MigrationConfig {
    MigrationConfig::default()
        .with_batch_size(batch_size)
        .with_index_wait(IndexWaitConfig {
            attempts: 200,
            base_delay: Duration::from_millis(1),
        })
}

/// A store wrapper that injects failures and counts readiness polls.
pub struct FlakyStore {
    pub inner: SledStore,
    /// Fail the n-th write of migration data (1-based, 0 disables).
    fail_data_write: AtomicUsize,
    data_writes: AtomicUsize,
    never_ready: AtomicBool,
    index_polls: AtomicUsize,
}

impl FlakyStore {
    pub fn open(path: &Path) -> Self {
        Self::wrap(SledStore::open(StoreConfig::new(path)).unwrap())
    }

    pub fn wrap(inner: SledStore) -> Self {
        Self {
            inner,
            fail_data_write: AtomicUsize::new(0),
            data_writes: AtomicUsize::new(0),
            never_ready: AtomicBool::new(false),
            index_polls: AtomicUsize::new(0),
        }
    }

    pub fn fail_data_write(&self, n: usize) {
        self.data_writes.store(0, Ordering::SeqCst);
        self.fail_data_write.store(n, Ordering::SeqCst);
    }

    pub fn set_never_ready(&self, never: bool) {
        self.never_ready.store(never, Ordering::SeqCst);
    }

    pub fn index_polls(&self) -> usize {
        self.index_polls.load(Ordering::SeqCst)
    }

    pub fn insert(&self, docs: Vec<Value>) {
        let docs: Vec<Document> = docs
            .into_iter()
            .map(|v| Document::from_json(v).unwrap())
            .collect();
        let results = self.inner.bulk_write(&docs).unwrap();
        assert!(results.iter().all(WriteResult::is_ok), "{results:?}");
    }

    pub fn doc(&self, id: &str) -> Option<Document> {
        self.inner.get(id).unwrap()
    }
}

impl DocumentStore for FlakyStore {
    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(id)
    }

    fn bulk_write(&self, docs: &[Document]) -> Result<Vec<WriteResult>, StoreError> {
        if !docs.iter().any(|d| d.id == STATE_ID) {
            let n = self.data_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_data_write.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable {
                    reason: "injected failure".to_string(),
                });
            }
        }
        self.inner.bulk_write(docs)
    }

    fn create_index(
        &self,
        name: &str,
        sort_fields: &[String],
        selector: &Selector,
    ) -> Result<(), StoreError> {
        self.inner.create_index(name, sort_fields, selector)
    }

    fn index_ready(&self, name: &str) -> Result<bool, StoreError> {
        self.index_polls.fetch_add(1, Ordering::SeqCst);
        if self.never_ready.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.index_ready(name)
    }

    fn query(
        &self,
        selector: &Selector,
        index: &str,
        limit: usize,
        bookmark: Option<&Bookmark>,
    ) -> Result<Page, StoreError> {
        self.inner.query(selector, index, limit, bookmark)
    }
}

/// Insert `count` documents of type `item` with `n` set to their number.
pub fn seed_items(store: &FlakyStore, count: usize) {
    store.insert(
        (0..count)
            .map(|i| json!({"_id": format!("item-{i:03}"), "type": "item", "n": i}))
            .collect(),
    );
}

/// Turns `item` documents into `done` documents with `n` incremented.
///
/// Every transform call is recorded per document id.
pub struct BumpStep {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MigrationStep for BumpStep {
    fn name(&self) -> &str {
        "bump-items"
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            "test-items",
            &["_id"],
            Selector::doc_type("item"),
        )]
    }

    fn transform(
        &self,
        mut doc: Document,
        _store: &dyn DocumentStore,
    ) -> Result<Vec<Document>, MigrationError> {
        self.calls.lock().push(doc.id.clone());
        let n = doc.body.get("n").and_then(Value::as_u64).unwrap_or_default();
        doc.body.insert("n".into(), json!(n + 1));
        doc.body.insert("type".into(), json!("done"));
        Ok(vec![doc])
    }
}

pub fn bump_migration(id: &str, calls: &Arc<Mutex<Vec<String>>>) -> StepMigration {
    StepMigration::new(
        id,
        vec![Box::new(BumpStep {
            calls: Arc::clone(calls),
        })],
    )
}
