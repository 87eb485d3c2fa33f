//! Migrations, steps and the context a step runs in.

use super::batch;
use super::error::MigrationError;
use super::executor::MigrationConfig;
use super::shutdown::ShutdownFlush;
use super::state::{ActiveMigration, MigrationState};
use crate::store::{Bookmark, Document, DocumentStore, IndexSpec, Selector};

/// An ordered sequence of steps sharing one id.
///
/// Ids sort lexically in execution order (`20200101000000-name`).
pub trait Migration: Send + Sync {
    fn id(&self) -> &str;

    fn step_count(&self) -> usize;

    /// Run the step named by [`StepContext::step`].
    fn migrate(&self, ctx: &mut StepContext<'_>) -> Result<(), MigrationError>;
}

/// One idempotent unit of work over a class of documents.
///
/// Each matching document is replaced by the documents `transform` returns
/// (none to leave it alone, a tombstone to delete it).
pub trait MigrationStep: Send + Sync {
    fn name(&self) -> &str;

    /// Indexes to ensure before the step runs. The first one is paginated.
    fn indexes(&self) -> Vec<IndexSpec>;

    /// Documents to process, defaults to the paginated index's selector.
    fn selector(&self) -> Selector {
        self.indexes()
            .into_iter()
            .next()
            .map(|spec| spec.selector)
            .unwrap_or(Selector::All)
    }

    /// Called before the first page of every run of the step, including a
    /// rerun after a failed one.
    fn begin(&self) {}

    fn transform(
        &self,
        doc: Document,
        store: &dyn DocumentStore,
    ) -> Result<Vec<Document>, MigrationError>;
}

/// A migration made of paginated [`MigrationStep`]s.
pub struct StepMigration {
    id: String,
    steps: Vec<Box<dyn MigrationStep>>,
}

impl StepMigration {
    pub fn new(id: impl Into<String>, steps: Vec<Box<dyn MigrationStep>>) -> Self {
        Self {
            id: id.into(),
            steps,
        }
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Migration for StepMigration {
    fn id(&self) -> &str {
        &self.id
    }

    fn step_count(&self) -> usize {
        self.steps.len()
    }

    fn migrate(&self, ctx: &mut StepContext<'_>) -> Result<(), MigrationError> {
        let step = self
            .steps
            .get(ctx.step())
            .ok_or_else(|| MigrationError::StateCorrupted {
                message: format!("{} has no step {}", self.id, ctx.step()),
            })?;
        batch::run_step(step.as_ref(), ctx)
    }
}

/// Access to the active migration's progress while a step runs.
pub struct StepContext<'a> {
    state: &'a mut MigrationState,
    flush: &'a ShutdownFlush,
    config: &'a MigrationConfig,
    store: &'a dyn DocumentStore,
    documents_written: usize,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        state: &'a mut MigrationState,
        flush: &'a ShutdownFlush,
        config: &'a MigrationConfig,
        store: &'a dyn DocumentStore,
    ) -> Self {
        Self {
            state,
            flush,
            config,
            store,
            documents_written: 0,
        }
    }

    pub fn store(&self) -> &'a dyn DocumentStore {
        self.store
    }

    pub fn config(&self) -> &'a MigrationConfig {
        self.config
    }

    /// The active migration's progress.
    pub fn active(&self) -> Option<&ActiveMigration> {
        self.state.active.as_ref()
    }

    pub fn migration_id(&self) -> &str {
        self.state.active.as_ref().map(|a| a.id.as_str()).unwrap_or_default()
    }

    /// Index of the step being run.
    pub fn step(&self) -> usize {
        self.state.active.as_ref().map(|a| a.step).unwrap_or_default()
    }

    pub fn resume_token(&self) -> Option<&Bookmark> {
        self.state.active.as_ref().and_then(|a| a.resume_token.as_ref())
    }

    pub fn set_resume_token(&mut self, token: Option<Bookmark>) {
        if let Some(active) = self.state.active.as_mut() {
            active.resume_token = token;
        }
    }

    /// Persist the current progress.
    pub fn checkpoint(&mut self) -> Result<(), MigrationError> {
        self.flush.persist(self.state)
    }

    pub fn record_written(&mut self, count: usize) {
        self.documents_written += count;
    }

    pub fn documents_written(&self) -> usize {
        self.documents_written
    }
}
