//! Migration executor - runs registered migrations in id order.

use std::collections::HashSet;
use std::sync::Arc;

use super::error::MigrationError;
use super::index::IndexWaitConfig;
use super::shutdown::ShutdownFlush;
use super::state::{ActiveMigration, MigrationState, MigrationStateStore};
use super::step::{Migration, StepContext};
use crate::store::DocumentStore;

/// Migration executor configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Documents read per page.
    pub batch_size: usize,
    /// Index readiness polling.
    pub index_wait: IndexWaitConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            index_wait: IndexWaitConfig::default(),
        }
    }
}

impl MigrationConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_index_wait(mut self, index_wait: IndexWaitConfig) -> Self {
        self.index_wait = index_wait;
        self
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Ids of the migrations completed by this run, in order.
    pub applied: Vec<String>,
    /// Steps executed by this run.
    pub steps_executed: usize,
    /// Documents written by this run's steps.
    pub documents_written: usize,
}

/// Runs every pending migration, resuming an interrupted one.
pub struct MigrationExecutor {
    store: Arc<dyn DocumentStore>,
    migrations: Vec<Box<dyn Migration>>,
    config: MigrationConfig,
    flush: ShutdownFlush,
}

impl MigrationExecutor {
    /// Create an executor over an explicit list of migrations.
    ///
    /// Migrations are sorted by id; duplicate ids are rejected.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        mut migrations: Vec<Box<dyn Migration>>,
        config: MigrationConfig,
    ) -> Result<Self, MigrationError> {
        migrations.sort_by(|a, b| a.id().cmp(b.id()));
        let mut seen = HashSet::new();
        for migration in &migrations {
            if !seen.insert(migration.id()) {
                return Err(MigrationError::DuplicateMigration {
                    id: migration.id().to_string(),
                });
            }
        }

        let flush = ShutdownFlush::new(MigrationStateStore::new(Arc::clone(&store)));
        Ok(Self {
            store,
            migrations,
            config,
            flush,
        })
    }

    /// Handle for flushing state from a signal handler.
    pub fn shutdown_flush(&self) -> ShutdownFlush {
        self.flush.clone()
    }

    /// Registered migration ids in execution order.
    pub fn migration_ids(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.id()).collect()
    }

    /// Ids of registered migrations that have not completed.
    pub fn pending(&self) -> Result<Vec<String>, MigrationError> {
        let state = self.flush.state_store().load()?;
        Ok(self
            .migrations
            .iter()
            .map(|m| m.id())
            .filter(|id| !state.is_completed(id))
            .map(str::to_string)
            .collect())
    }

    /// Run all pending migrations.
    ///
    /// Any failure aborts the run after persisting the progress made so far.
    pub fn run(&self) -> Result<MigrationReport, MigrationError> {
        let _guard = self.flush.arm();
        let mut state = self.flush.state_store().load()?;
        let mut report = MigrationReport::default();

        for migration in &self.migrations {
            if state.is_completed(migration.id()) {
                continue;
            }
            self.run_migration(migration.as_ref(), &mut state, &mut report)?;
        }

        if let Some(active) = &state.active {
            let expected = if state.is_completed(&active.id) {
                "it to be completed".to_string()
            } else {
                "a registered migration".to_string()
            };
            return Err(MigrationError::StateMismatch {
                active: active.id.clone(),
                expected,
            });
        }

        if report.applied.is_empty() {
            tracing::info!("no pending migrations");
        } else {
            tracing::info!(
                migrations = report.applied.len(),
                steps = report.steps_executed,
                documents = report.documents_written,
                "migrations complete"
            );
        }
        Ok(report)
    }

    fn run_migration(
        &self,
        migration: &dyn Migration,
        state: &mut MigrationState,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        let id = migration.id();
        let active = state.active.as_ref().map(|a| (a.id.clone(), a.step));
        match active {
            Some((active, _)) if active != id => {
                return Err(MigrationError::StateMismatch {
                    active,
                    expected: id.to_string(),
                });
            }
            Some((_, step)) => {
                tracing::info!(migration = %id, step, "resuming migration");
            }
            None => {
                tracing::info!(migration = %id, steps = migration.step_count(), "starting migration");
                state.active = Some(ActiveMigration::new(id));
                self.flush.persist(state)?;
            }
        }

        let step_count = migration.step_count();
        loop {
            let step = state.active.as_ref().map(|a| a.step).unwrap_or_default();
            if step > step_count {
                return Err(MigrationError::StateCorrupted {
                    message: format!("{id} is at step {step} of {step_count}"),
                });
            }
            if step == step_count {
                break;
            }

            let mut ctx = StepContext::new(state, &self.flush, &self.config, self.store.as_ref());
            let outcome = migration.migrate(&mut ctx);
            report.documents_written += ctx.documents_written();

            if let Err(e) = outcome {
                tracing::error!(migration = %id, step, error = %e, "migration step failed");
                if let Err(persist) = self.flush.persist(state) {
                    tracing::warn!(migration = %id, error = %persist, "failed to persist progress");
                }
                return Err(e);
            }

            if let Some(active) = state.active.as_mut() {
                active.step += 1;
                active.resume_token = None;
            }
            self.flush.persist(state)?;
            report.steps_executed += 1;
        }

        state.complete_active();
        self.flush.persist(state)?;
        report.applied.push(id.to_string());
        tracing::info!(migration = %id, "migration completed");
        Ok(())
    }
}
