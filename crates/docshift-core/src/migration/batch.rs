//! Paginated bulk execution of a migration step.
//!
//! The step's documents are read page by page through its index, starting
//! at the persisted resume token. After every page the transformed
//! documents are written, each write result is checked, and only then is
//! the token advanced and persisted. A crash therefore repeats at most the
//! page in flight, and the step transforms are idempotent.
//!
//! A closed [`ShutdownFlush`](super::ShutdownFlush) refuses the checkpoint
//! that follows a page already written, so the run stops with
//! [`MigrationError::Interrupted`] and the next run reads that page again
//! from the previous token. Its documents that still match the step's
//! selector are transformed a second time.
//!
//! Termination relies on monotonic pagination: the store must return pages
//! in a stable key order, and writes made by the step must never re-enter
//! the part of the index that is still to be scanned. Transforms that keep
//! a document matching the step's selector would violate this.

use super::error::MigrationError;
use super::index::ensure_index;
use super::step::{MigrationStep, StepContext};

/// Run one step to completion, resuming from the context's token.
pub fn run_step(step: &dyn MigrationStep, ctx: &mut StepContext<'_>) -> Result<(), MigrationError> {
    let store = ctx.store();
    let config = ctx.config();

    let indexes = step.indexes();
    let Some(primary) = indexes.first() else {
        return Err(MigrationError::StepFailed {
            step: step.name().to_string(),
            message: "step declares no index".to_string(),
        });
    };
    for spec in &indexes {
        ensure_index(store, spec, &config.index_wait)?;
    }

    step.begin();
    let selector = step.selector();
    let mut batch = 0usize;
    let mut written = 0usize;
    if ctx.resume_token().is_some() {
        tracing::info!(migration = %ctx.migration_id(), step = step.name(), "resuming step");
    }

    loop {
        let token = ctx.resume_token().cloned();
        let page = store.query(&selector, &primary.name, config.batch_size, token.as_ref())?;
        if page.docs.is_empty() {
            ctx.set_resume_token(None);
            break;
        }
        let read = page.docs.len();

        let mut outputs = Vec::new();
        for doc in page.docs {
            outputs.extend(step.transform(doc, store)?);
        }

        if !outputs.is_empty() {
            let failures: Vec<String> = store
                .bulk_write(&outputs)?
                .into_iter()
                .filter_map(|result| {
                    result
                        .error
                        .map(|error| format!("{}: {}", result.id, error))
                })
                .collect();
            if !failures.is_empty() {
                return Err(MigrationError::BulkWriteFailed {
                    step: step.name().to_string(),
                    failures,
                });
            }
        }

        ctx.record_written(outputs.len());
        written += outputs.len();
        ctx.set_resume_token(page.bookmark);
        ctx.checkpoint()?;

        batch += 1;
        tracing::debug!(
            migration = %ctx.migration_id(),
            step = step.name(),
            batch,
            documents = read,
            written = outputs.len(),
            "batch migrated"
        );
    }

    tracing::info!(
        migration = %ctx.migration_id(),
        step = step.name(),
        batches = batch,
        documents = written,
        "step complete"
    );
    Ok(())
}
