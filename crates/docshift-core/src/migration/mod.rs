//! Resumable migration engine.
//!
//! Migrations run in id order, each as a sequence of steps. A step pages
//! through the documents of one index and replaces each page with the
//! documents its transform returns. Progress is stored in a single state
//! document:
//!
//! - the id of the active migration and the index of its current step
//! - the resume token of the page after the last one written
//! - the ids of all completed migrations
//!
//! After a crash the executor resumes the active migration at the persisted
//! step and token. Steps are idempotent, so a page that was written but not
//! yet checkpointed is simply written again.
//!
//! # Example
//!
//! ```ignore
//! use docshift_core::migration::{registered_migrations, MigrationConfig, MigrationExecutor};
//!
//! let executor = MigrationExecutor::new(store, registered_migrations(), MigrationConfig::default())?;
//! let report = executor.run()?;
//! println!("applied {:?}", report.applied);
//! ```

mod batch;
pub mod error;
pub mod executor;
pub mod index;
pub mod legacy_entities;
pub mod lookup;
pub mod motd_cleanup;
pub mod shutdown;
pub mod state;
pub mod step;

pub use error::MigrationError;
pub use executor::{MigrationConfig, MigrationExecutor, MigrationReport};
pub use index::{ensure_index, wait_for_index, IndexWaitConfig};
pub use shutdown::{FlushGuard, ShutdownFlush};
pub use state::{ActiveMigration, MigrationState, MigrationStateStore, STATE_ID};
pub use step::{Migration, MigrationStep, StepContext, StepMigration};

/// All migrations of this release.
pub fn registered_migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(legacy_entities::migration()),
        Box::new(motd_cleanup::migration()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_ids_sort_in_release_order() {
        let ids: Vec<String> = registered_migrations()
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(
            ids,
            vec![legacy_entities::MIGRATION_ID, motd_cleanup::MIGRATION_ID]
        );
    }
}
