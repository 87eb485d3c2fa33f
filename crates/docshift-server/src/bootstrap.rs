//! Startup migration run.
//!
//! The executor blocks, so it runs on the blocking pool while the async side
//! waits for either its result or the shutdown signal. On shutdown the
//! migration state is flushed and closed, which stops the executor at its
//! next checkpoint; the batch in flight is allowed to finish.

use std::future::Future;
use std::sync::Arc;

use docshift_core::{
    registered_migrations, DocumentStore, MigrationConfig, MigrationError, MigrationExecutor,
    MigrationReport,
};
use tokio::task::JoinError;

use crate::error::Error;
use crate::health::{HealthState, Readiness};

/// How the startup migration run ended.
#[derive(Debug)]
pub enum Outcome {
    /// All migrations completed.
    Completed(MigrationReport),
    /// Shutdown was requested before the run finished.
    Interrupted,
}

/// Run all pending migrations, stopping early if `shutdown` resolves.
///
/// Readiness is `Ready` after a completed run and `Maintenance` otherwise.
pub async fn run_migrations<F>(
    store: Arc<dyn DocumentStore>,
    config: MigrationConfig,
    health: HealthState,
    shutdown: F,
) -> Result<Outcome, Error>
where
    F: Future<Output = ()>,
{
    health.set(Readiness::Migrating);
    let executor = match MigrationExecutor::new(store, registered_migrations(), config) {
        Ok(executor) => executor,
        Err(e) => return Err(enter_maintenance(&health, e.into())),
    };
    let flush = executor.shutdown_flush();
    tracing::info!(migrations = ?executor.migration_ids(), "running migrations");

    let mut task = tokio::task::spawn_blocking(move || executor.run());
    tokio::select! {
        joined = &mut task => finish(joined, &health),
        _ = shutdown => {
            tracing::info!("shutdown requested, stopping migrations");
            match flush.close() {
                Ok(true) => tracing::info!("migration state flushed"),
                Ok(false) => {}
                Err(e) => tracing::error!(error = %e, "failed to flush migration state"),
            }
            match task.await {
                Ok(Ok(_)) => tracing::info!("migrations finished before shutdown"),
                Ok(Err(MigrationError::Interrupted)) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "migration failed during shutdown"),
                Err(e) => tracing::error!(error = %e, "migration task failed during shutdown"),
            }
            health.set(Readiness::Maintenance {
                reason: "shutting down".to_string(),
            });
            Ok(Outcome::Interrupted)
        }
    }
}

fn finish(
    joined: Result<Result<MigrationReport, MigrationError>, JoinError>,
    health: &HealthState,
) -> Result<Outcome, Error> {
    match joined {
        Ok(Ok(report)) => {
            tracing::info!(
                applied = report.applied.len(),
                steps = report.steps_executed,
                documents = report.documents_written,
                "startup migrations complete"
            );
            health.set(Readiness::Ready);
            Ok(Outcome::Completed(report))
        }
        Ok(Err(e)) => Err(enter_maintenance(health, e.into())),
        Err(e) => Err(enter_maintenance(health, Error::Task(e.to_string()))),
    }
}

fn enter_maintenance(health: &HealthState, error: Error) -> Error {
    tracing::error!(error = %error, "migrations failed, entering maintenance mode");
    health.set(Readiness::Maintenance {
        reason: error.to_string(),
    });
    error
}
