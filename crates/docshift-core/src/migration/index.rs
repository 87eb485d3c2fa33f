//! Index creation and readiness polling.

use std::thread;
use std::time::Duration;

use super::error::MigrationError;
use crate::store::{DocumentStore, IndexSpec};

/// Bounded retry policy for index readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexWaitConfig {
    /// Number of readiness polls before giving up.
    pub attempts: u32,
    /// Delay after poll `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for IndexWaitConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Create the index if needed and wait until it is ready.
pub fn ensure_index(
    store: &dyn DocumentStore,
    spec: &IndexSpec,
    wait: &IndexWaitConfig,
) -> Result<(), MigrationError> {
    store.create_index(&spec.name, &spec.sort_fields, &spec.selector)?;
    wait_for_index(store, &spec.name, wait)
}

/// Poll `index_ready` up to `wait.attempts` times.
///
/// Transient store errors count as "not ready yet".
pub fn wait_for_index(
    store: &dyn DocumentStore,
    index: &str,
    wait: &IndexWaitConfig,
) -> Result<(), MigrationError> {
    for attempt in 1..=wait.attempts {
        match store.index_ready(index) {
            Ok(true) => {
                tracing::debug!(index = %index, attempt, "index ready");
                return Ok(());
            }
            Ok(false) => {
                tracing::debug!(index = %index, attempt, "index not ready");
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(index = %index, attempt, error = %e, "index readiness check failed");
            }
            Err(e) => return Err(e.into()),
        }
        if attempt < wait.attempts {
            thread::sleep(wait.base_delay * attempt);
        }
    }

    Err(MigrationError::IndexNotReady {
        index: index.to_string(),
        attempts: wait.attempts,
    })
}
