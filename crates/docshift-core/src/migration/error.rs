//! Migration-specific error types.

use docshift_model::ModelError;
use thiserror::Error;

use crate::store::StoreError;
use crate::translate::TranslateError;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The persisted active migration is not the one the executor expects.
    #[error("migration state mismatch: {active} is active, expected {expected}")]
    StateMismatch {
        /// Id recorded as active in the state document.
        active: String,
        /// Id the executor was about to run, or a description of why the
        /// active id is unexpected.
        expected: String,
    },

    /// Migration state is corrupted.
    #[error("migration state corrupted: {message}")]
    StateCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Two registered migrations share an id.
    #[error("duplicate migration id: {id}")]
    DuplicateMigration {
        /// The duplicated id.
        id: String,
    },

    /// An index did not become ready within the configured attempts.
    #[error("index {index} not ready after {attempts} attempts")]
    IndexNotReady {
        /// Index name.
        index: String,
        /// Number of readiness polls made.
        attempts: u32,
    },

    /// Some documents of a batch were rejected by the store.
    #[error("bulk write in step {step} failed for {} document(s): {}", failures.len(), failures.join(", "))]
    BulkWriteFailed {
        /// Step name.
        step: String,
        /// `id: reason` per rejected document.
        failures: Vec<String>,
    },

    /// A migration step failed.
    #[error("step {step} failed: {message}")]
    StepFailed {
        /// Step name.
        step: String,
        /// Error message.
        message: String,
    },

    /// The store rejected the migration state document.
    #[error("failed to persist migration state: {reason}")]
    StateWriteFailed {
        /// Rejection reason.
        reason: String,
    },

    /// The run was interrupted by shutdown.
    #[error("migration interrupted by shutdown")]
    Interrupted,

    /// Entity translation failed.
    #[error("translation error: {0}")]
    Translate(#[from] TranslateError),

    /// A legacy entity failed validation.
    #[error("invalid entity: {0}")]
    Model(#[from] ModelError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::BulkWriteFailed {
            step: "legacy-session".to_string(),
            failures: vec!["r1: conflict".to_string(), "r2: conflict".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("2 document(s)"));
        assert!(message.contains("r1: conflict"));

        let err = MigrationError::StateMismatch {
            active: "20200215000000-b".to_string(),
            expected: "20200101000000-a".to_string(),
        };
        assert!(err.to_string().contains("20200215000000-b is active"));
    }

    #[test]
    fn test_error_conversions() {
        let err: MigrationError = TranslateError::UnsupportedFormat {
            code: "grid".to_string(),
        }
        .into();
        assert!(matches!(err, MigrationError::Translate(_)));

        let err: MigrationError = StoreError::Unavailable {
            reason: "down".to_string(),
        }
        .into();
        assert!(matches!(err, MigrationError::Store(_)));
    }
}
