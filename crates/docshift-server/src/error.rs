//! Server error types.

use docshift_core::{MigrationError, StoreError};
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),

    /// The migration task panicked or was cancelled.
    #[error("migration task failed: {0}")]
    Task(String),
}
