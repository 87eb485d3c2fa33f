//! Document store errors.

use thiserror::Error;

/// Errors returned by a [`DocumentStore`](super::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying sled error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A document body is not a JSON object or lacks an `_id`.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The named index was never created.
    #[error("unknown index: {name}")]
    UnknownIndex {
        /// Index name.
        name: String,
    },

    /// The named index exists but is still being built.
    #[error("index {name} is still building")]
    IndexBuilding {
        /// Index name.
        name: String,
    },

    /// A bookmark that this store did not issue.
    #[error("invalid bookmark: {bookmark}")]
    InvalidBookmark {
        /// The rejected bookmark.
        bookmark: String,
    },

    /// The store is temporarily unreachable.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the store could not be reached.
        reason: String,
    },
}

impl StoreError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable { .. } | StoreError::IndexBuilding { .. }
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Deserialization(err.to_string())
    }
}
