//! Model validation errors.

use thiserror::Error;

/// Errors raised when an entity violates a shape invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A legacy answer claims to be an abstention but also carries a response.
    #[error("answer {id} is marked as abstention but carries a response")]
    AbstentionWithSelection {
        /// Document id of the offending answer.
        id: String,
    },

    /// A required identifier is empty.
    #[error("{entity} has an empty {field}")]
    EmptyField {
        /// Entity type name.
        entity: &'static str,
        /// Field name.
        field: &'static str,
    },
}
