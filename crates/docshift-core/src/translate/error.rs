//! Translation errors.

use docshift_model::EntityKind;
use thiserror::Error;

/// Errors raised while translating between entity generations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// Unknown or unsupported content format code.
    #[error("unsupported content format: {code}")]
    UnsupportedFormat {
        /// The offending code (legacy question type or current format).
        code: String,
    },

    /// Unknown motd audience.
    #[error("unsupported motd audience: {value}")]
    UnsupportedAudience {
        /// The offending audience value.
        value: String,
    },

    /// Answer selections do not line up with the content's options.
    #[error("answer does not match content options: expected {expected}, got {actual}")]
    IndexMismatch {
        /// Number of options of the content.
        expected: usize,
        /// Number of flags supplied, or the out-of-range index.
        actual: usize,
    },

    /// A related entity required for translation does not exist.
    #[error("missing related {kind} {id}")]
    MissingRelated {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Id (or login) that was looked up.
        id: String,
    },

    /// Looking up a related entity failed.
    #[error("related entity lookup failed: {0}")]
    Lookup(String),
}
