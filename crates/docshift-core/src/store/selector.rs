//! Document selectors.
//!
//! A [`Selector`] is a small predicate language over dotted JSON field paths,
//! used both to define which documents an index covers and to filter query
//! results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::{Document, TYPE_FIELD};

/// Predicate over a document's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Matches every live document.
    All,
    Eq { field: String, value: Value },
    /// Also matches documents without the field.
    Ne { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    /// Field is present (even if `null`).
    Exists { field: String },
    Missing { field: String },
    And(Vec<Selector>),
    Or(Vec<Selector>),
}

impl Selector {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Selector::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Selector::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Selector::Exists {
            field: field.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Selector::Missing {
            field: field.into(),
        }
    }

    /// Documents whose `type` field equals `doc_type`.
    pub fn doc_type(doc_type: &str) -> Self {
        Self::eq(TYPE_FIELD, doc_type)
    }

    /// Evaluate the selector against a document. Deleted documents never match.
    pub fn matches(&self, doc: &Document) -> bool {
        !doc.deleted && self.evaluate(doc)
    }

    fn evaluate(&self, doc: &Document) -> bool {
        match self {
            Selector::All => true,
            Selector::Eq { field, value } => doc.field(field).as_ref() == Some(value),
            Selector::Ne { field, value } => doc.field(field).as_ref() != Some(value),
            Selector::In { field, values } => match doc.field(field) {
                Some(fv) => values.contains(&fv),
                None => false,
            },
            Selector::Exists { field } => doc.field(field).is_some(),
            Selector::Missing { field } => doc.field(field).is_none(),
            Selector::And(selectors) => selectors.iter().all(|s| s.evaluate(doc)),
            Selector::Or(selectors) => selectors.iter().any(|s| s.evaluate(doc)),
        }
    }
}
