//! Document store layer.
//!
//! The migration engine only talks to storage through the [`DocumentStore`]
//! trait: point reads, bulk writes with per-document results, eventually
//! consistent secondary indexes and bookmark-paginated index queries.
//! [`SledStore`] implements that contract on top of sled.

mod config;
mod document;
mod error;
mod index_builder;
pub mod key;
mod record;
mod selector;
mod sled_store;

pub use config::StoreConfig;
pub use document::{Bookmark, Document, DocumentStore, IndexSpec, Page, WriteResult, TYPE_FIELD};
pub use error::StoreError;
pub use record::DocRecord;
pub use selector::Selector;
pub use sled_store::SledStore;
