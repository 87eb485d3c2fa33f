//! docshift core - document store, migration engine and entity translator.
//!
//! - [`store`] - the [`DocumentStore`] contract and the sled-backed [`SledStore`]
//! - [`migration`] - the resumable executor, paginated steps and the
//!   registered migrations
//! - [`translate`] - bidirectional legacy/current entity translation

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod migration;
pub mod store;
pub mod translate;

pub use migration::{
    registered_migrations, IndexWaitConfig, Migration, MigrationConfig, MigrationError,
    MigrationExecutor, MigrationReport, MigrationState, MigrationStateStore, ShutdownFlush,
};
pub use store::{
    Bookmark, Document, DocumentStore, IndexSpec, Page, Selector, SledStore, StoreConfig,
    StoreError, WriteResult,
};
pub use translate::{CurrentEntity, LegacyEntity, RelatedLookup, TranslateError, Translator};

/// Re-export the entity model.
pub use docshift_model as model;
