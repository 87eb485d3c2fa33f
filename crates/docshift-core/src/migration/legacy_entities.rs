//! Conversion of every legacy entity document to its current shape.
//!
//! One step per entity kind. Profiles go first so that later steps can
//! resolve logins to profile ids, and answers go before contents so that
//! each answer is translated against its content's legacy shape.

use serde::de::DeserializeOwned;

use docshift_model::{current, legacy, EntityKind};

use super::error::MigrationError;
use super::lookup::{Directory, StoreLookup};
use super::step::{MigrationStep, StepMigration};
use crate::store::{Document, DocumentStore, IndexSpec, Selector, StoreError};
use crate::translate::{CurrentEntity, LegacyEntity, TranslateError, Translator};

pub const MIGRATION_ID: &str = "20200101000000-legacy-entities";

/// Step order of [`migration`].
pub const STEP_ORDER: [EntityKind; 6] = [
    EntityKind::UserProfile,
    EntityKind::Room,
    EntityKind::Answer,
    EntityKind::Content,
    EntityKind::Comment,
    EntityKind::Motd,
];

pub const PROFILES_BY_LOGIN_INDEX: &str = "docshift-profiles-by-login";
pub const LOGINS_BY_USER_INDEX: &str = "docshift-legacy-logged-in-by-user";
pub const MOTD_LISTS_BY_USER_INDEX: &str = "docshift-legacy-motdlist-by-user";

/// The legacy entity migration.
pub fn migration() -> StepMigration {
    StepMigration::new(
        MIGRATION_ID,
        STEP_ORDER
            .into_iter()
            .map(|kind| Box::new(LegacyEntityStep::new(kind)) as Box<dyn MigrationStep>)
            .collect(),
    )
}

/// Name of the index a step paginates.
pub fn legacy_index_name(kind: EntityKind) -> String {
    format!("docshift-legacy-{}", kind.legacy_type())
}

/// Converts the legacy documents of one entity kind.
pub struct LegacyEntityStep {
    kind: EntityKind,
    name: String,
    profiles: Directory,
    logins: Directory,
    motd_lists: Directory,
}

impl LegacyEntityStep {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            name: format!("migrate-{}", kind.legacy_type()),
            profiles: Directory::new(
                IndexSpec::new(
                    PROFILES_BY_LOGIN_INDEX,
                    &["loginId"],
                    Selector::doc_type(current::USER_PROFILE_TYPE),
                ),
                "loginId",
            ),
            logins: Directory::new(
                IndexSpec::new(
                    LOGINS_BY_USER_INDEX,
                    &["user"],
                    Selector::doc_type(legacy::LOGGED_IN_TYPE),
                ),
                "user",
            ),
            motd_lists: Directory::new(
                IndexSpec::new(
                    MOTD_LISTS_BY_USER_INDEX,
                    &["username"],
                    Selector::doc_type(legacy::MOTD_LIST_TYPE),
                ),
                "username",
            ),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn parse<T: DeserializeOwned>(&self, doc: &Document) -> Result<T, MigrationError> {
        doc.to_entity().map_err(|e| MigrationError::StepFailed {
            step: self.name.clone(),
            message: format!("{}: {}", doc.id, e),
        })
    }

    fn parse_related<T: DeserializeOwned>(
        &self,
        doc: Option<&Document>,
    ) -> Result<Option<T>, MigrationError> {
        doc.map(|doc| self.parse(doc)).transpose()
    }

    /// Parse the document, returning extra documents to delete alongside it.
    fn read_entity(
        &self,
        doc: &Document,
        store: &dyn DocumentStore,
    ) -> Result<(LegacyEntity, Vec<Document>), MigrationError> {
        let entity = match self.kind {
            EntityKind::Room => LegacyEntity::Room(self.parse(doc)?),
            EntityKind::Content => LegacyEntity::Content(self.parse(doc)?),
            EntityKind::Answer => {
                let answer: legacy::Answer = self.parse(doc)?;
                answer.validate()?;
                LegacyEntity::Answer(answer)
            }
            EntityKind::Comment => LegacyEntity::Comment(self.parse(doc)?),
            EntityKind::Motd => LegacyEntity::Motd(self.parse(doc)?),
            EntityKind::UserProfile => {
                let user: legacy::User = self.parse(doc)?;
                // Secondary records merge into the first account of a login.
                let logged_in_doc = self.logins.take(store, &user.username)?;
                let motd_list_doc = self.motd_lists.take(store, &user.username)?;
                let records = legacy::UserRecords {
                    logged_in: self.parse_related(logged_in_doc.as_ref())?,
                    motd_list: self.parse_related(motd_list_doc.as_ref())?,
                    user,
                };
                let merged = logged_in_doc
                    .into_iter()
                    .chain(motd_list_doc)
                    .map(Document::into_tombstone)
                    .collect();
                return Ok((LegacyEntity::UserProfile(records), merged));
            }
        };
        Ok((entity, Vec::new()))
    }
}

fn current_document(entity: &CurrentEntity) -> Result<Document, StoreError> {
    let doc_type = entity.kind().current_type();
    match entity {
        CurrentEntity::Room(e) => Document::from_entity(doc_type, e),
        CurrentEntity::Content(e) => Document::from_entity(doc_type, e),
        CurrentEntity::Answer(e) => Document::from_entity(doc_type, e),
        CurrentEntity::Comment(e) => Document::from_entity(doc_type, e),
        CurrentEntity::Motd(e) => Document::from_entity(doc_type, e),
        CurrentEntity::UserProfile(e) => Document::from_entity(doc_type, e),
    }
}

impl MigrationStep for LegacyEntityStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin(&self) {
        self.profiles.reset();
        self.logins.reset();
        self.motd_lists.reset();
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        let legacy_type = self.kind.legacy_type();
        let mut indexes = vec![IndexSpec::new(
            legacy_index_name(self.kind),
            &["_id"],
            Selector::doc_type(legacy_type),
        )];
        match self.kind {
            EntityKind::UserProfile => {
                indexes.push(self.logins.index().clone());
                indexes.push(self.motd_lists.index().clone());
            }
            EntityKind::Room | EntityKind::Answer | EntityKind::Comment => {
                indexes.push(self.profiles.index().clone());
            }
            EntityKind::Content | EntityKind::Motd => {}
        }
        indexes
    }

    fn transform(
        &self,
        doc: Document,
        store: &dyn DocumentStore,
    ) -> Result<Vec<Document>, MigrationError> {
        let (entity, merged) = self.read_entity(&doc, store)?;

        let lookup = StoreLookup::new(store, &self.profiles);
        let translator = Translator::new(&lookup);
        let upgraded = match translator.upgrade(&entity) {
            Ok(upgraded) => upgraded,
            Err(TranslateError::MissingRelated {
                kind: EntityKind::Content,
                id,
            }) if self.kind == EntityKind::Answer => {
                tracing::warn!(answer = %doc.id, content = %id, "skipping answer without content");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut outputs = Vec::with_capacity(1 + merged.len());
        outputs.push(current_document(&upgraded)?);
        outputs.extend(merged);
        Ok(outputs)
    }
}
