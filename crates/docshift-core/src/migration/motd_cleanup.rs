//! Deletes room messages of the day whose room no longer exists.

use serde_json::Value;

use docshift_model::{current, legacy};

use super::error::MigrationError;
use super::step::{MigrationStep, StepMigration};
use crate::store::{Document, DocumentStore, IndexSpec, Selector};

pub const MIGRATION_ID: &str = "20200215000000-orphaned-room-motds";
pub const ROOM_MOTDS_INDEX: &str = "docshift-room-motds";

/// Serialized form of `Audience::Room`.
const ROOM_AUDIENCE: &str = "ROOM";

pub fn migration() -> StepMigration {
    StepMigration::new(MIGRATION_ID, vec![Box::new(OrphanedRoomMotds)])
}

pub struct OrphanedRoomMotds;

impl OrphanedRoomMotds {
    fn room_exists(store: &dyn DocumentStore, room_id: &str) -> Result<bool, MigrationError> {
        Ok(store.get(room_id)?.is_some_and(|room| {
            matches!(
                room.doc_type(),
                Some(current::ROOM_TYPE) | Some(legacy::ROOM_TYPE)
            )
        }))
    }
}

impl MigrationStep for OrphanedRoomMotds {
    fn name(&self) -> &str {
        "delete-orphaned-room-motds"
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            ROOM_MOTDS_INDEX,
            &["_id"],
            Selector::And(vec![
                Selector::doc_type(current::MOTD_TYPE),
                Selector::eq("audience", ROOM_AUDIENCE),
            ]),
        )]
    }

    fn transform(
        &self,
        doc: Document,
        store: &dyn DocumentStore,
    ) -> Result<Vec<Document>, MigrationError> {
        let exists = match doc.field("roomId") {
            Some(Value::String(room_id)) => Self::room_exists(store, &room_id)?,
            _ => false,
        };
        if exists {
            return Ok(Vec::new());
        }
        tracing::info!(motd = %doc.id, "deleting motd of missing room");
        Ok(vec![doc.into_tombstone()])
    }
}
