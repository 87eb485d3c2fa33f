//! Migration state management and persistence.
//!
//! A single `MigrationState` document records which migrations completed
//! and where the active one stopped, so a restarted process resumes at the
//! exact step and page it was interrupted in.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::MigrationError;
use crate::store::{Bookmark, Document, DocumentStore};

/// Fixed id of the state document.
pub const STATE_ID: &str = "MigrationState";

/// The migration currently in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMigration {
    pub id: String,
    pub started_at: DateTime<Utc>,
    /// Index of the next step to run.
    pub step: usize,
    /// Resume point inside the current step.
    pub resume_token: Option<Bookmark>,
}

impl ActiveMigration {
    /// Start a migration at its first step.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
            step: 0,
            resume_token: None,
        }
    }
}

/// Persistent progress of all migrations.
///
/// A migration id is either not started, active, or completed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationState {
    /// Store revision of the state document.
    #[serde(skip)]
    pub revision: Option<String>,
    #[serde(default)]
    pub active: Option<ActiveMigration>,
    #[serde(default)]
    pub completed: BTreeSet<String>,
}

impl MigrationState {
    /// Whether a migration id has completed.
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// Record the active migration as completed.
    pub fn complete_active(&mut self) -> Option<String> {
        let active = self.active.take()?;
        self.completed.insert(active.id.clone());
        Some(active.id)
    }

    /// Encode as the state document.
    pub fn to_document(&self) -> Result<Document, MigrationError> {
        let Value::Object(mut body) =
            serde_json::to_value(self).map_err(|e| MigrationError::Serialization(e.to_string()))?
        else {
            return Err(MigrationError::Serialization(
                "migration state is not an object".to_string(),
            ));
        };
        body.insert("type".to_string(), Value::String(STATE_ID.to_string()));
        Ok(Document {
            id: STATE_ID.to_string(),
            revision: self.revision.clone(),
            deleted: false,
            body,
        })
    }

    /// Decode from the state document.
    pub fn from_document(doc: &Document) -> Result<Self, MigrationError> {
        let mut state: Self = serde_json::from_value(Value::Object(doc.body.clone())).map_err(
            |e| MigrationError::StateCorrupted {
                message: e.to_string(),
            },
        )?;
        state.revision = doc.revision.clone();
        Ok(state)
    }
}

/// Reads and writes the state document through a [`DocumentStore`].
#[derive(Clone)]
pub struct MigrationStateStore {
    store: Arc<dyn DocumentStore>,
}

impl MigrationStateStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load the state, creating an empty one on first use.
    pub fn load(&self) -> Result<MigrationState, MigrationError> {
        match self.store.get(STATE_ID)? {
            Some(doc) => MigrationState::from_document(&doc),
            None => {
                let mut state = MigrationState::default();
                self.save(&mut state)?;
                tracing::info!("created empty migration state");
                Ok(state)
            }
        }
    }

    /// Persist the state and record the new revision on it.
    pub fn save(&self, state: &mut MigrationState) -> Result<(), MigrationError> {
        let doc = state.to_document()?;
        let result = self
            .store
            .bulk_write(std::slice::from_ref(&doc))?
            .into_iter()
            .next()
            .ok_or_else(|| MigrationError::StateWriteFailed {
                reason: "store returned no write result".to_string(),
            })?;

        match (result.revision, result.error) {
            (Some(revision), None) => {
                state.revision = Some(revision);
                Ok(())
            }
            (_, error) => Err(MigrationError::StateWriteFailed {
                reason: error.unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SledStore, StoreConfig};
    use serde_json::json;

    fn state_store() -> MigrationStateStore {
        let store = SledStore::open(StoreConfig::temporary()).unwrap();
        MigrationStateStore::new(Arc::new(store))
    }

    #[test]
    fn test_state_json_layout() {
        let mut state = MigrationState::default();
        state.completed.insert("20200101000000-a".to_string());
        state.active = Some(ActiveMigration {
            id: "20200215000000-b".to_string(),
            started_at: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            step: 2,
            resume_token: Some(Bookmark::new("00ff")),
        });

        let doc = state.to_document().unwrap();
        assert_eq!(doc.id, STATE_ID);
        let json = doc.to_json();
        assert_eq!(json["type"], "MigrationState");
        assert_eq!(json["active"]["step"], 2);
        assert_eq!(json["active"]["resumeToken"], "00ff");
        assert_eq!(json["active"]["startedAt"], "2020-09-13T12:26:40Z");
        assert_eq!(json["completed"], json!(["20200101000000-a"]));

        assert_eq!(MigrationState::from_document(&doc).unwrap(), state);
    }

    #[test]
    fn test_load_creates_empty_state() {
        let store = state_store();
        let state = store.load().unwrap();
        assert!(state.active.is_none());
        assert!(state.completed.is_empty());
        assert!(state.revision.is_some());

        // A second load reads the persisted document.
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_save_tracks_revisions() {
        let store = state_store();
        let mut state = store.load().unwrap();
        let first = state.revision.clone();

        state.active = Some(ActiveMigration::new("20200101000000-a"));
        store.save(&mut state).unwrap();
        assert_ne!(state.revision, first);

        let mut stale = state.clone();
        stale.revision = first;
        assert!(matches!(
            store.save(&mut stale),
            Err(MigrationError::StateWriteFailed { .. })
        ));
    }

    #[test]
    fn test_complete_active() {
        let mut state = MigrationState {
            active: Some(ActiveMigration::new("a")),
            ..Default::default()
        };
        assert_eq!(state.complete_active().as_deref(), Some("a"));
        assert!(state.is_completed("a"));
        assert!(state.active.is_none());
        assert_eq!(state.complete_active(), None);
    }

    #[test]
    fn test_corrupted_document() {
        let doc = Document::from_json(json!({
            "_id": STATE_ID,
            "active": {"id": 5},
            "completed": []
        }))
        .unwrap();
        assert!(matches!(
            MigrationState::from_document(&doc),
            Err(MigrationError::StateCorrupted { .. })
        ));
    }
}
