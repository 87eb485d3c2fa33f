//! docshift entity model.
//!
//! This crate defines the two generations of the domain schema that the
//! migration engine converts between:
//!
//! - [`legacy`] - the "v2" document shapes (`session`, `skill_question`, ...)
//! - [`current`] - the "v3" document shapes (`Room`, `Content`, ...)
//! - [`format`] - closed enumerations shared by both generations
//! - [`error`] - model validation errors
//!
//! All types derive `serde::Serialize` and `serde::Deserialize` and map
//! directly onto the JSON bodies stored in the document database. Document
//! identity is carried in the `_id` / `_rev` fields, as the store expects.
//!
//! ```ignore
//! use docshift_model::legacy;
//!
//! let room: legacy::Room = serde_json::from_value(body)?;
//! ```

pub mod current;
pub mod error;
pub mod format;
pub mod legacy;

pub use error::ModelError;
pub use format::{Audience, Format};

/// Name of the extension slot that keeps legacy-only data on current entities.
pub const V2_EXTENSION: &str = "v2";

/// Kinds of domain entities that exist in both schema generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Room,
    Content,
    Answer,
    Comment,
    Motd,
    UserProfile,
}

impl EntityKind {
    /// All entity kinds.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Room,
        EntityKind::Content,
        EntityKind::Answer,
        EntityKind::Comment,
        EntityKind::Motd,
        EntityKind::UserProfile,
    ];

    /// Document `type` of the legacy shape.
    ///
    /// For user profiles this is the primary `userdetails` record.
    pub fn legacy_type(&self) -> &'static str {
        match self {
            EntityKind::Room => legacy::ROOM_TYPE,
            EntityKind::Content => legacy::CONTENT_TYPE,
            EntityKind::Answer => legacy::ANSWER_TYPE,
            EntityKind::Comment => legacy::COMMENT_TYPE,
            EntityKind::Motd => legacy::MOTD_TYPE,
            EntityKind::UserProfile => legacy::USER_TYPE,
        }
    }

    /// Document `type` of the current shape.
    pub fn current_type(&self) -> &'static str {
        match self {
            EntityKind::Room => current::ROOM_TYPE,
            EntityKind::Content => current::CONTENT_TYPE,
            EntityKind::Answer => current::ANSWER_TYPE,
            EntityKind::Comment => current::COMMENT_TYPE,
            EntityKind::Motd => current::MOTD_TYPE,
            EntityKind::UserProfile => current::USER_PROFILE_TYPE,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.current_type())
    }
}
