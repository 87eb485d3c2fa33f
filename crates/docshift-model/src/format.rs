//! Closed enumerations shared by the entity shapes.

use serde::{Deserialize, Serialize};

/// Presentation format of a content (question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Format {
    /// Single or multiple choice.
    Choice,
    /// Likert-style scale, answered like a single choice.
    Scale,
    /// Yes/no.
    Binary,
    /// Free text.
    Text,
    /// Flashcard (no answers).
    Flashcard,
}

impl Format {
    /// Whether answers to this format select options by index.
    pub fn is_choice_based(&self) -> bool {
        matches!(self, Format::Choice | Format::Scale | Format::Binary)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Choice => write!(f, "CHOICE"),
            Format::Scale => write!(f, "SCALE"),
            Format::Binary => write!(f, "BINARY"),
            Format::Text => write!(f, "TEXT"),
            Format::Flashcard => write!(f, "FLASHCARD"),
        }
    }
}

/// Who a message of the day is shown to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
    /// Everybody.
    All,
    /// Any signed-in user.
    Authenticated,
    /// Room owners and moderators.
    Authors,
    /// Room participants.
    Participants,
    /// Members of a single room.
    Room,
}
