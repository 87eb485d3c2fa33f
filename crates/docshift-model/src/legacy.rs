//! Legacy ("v2") document shapes.
//!
//! Timestamps are epoch milliseconds, with `0` meaning "unset". Optional
//! string fields are omitted from the JSON body when absent. Body fields a
//! record does not model are collected into its `extra` map and written back
//! unchanged.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Body fields of a legacy record that have no named field, including the
/// document `type`.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Document type of legacy rooms.
pub const ROOM_TYPE: &str = "session";
/// Document type of legacy contents.
pub const CONTENT_TYPE: &str = "skill_question";
/// Document type of legacy answers.
pub const ANSWER_TYPE: &str = "skill_question_answer";
/// Document type of legacy comments.
pub const COMMENT_TYPE: &str = "interposed_question";
/// Document type of legacy messages of the day.
pub const MOTD_TYPE: &str = "motd";
/// Document type of legacy account records.
pub const USER_TYPE: &str = "userdetails";
/// Document type of legacy login/visit records.
pub const LOGGED_IN_TYPE: &str = "logged_in";
/// Document type of legacy acknowledged-motd lists.
pub const MOTD_LIST_TYPE: &str = "motdlist";

/// Question type codes used by legacy contents.
pub mod question_type {
    pub const ABCD: &str = "abcd";
    pub const SINGLE_CHOICE: &str = "sc";
    pub const MULTIPLE_CHOICE: &str = "mc";
    pub const VOTE: &str = "vote";
    pub const SCHOOL: &str = "school";
    pub const YES_NO: &str = "yesno";
    pub const FREETEXT: &str = "freetext";
    pub const FLASHCARD: &str = "flashcard";
}

/// Motd audience codes used by legacy messages of the day.
pub mod audience {
    pub const ALL: &str = "all";
    pub const LOGGED_IN: &str = "loggedIn";
    pub const TUTORS: &str = "tutors";
    pub const STUDENTS: &str = "students";
    pub const SESSION: &str = "session";
}

/// Session type marking rooms published to the public pool.
pub const PUBLIC_POOL: &str = "public_pool";

/// A legacy room ("session").
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub creation_time: i64,
    #[serde(default)]
    pub last_owner_activity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_author_mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_faculty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_license: Option<String>,
    #[serde(default)]
    pub features: RoomFeatures,
    #[serde(default)]
    pub flip_flashcards: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Feature switches of a legacy room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomFeatures {
    pub lecture: bool,
    pub jitt: bool,
    pub feedback: bool,
    pub interposed: bool,
    pub pi: bool,
    pub learning_progress: bool,
    pub flashcard: bool,
}

/// A legacy content ("skill_question").
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: String,
    pub question_type: String,
    #[serde(default)]
    pub question_variant: String,
    #[serde(default)]
    pub possible_answers: Vec<AnswerOption>,
    #[serde(default)]
    pub pi_round: i32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub show_statistic: bool,
    #[serde(default)]
    pub show_answer: bool,
    #[serde(default)]
    pub voting_disabled: bool,
    #[serde(default)]
    pub abstention: bool,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A possible answer of a legacy content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
    #[serde(default)]
    pub value: i32,
}

/// A legacy answer ("skill_question_answer").
///
/// Choice answers keep the response in `answer_text`: the selected option's
/// label for single choice, or comma-joined `1`/`0` flags in option order for
/// multiple choice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub question_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub abstention: bool,
    #[serde(default)]
    pub pi_round: i32,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Answer {
    /// Reject answers that are both an abstention and a response.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.question_id.is_empty() {
            return Err(ModelError::EmptyField {
                entity: ANSWER_TYPE,
                field: "questionId",
            });
        }
        let has_response = [&self.answer_text, &self.answer_subject]
            .iter()
            .any(|value| value.as_deref().is_some_and(|v| !v.is_empty()));
        if self.abstention && has_response {
            return Err(ModelError::AbstentionWithSelection {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// A legacy comment ("interposed_question").
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A legacy message of the day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Motd {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motdkey: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub audience: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub startdate: i64,
    #[serde(default)]
    pub enddate: i64,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A legacy account record ("userdetails").
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub username: String,
    #[serde(default)]
    pub creation: i64,
    #[serde(default)]
    pub last_login: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_key: Option<String>,
    #[serde(default)]
    pub password_reset_time: i64,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A legacy login record listing the rooms a user has visited.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedIn {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub user: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub visited_sessions: Vec<VisitedRoom>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A room entry of [`LoggedIn::visited_sessions`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisitedRoom {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub keyword: String,
}

/// A legacy list of acknowledged motd keys, stored comma-separated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotdList {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub username: String,
    #[serde(default)]
    pub motdkeys: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// All legacy records that together make up one user profile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserRecords {
    pub user: User,
    pub logged_in: Option<LoggedIn>,
    pub motd_list: Option<MotdList>,
}
