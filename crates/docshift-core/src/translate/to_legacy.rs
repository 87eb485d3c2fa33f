//! Current to legacy translation.
//!
//! The inverse of [`to_current`](super::to_current). Lossy cases:
//!
//! - SCALE contents with an option count other than 5 or 6 come back as `abcd`
//! - legacy `sc` contents come back as `abcd`
//! - a choice answer without selection comes back as an abstention
//!
//! Unmodeled legacy fields kept under `extensions["v2"]` are written back
//! into the legacy body.

use chrono::{DateTime, Utc};
use serde_json::Value;

use docshift_model::current::{self, Extensions};
use docshift_model::legacy::{self, audience, question_type};
use docshift_model::{Audience, Format, V2_EXTENSION};

use super::error::TranslateError;
use super::to_current::UNMAPPED;

/// Number of options of a `vote` scale.
const VOTE_OPTIONS: usize = 5;
/// Number of options of a `school` grade scale.
const SCHOOL_OPTIONS: usize = 6;

/// Convert to epoch milliseconds, `0` when unset.
pub fn timestamp(at: Option<DateTime<Utc>>) -> i64 {
    at.map(|at| at.timestamp_millis()).unwrap_or(0)
}

/// Map a format back to a legacy question type.
pub fn question_type(format: Format, multiple: bool, option_count: usize) -> &'static str {
    match format {
        Format::Choice if multiple => question_type::MULTIPLE_CHOICE,
        Format::Choice => question_type::ABCD,
        Format::Scale => match option_count {
            VOTE_OPTIONS => question_type::VOTE,
            SCHOOL_OPTIONS => question_type::SCHOOL,
            _ => question_type::ABCD,
        },
        Format::Binary => question_type::YES_NO,
        Format::Text => question_type::FREETEXT,
        Format::Flashcard => question_type::FLASHCARD,
    }
}

/// Map an audience back to its legacy code.
pub fn audience(value: Audience) -> &'static str {
    match value {
        Audience::All => audience::ALL,
        Audience::Authenticated => audience::LOGGED_IN,
        Audience::Authors => audience::TUTORS,
        Audience::Participants => audience::STUDENTS,
        Audience::Room => audience::SESSION,
    }
}

fn login_ref(id: Option<&str>, profile: Option<&current::UserProfile>) -> Option<String> {
    profile
        .map(|p| p.login_id.clone())
        .or_else(|| id.map(str::to_string))
}

/// Read access to `extensions["v2"]`.
struct LegacyFields<'a>(Option<&'a serde_json::Map<String, Value>>);

impl<'a> LegacyFields<'a> {
    fn of(extensions: &'a Extensions) -> Self {
        Self(extensions.get(V2_EXTENSION).and_then(Value::as_object))
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.and_then(|fields| fields.get(key))
    }

    fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn int(&self, key: &str) -> i64 {
        self.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    fn unmapped(&self) -> legacy::Extra {
        self.get(UNMAPPED)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

fn unmapped(extensions: &Extensions) -> legacy::Extra {
    LegacyFields::of(extensions).unmapped()
}

/// Translate a room back. `owner` is the profile referenced by `ownerId`.
pub fn room(room: &current::Room, owner: Option<&current::UserProfile>) -> legacy::Room {
    let v2 = LegacyFields::of(&room.extensions);
    let author = room.author.clone().unwrap_or_default();

    let (session_type, pp_subject, pp_level, pp_license) = match &room.pool_properties {
        Some(pool) => (
            Some(legacy::PUBLIC_POOL.to_string()),
            pool.category.clone(),
            pool.level.clone(),
            pool.license.clone(),
        ),
        None => (
            v2.string("sessionType"),
            v2.string("ppSubject"),
            v2.string("ppLevel"),
            v2.string("ppLicense"),
        ),
    };

    let settings = &room.settings;
    legacy::Room {
        id: room.id.clone(),
        revision: room.revision.clone(),
        name: room.name.clone(),
        short_name: room.abbreviation.clone(),
        keyword: room.short_id.clone(),
        creator: login_ref(room.owner_id.as_deref(), owner),
        active: !room.closed,
        creation_time: timestamp(room.creation_timestamp),
        last_owner_activity: v2.int("lastOwnerActivity"),
        session_type,
        pp_author_name: author.name,
        pp_author_mail: author.mail,
        pp_university: author.organization_name,
        pp_logo: author.organization_logo,
        pp_faculty: author.organization_unit,
        pp_description: room.description.clone(),
        pp_subject,
        pp_level,
        pp_license,
        features: legacy::RoomFeatures {
            lecture: settings.questions_enabled,
            jitt: settings.preparation_enabled,
            feedback: settings.feedback_enabled,
            interposed: settings.comments_enabled,
            pi: settings.peer_instruction_enabled,
            learning_progress: settings.learning_progress_enabled,
            flashcard: settings.flashcards_enabled,
        },
        flip_flashcards: settings.flip_flashcards,
        extra: v2.unmapped(),
    }
}

/// Translate a content back.
pub fn content(content: &current::Content) -> legacy::Content {
    let possible_answers = content
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| legacy::AnswerOption {
            text: option.label.clone(),
            correct: content.correct_option_indexes.contains(&i),
            value: option.points,
        })
        .collect();

    legacy::Content {
        id: content.id.clone(),
        revision: content.revision.clone(),
        session_id: content.room_id.clone(),
        subject: content.subject.clone(),
        text: content.body.clone(),
        question_type: question_type(content.format, content.multiple, content.options.len())
            .to_string(),
        question_variant: content.group_name.clone().unwrap_or_default(),
        possible_answers,
        pi_round: content.state.round,
        active: content.state.visible,
        show_statistic: content.state.responses_visible,
        show_answer: content.state.solution_visible,
        voting_disabled: !content.state.responses_enabled,
        abstention: content.abstentions_allowed,
        timestamp: timestamp(content.creation_timestamp),
        hint: content.additional_text.clone(),
        extra: unmapped(&content.extensions),
    }
}

fn option_label(content: &current::Content, index: usize) -> Result<String, TranslateError> {
    content
        .options
        .get(index)
        .map(|option| option.label.clone())
        .ok_or(TranslateError::IndexMismatch {
            expected: content.options.len(),
            actual: index,
        })
}

/// Join selected indexes into `1`/`0` flags, one per option.
pub fn join_flags(selected: &[usize], option_count: usize) -> Result<String, TranslateError> {
    if let Some(&index) = selected.iter().find(|&&i| i >= option_count) {
        return Err(TranslateError::IndexMismatch {
            expected: option_count,
            actual: index,
        });
    }
    let flags: Vec<&str> = (0..option_count)
        .map(|i| if selected.contains(&i) { "1" } else { "0" })
        .collect();
    Ok(flags.join(","))
}

/// Translate an answer back given the content it answers.
pub fn answer(
    answer: &current::Answer,
    content: &current::Content,
    creator: Option<&current::UserProfile>,
) -> Result<legacy::Answer, TranslateError> {
    match answer {
        current::Answer::Choice(choice) => {
            if !content.format.is_choice_based() {
                return Err(TranslateError::UnsupportedFormat {
                    code: content.format.to_string(),
                });
            }
            let indexes = &choice.selected_choice_indexes;
            let answer_text = if indexes.is_empty() {
                None
            } else if content.multiple {
                Some(join_flags(indexes, content.options.len())?)
            } else {
                Some(option_label(content, indexes[0])?)
            };
            Ok(legacy::Answer {
                id: choice.id.clone(),
                revision: choice.revision.clone(),
                question_id: choice.content_id.clone(),
                session_id: choice.room_id.clone(),
                user: login_ref(choice.creator_id.as_deref(), creator),
                answer_subject: None,
                abstention: answer_text.is_none(),
                answer_text,
                pi_round: choice.round,
                timestamp: timestamp(choice.creation_timestamp),
                extra: unmapped(&choice.extensions),
            })
        }
        current::Answer::Text(text) => {
            if content.format != Format::Text {
                return Err(TranslateError::UnsupportedFormat {
                    code: content.format.to_string(),
                });
            }
            Ok(legacy::Answer {
                id: text.id.clone(),
                revision: text.revision.clone(),
                question_id: text.content_id.clone(),
                session_id: text.room_id.clone(),
                user: login_ref(text.creator_id.as_deref(), creator),
                answer_subject: text.subject.clone(),
                answer_text: text.body.clone(),
                abstention: answer.is_abstention(),
                pi_round: text.round,
                timestamp: timestamp(text.creation_timestamp),
                extra: unmapped(&text.extensions),
            })
        }
    }
}

/// Translate a comment back.
pub fn comment(
    comment: &current::Comment,
    creator: Option<&current::UserProfile>,
) -> legacy::Comment {
    legacy::Comment {
        id: comment.id.clone(),
        revision: comment.revision.clone(),
        session_id: comment.room_id.clone(),
        creator: login_ref(comment.creator_id.as_deref(), creator),
        subject: comment.subject.clone(),
        text: comment.body.clone(),
        timestamp: timestamp(comment.creation_timestamp),
        read: comment.read,
        extra: unmapped(&comment.extensions),
    }
}

/// Translate a message of the day back.
pub fn motd(motd: &current::Motd) -> legacy::Motd {
    let v2 = LegacyFields::of(&motd.extensions);
    let session_id = match motd.audience {
        Audience::Room => motd.room_id.clone(),
        _ => v2.string("sessionId"),
    };

    legacy::Motd {
        id: motd.id.clone(),
        revision: motd.revision.clone(),
        motdkey: v2.string("motdkey"),
        title: motd.title.clone(),
        text: motd.body.clone(),
        audience: audience(motd.audience).to_string(),
        session_id,
        startdate: timestamp(motd.start_date),
        enddate: timestamp(motd.end_date),
        extra: v2.unmapped(),
    }
}

/// Split a profile back into its legacy account, login and motd records.
pub fn user_profile(profile: &current::UserProfile) -> legacy::UserRecords {
    let v2 = LegacyFields::of(&profile.extensions);
    let account = profile.account.clone().unwrap_or_default();

    let user = legacy::User {
        id: profile.id.clone(),
        revision: profile.revision.clone(),
        username: profile.login_id.clone(),
        creation: timestamp(profile.creation_timestamp),
        last_login: timestamp(profile.last_login_timestamp),
        password: account.password,
        activation_key: account.activation_key,
        password_reset_key: account.password_reset_key,
        password_reset_time: timestamp(account.password_reset_time),
        extra: v2.unmapped(),
    };

    let logged_in_meta = LegacyFields(v2.get("loggedIn").and_then(Value::as_object));
    let logged_in = (logged_in_meta.0.is_some() || !profile.room_history.is_empty()).then(|| {
        legacy::LoggedIn {
            id: logged_in_meta
                .string("id")
                .unwrap_or_else(|| format!("{}-logged-in", profile.id)),
            revision: logged_in_meta.string("rev"),
            user: profile.login_id.clone(),
            timestamp: logged_in_meta.int("timestamp"),
            visited_sessions: profile
                .room_history
                .iter()
                .map(|entry| legacy::VisitedRoom {
                    id: entry.room_id.clone(),
                    name: entry.name.clone(),
                    keyword: entry.short_id.clone(),
                })
                .collect(),
            extra: logged_in_meta.unmapped(),
        }
    });

    let motd_list_meta = LegacyFields(v2.get("motdList").and_then(Value::as_object));
    let motd_list = (motd_list_meta.0.is_some() || !profile.acknowledged_motds.is_empty()).then(
        || legacy::MotdList {
            id: motd_list_meta
                .string("id")
                .unwrap_or_else(|| format!("{}-motdlist", profile.id)),
            revision: motd_list_meta.string("rev"),
            username: profile.login_id.clone(),
            motdkeys: profile.acknowledged_motds.join(","),
            extra: motd_list_meta.unmapped(),
        },
    );

    legacy::UserRecords {
        user,
        logged_in,
        motd_list,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(options: usize) -> current::Content {
        current::Content {
            id: "c1".into(),
            revision: None,
            creation_timestamp: None,
            update_timestamp: None,
            room_id: "r1".into(),
            subject: String::new(),
            body: String::new(),
            format: Format::Scale,
            group_name: None,
            options: (0..options)
                .map(|i| current::ChoiceOption {
                    label: i.to_string(),
                    points: 0,
                })
                .collect(),
            correct_option_indexes: Vec::new(),
            multiple: false,
            state: Default::default(),
            additional_text: None,
            abstentions_allowed: false,
            extensions: Extensions::new(),
        }
    }

    #[test]
    fn test_scale_codes_follow_option_count() {
        assert_eq!(content(&scale(5)).question_type, "vote");
        assert_eq!(content(&scale(6)).question_type, "school");
        assert_eq!(content(&scale(4)).question_type, "abcd");
    }

    #[test]
    fn test_join_flags() {
        assert_eq!(join_flags(&[0, 2], 3).unwrap(), "1,0,1");
        assert_eq!(join_flags(&[], 2).unwrap(), "0,0");
        assert_eq!(
            join_flags(&[3], 3),
            Err(TranslateError::IndexMismatch {
                expected: 3,
                actual: 3
            })
        );
    }

    #[test]
    fn test_single_choice_out_of_range() {
        let content = scale(5);
        let answer = current::Answer::Choice(current::ChoiceAnswer {
            id: "a1".into(),
            content_id: "c1".into(),
            room_id: "r1".into(),
            selected_choice_indexes: vec![7],
            ..Default::default()
        });
        assert_eq!(
            super::answer(&answer, &content, None),
            Err(TranslateError::IndexMismatch {
                expected: 5,
                actual: 7
            })
        );
    }

    #[test]
    fn test_text_answer_for_choice_content() {
        let answer = current::Answer::Text(current::TextAnswer::default());
        assert!(matches!(
            super::answer(&answer, &scale(5), None),
            Err(TranslateError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_unmapped_fields_are_written_back() {
        let mut content = scale(5);
        content.extensions.insert(
            V2_EXTENSION.to_string(),
            serde_json::json!({ "unmapped": { "correctAnswer": "2", "imageQuestion": false } }),
        );
        let legacy = super::content(&content);
        assert_eq!(legacy.extra["correctAnswer"], "2");
        assert_eq!(legacy.extra["imageQuestion"], false);

        let body = serde_json::to_value(&legacy).unwrap();
        assert_eq!(body["correctAnswer"], "2");
        assert!(body.get(V2_EXTENSION).is_none());
    }

    #[test]
    fn test_profile_without_secondary_records() {
        let profile = current::UserProfile {
            id: "u1".into(),
            login_id: "ada".into(),
            ..Default::default()
        };
        let records = user_profile(&profile);
        assert_eq!(records.user.username, "ada");
        assert!(records.logged_in.is_none());
        assert!(records.motd_list.is_none());
    }
}
