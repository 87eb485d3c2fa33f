//! Legacy to current translation.
//!
//! Every function is pure. Related entities are passed in by the caller.
//! User references are resolved to profile ids when the profile is known and
//! otherwise keep the legacy login as the id. Body fields a legacy record
//! does not model end up under [`UNMAPPED`] in `extensions["v2"]`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use docshift_model::current::{self, Extensions};
use docshift_model::legacy::{self, audience, question_type};
use docshift_model::{Audience, Format, V2_EXTENSION};

use crate::store::TYPE_FIELD;

use super::error::TranslateError;

/// Key of the unmodeled legacy body fields inside `extensions["v2"]`.
pub const UNMAPPED: &str = "unmapped";

/// Convert epoch milliseconds, treating `0` as unset.
pub fn timestamp(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
}

/// Map a legacy question type to a format and its `multiple` flag.
pub fn format(code: &str) -> Result<(Format, bool), TranslateError> {
    match code {
        question_type::ABCD | question_type::SINGLE_CHOICE => Ok((Format::Choice, false)),
        question_type::MULTIPLE_CHOICE => Ok((Format::Choice, true)),
        question_type::VOTE | question_type::SCHOOL => Ok((Format::Scale, false)),
        question_type::YES_NO => Ok((Format::Binary, false)),
        question_type::FREETEXT => Ok((Format::Text, false)),
        question_type::FLASHCARD => Ok((Format::Flashcard, false)),
        other => Err(TranslateError::UnsupportedFormat {
            code: other.to_string(),
        }),
    }
}

/// Map a legacy motd audience.
pub fn audience(value: &str) -> Result<Audience, TranslateError> {
    match value {
        audience::ALL => Ok(Audience::All),
        audience::LOGGED_IN => Ok(Audience::Authenticated),
        audience::TUTORS => Ok(Audience::Authors),
        audience::STUDENTS => Ok(Audience::Participants),
        audience::SESSION => Ok(Audience::Room),
        other => Err(TranslateError::UnsupportedAudience {
            value: other.to_string(),
        }),
    }
}

fn user_ref(login: Option<&str>, profile: Option<&current::UserProfile>) -> Option<String> {
    profile
        .map(|p| p.id.clone())
        .or_else(|| login.map(str::to_string))
}

/// Collects legacy-only fields for `extensions["v2"]`.
#[derive(Default)]
struct LegacyFields(Map<String, Value>);

impl LegacyFields {
    fn put(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    fn put_opt(&mut self, key: &str, value: &Option<String>) {
        if let Some(value) = value {
            self.put(key, value.clone());
        }
    }

    fn put_unmapped(&mut self, extra: &legacy::Extra) {
        if let Some(fields) = unmapped(extra) {
            self.put(UNMAPPED, fields);
        }
    }

    fn into_extensions(self) -> Extensions {
        let mut extensions = Extensions::new();
        if !self.0.is_empty() {
            extensions.insert(V2_EXTENSION.to_string(), Value::Object(self.0));
        }
        extensions
    }
}

/// Unmodeled fields of a legacy record, without the document type.
fn unmapped(extra: &legacy::Extra) -> Option<Value> {
    let fields: Map<String, Value> = extra
        .iter()
        .filter(|(key, _)| key.as_str() != TYPE_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (!fields.is_empty()).then_some(Value::Object(fields))
}

/// Collect only the unmodeled fields of `extra`.
fn unmapped_extensions(extra: &legacy::Extra) -> Extensions {
    let mut v2 = LegacyFields::default();
    v2.put_unmapped(extra);
    v2.into_extensions()
}

/// Translate a room. `owner` is the profile of the room's creator.
pub fn room(room: &legacy::Room, owner: Option<&current::UserProfile>) -> current::Room {
    let mut v2 = LegacyFields::default();
    if room.last_owner_activity != 0 {
        v2.put("lastOwnerActivity", room.last_owner_activity);
    }

    let is_pool = room.session_type.as_deref() == Some(legacy::PUBLIC_POOL);
    let pool_properties = if is_pool {
        Some(current::PoolProperties {
            category: room.pp_subject.clone(),
            level: room.pp_level.clone(),
            license: room.pp_license.clone(),
        })
    } else {
        v2.put_opt("sessionType", &room.session_type);
        v2.put_opt("ppSubject", &room.pp_subject);
        v2.put_opt("ppLevel", &room.pp_level);
        v2.put_opt("ppLicense", &room.pp_license);
        None
    };
    v2.put_unmapped(&room.extra);

    let author = current::Author {
        name: room.pp_author_name.clone(),
        mail: room.pp_author_mail.clone(),
        organization_name: room.pp_university.clone(),
        organization_logo: room.pp_logo.clone(),
        organization_unit: room.pp_faculty.clone(),
    };
    let author = (author != current::Author::default()).then_some(author);

    let features = &room.features;
    current::Room {
        id: room.id.clone(),
        revision: room.revision.clone(),
        creation_timestamp: timestamp(room.creation_time),
        update_timestamp: None,
        short_id: room.keyword.clone(),
        owner_id: user_ref(room.creator.as_deref(), owner),
        name: room.name.clone(),
        abbreviation: room.short_name.clone(),
        description: room.pp_description.clone(),
        closed: !room.active,
        settings: current::RoomSettings {
            questions_enabled: features.lecture,
            preparation_enabled: features.jitt,
            feedback_enabled: features.feedback,
            comments_enabled: features.interposed,
            peer_instruction_enabled: features.pi,
            learning_progress_enabled: features.learning_progress,
            flashcards_enabled: features.flashcard,
            flip_flashcards: room.flip_flashcards,
        },
        author,
        pool_properties,
        extensions: v2.into_extensions(),
    }
}

/// Translate a content.
///
/// Legacy `sc` becomes a non-multiple CHOICE and therefore comes back as
/// `abcd`.
pub fn content(content: &legacy::Content) -> Result<current::Content, TranslateError> {
    let (format, multiple) = format(&content.question_type)?;
    let options = content
        .possible_answers
        .iter()
        .map(|option| current::ChoiceOption {
            label: option.text.clone(),
            points: option.value,
        })
        .collect();
    let correct_option_indexes = content
        .possible_answers
        .iter()
        .enumerate()
        .filter(|(_, option)| option.correct)
        .map(|(i, _)| i)
        .collect();

    Ok(current::Content {
        id: content.id.clone(),
        revision: content.revision.clone(),
        creation_timestamp: timestamp(content.timestamp),
        update_timestamp: None,
        room_id: content.session_id.clone(),
        subject: content.subject.clone(),
        body: content.text.clone(),
        format,
        group_name: (!content.question_variant.is_empty())
            .then(|| content.question_variant.clone()),
        options,
        correct_option_indexes,
        multiple,
        state: current::ContentState {
            round: content.pi_round,
            visible: content.active,
            responses_visible: content.show_statistic,
            solution_visible: content.show_answer,
            responses_enabled: !content.voting_disabled,
        },
        additional_text: content.hint.clone(),
        abstentions_allowed: content.abstention,
        extensions: unmapped_extensions(&content.extra),
    })
}

/// Parse comma-joined `1`/`0` flags into selected option indexes.
pub fn parse_flags(flags: &str, option_count: usize) -> Result<Vec<usize>, TranslateError> {
    let flags: Vec<&str> = flags.split(',').map(str::trim).collect();
    if flags.len() != option_count {
        return Err(TranslateError::IndexMismatch {
            expected: option_count,
            actual: flags.len(),
        });
    }
    Ok(flags
        .iter()
        .enumerate()
        .filter(|(_, flag)| **flag == "1")
        .map(|(i, _)| i)
        .collect())
}

/// Translate an answer given the (legacy) content it answers.
///
/// Callers validate the answer first; an abstention never carries a
/// response here. A single-choice response that matches no option label is
/// treated as an abstention.
pub fn answer(
    answer: &legacy::Answer,
    content: &legacy::Content,
    creator: Option<&current::UserProfile>,
) -> Result<current::Answer, TranslateError> {
    let (format, multiple) = format(&content.question_type)?;
    let creator_id = user_ref(answer.user.as_deref(), creator);
    let creation_timestamp = timestamp(answer.timestamp);

    match format {
        Format::Flashcard => Err(TranslateError::UnsupportedFormat {
            code: content.question_type.clone(),
        }),
        Format::Text => {
            let (subject, body) = if answer.abstention {
                (None, None)
            } else {
                (answer.answer_subject.clone(), answer.answer_text.clone())
            };
            Ok(current::Answer::Text(current::TextAnswer {
                id: answer.id.clone(),
                revision: answer.revision.clone(),
                creation_timestamp,
                content_id: answer.question_id.clone(),
                room_id: answer.session_id.clone(),
                creator_id,
                round: answer.pi_round,
                subject,
                body,
                extensions: unmapped_extensions(&answer.extra),
            }))
        }
        Format::Choice | Format::Scale | Format::Binary => {
            let text = answer.answer_text.as_deref().unwrap_or_default();
            let selected_choice_indexes = if answer.abstention {
                Vec::new()
            } else if multiple {
                parse_flags(text, content.possible_answers.len())?
            } else {
                content
                    .possible_answers
                    .iter()
                    .position(|option| option.text == text)
                    .into_iter()
                    .collect()
            };
            Ok(current::Answer::Choice(current::ChoiceAnswer {
                id: answer.id.clone(),
                revision: answer.revision.clone(),
                creation_timestamp,
                content_id: answer.question_id.clone(),
                room_id: answer.session_id.clone(),
                creator_id,
                round: answer.pi_round,
                selected_choice_indexes,
                extensions: unmapped_extensions(&answer.extra),
            }))
        }
    }
}

/// Translate a comment.
pub fn comment(
    comment: &legacy::Comment,
    creator: Option<&current::UserProfile>,
) -> current::Comment {
    current::Comment {
        id: comment.id.clone(),
        revision: comment.revision.clone(),
        creation_timestamp: timestamp(comment.timestamp),
        room_id: comment.session_id.clone(),
        creator_id: user_ref(comment.creator.as_deref(), creator),
        subject: comment.subject.clone(),
        body: comment.text.clone(),
        read: comment.read,
        extensions: unmapped_extensions(&comment.extra),
    }
}

/// Translate a message of the day.
pub fn motd(motd: &legacy::Motd) -> Result<current::Motd, TranslateError> {
    let audience = audience(&motd.audience)?;
    let mut v2 = LegacyFields::default();
    v2.put_opt("motdkey", &motd.motdkey);

    let room_id = if audience == Audience::Room {
        motd.session_id.clone()
    } else {
        v2.put_opt("sessionId", &motd.session_id);
        None
    };
    v2.put_unmapped(&motd.extra);

    Ok(current::Motd {
        id: motd.id.clone(),
        revision: motd.revision.clone(),
        start_date: timestamp(motd.startdate),
        end_date: timestamp(motd.enddate),
        title: motd.title.clone(),
        body: motd.text.clone(),
        audience,
        room_id,
        extensions: v2.into_extensions(),
    })
}

/// Merge a legacy account with its login and motd records into one profile.
pub fn user_profile(records: &legacy::UserRecords) -> current::UserProfile {
    let user = &records.user;
    let mut v2 = LegacyFields::default();
    v2.put_unmapped(&user.extra);

    let account = current::Account {
        password: user.password.clone(),
        activation_key: user.activation_key.clone(),
        password_reset_key: user.password_reset_key.clone(),
        password_reset_time: timestamp(user.password_reset_time),
    };
    let account = (account != current::Account::default()).then_some(account);

    let room_history = match &records.logged_in {
        Some(logged_in) => {
            let mut meta = serde_json::json!({
                "id": logged_in.id,
                "rev": logged_in.revision,
                "timestamp": logged_in.timestamp,
            });
            if let Some(fields) = unmapped(&logged_in.extra) {
                meta[UNMAPPED] = fields;
            }
            v2.put("loggedIn", meta);
            logged_in
                .visited_sessions
                .iter()
                .map(|visited| current::RoomHistoryEntry {
                    room_id: visited.id.clone(),
                    short_id: visited.keyword.clone(),
                    name: visited.name.clone(),
                })
                .collect()
        }
        None => Vec::new(),
    };

    let acknowledged_motds = match &records.motd_list {
        Some(list) => {
            let mut meta = serde_json::json!({ "id": list.id, "rev": list.revision });
            if let Some(fields) = unmapped(&list.extra) {
                meta[UNMAPPED] = fields;
            }
            v2.put("motdList", meta);
            list.motdkeys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect()
        }
        None => Vec::new(),
    };

    current::UserProfile {
        id: user.id.clone(),
        revision: user.revision.clone(),
        creation_timestamp: timestamp(user.creation),
        update_timestamp: None,
        auth_provider: current::LEGACY_AUTH_PROVIDER.to_string(),
        login_id: user.username.clone(),
        last_login_timestamp: timestamp(user.last_login),
        account,
        room_history,
        acknowledged_motds,
        extensions: v2.into_extensions(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(labels: &[&str]) -> Vec<legacy::AnswerOption> {
        labels
            .iter()
            .map(|label| legacy::AnswerOption {
                text: label.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn content(code: &str, labels: &[&str]) -> legacy::Content {
        legacy::Content {
            id: "c1".into(),
            session_id: "r1".into(),
            question_type: code.into(),
            possible_answers: options(labels),
            ..Default::default()
        }
    }

    fn choice_answer(text: &str) -> legacy::Answer {
        legacy::Answer {
            id: "a1".into(),
            question_id: "c1".into(),
            session_id: "r1".into(),
            answer_text: Some(text.into()),
            ..Default::default()
        }
    }

    fn selected(answer: current::Answer) -> Vec<usize> {
        match answer {
            current::Answer::Choice(choice) => choice.selected_choice_indexes,
            other => panic!("expected choice answer, got {other:?}"),
        }
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(format("abcd").unwrap(), (Format::Choice, false));
        assert_eq!(format("sc").unwrap(), (Format::Choice, false));
        assert_eq!(format("mc").unwrap(), (Format::Choice, true));
        assert_eq!(format("vote").unwrap().0, Format::Scale);
        assert_eq!(format("school").unwrap().0, Format::Scale);
        assert_eq!(format("yesno").unwrap().0, Format::Binary);
        assert_eq!(format("freetext").unwrap().0, Format::Text);
        assert_eq!(format("flashcard").unwrap().0, Format::Flashcard);
        assert_eq!(
            format("grid"),
            Err(TranslateError::UnsupportedFormat {
                code: "grid".into()
            })
        );
    }

    #[test]
    fn test_multi_select_flags() {
        let mc = content("mc", &["A", "B", "C"]);
        let parsed = answer(&choice_answer("1,0,1"), &mc, None).unwrap();
        assert_eq!(selected(parsed), vec![0, 2]);

        assert_eq!(
            answer(&choice_answer("1,0"), &mc, None),
            Err(TranslateError::IndexMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_single_select_by_label() {
        let abcd = content("abcd", &["A", "B", "C"]);
        assert_eq!(selected(answer(&choice_answer("B"), &abcd, None).unwrap()), vec![1]);
        // Unknown label reads as abstention.
        assert!(selected(answer(&choice_answer("Z"), &abcd, None).unwrap()).is_empty());
    }

    #[test]
    fn test_abstention_maps_to_empty_response() {
        let abcd = content("abcd", &["A", "B"]);
        let abstention = legacy::Answer {
            abstention: true,
            answer_text: None,
            ..choice_answer("")
        };
        assert!(answer(&abstention, &abcd, None).unwrap().is_abstention());

        let text = content("freetext", &[]);
        assert!(answer(&abstention, &text, None).unwrap().is_abstention());
    }

    #[test]
    fn test_flashcard_answers_are_rejected() {
        let card = content("flashcard", &[]);
        assert!(matches!(
            answer(&choice_answer("x"), &card, None),
            Err(TranslateError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_answer_creator_resolution() {
        let abcd = content("abcd", &["A"]);
        let profile = current::UserProfile {
            id: "p1".into(),
            login_id: "ada".into(),
            ..Default::default()
        };
        let mut legacy_answer = choice_answer("A");
        legacy_answer.user = Some("ada".into());

        let with_profile = answer(&legacy_answer, &abcd, Some(&profile)).unwrap();
        let without = answer(&legacy_answer, &abcd, None).unwrap();
        match (with_profile, without) {
            (current::Answer::Choice(a), current::Answer::Choice(b)) => {
                assert_eq!(a.creator_id.as_deref(), Some("p1"));
                assert_eq!(b.creator_id.as_deref(), Some("ada"));
            }
            other => panic!("unexpected answers: {other:?}"),
        }
    }

    #[test]
    fn test_room_pool_and_author() {
        let room = legacy::Room {
            id: "r1".into(),
            name: "Physics".into(),
            keyword: "12345678".into(),
            active: true,
            creation_time: 1_500_000_000_000,
            session_type: Some(legacy::PUBLIC_POOL.into()),
            pp_subject: Some("Science".into()),
            pp_university: Some("Uni".into()),
            ..Default::default()
        };
        let translated = super::room(&room, None);

        assert_eq!(translated.short_id, "12345678");
        assert!(!translated.closed);
        assert_eq!(
            translated.pool_properties.unwrap().category.as_deref(),
            Some("Science")
        );
        assert_eq!(
            translated.author.unwrap().organization_name.as_deref(),
            Some("Uni")
        );
        assert!(translated.extensions.is_empty());
        assert_eq!(
            translated.creation_timestamp.unwrap().timestamp_millis(),
            1_500_000_000_000
        );
    }

    #[test]
    fn test_motd_audiences() {
        let mut motd = legacy::Motd {
            id: "m1".into(),
            audience: "session".into(),
            session_id: Some("r1".into()),
            motdkey: Some("k1".into()),
            ..Default::default()
        };
        let translated = super::motd(&motd).unwrap();
        assert_eq!(translated.audience, Audience::Room);
        assert_eq!(translated.room_id.as_deref(), Some("r1"));
        assert_eq!(translated.extensions[V2_EXTENSION]["motdkey"], "k1");

        motd.audience = "everyone".into();
        assert_eq!(
            super::motd(&motd),
            Err(TranslateError::UnsupportedAudience {
                value: "everyone".into()
            })
        );
    }

    #[test]
    fn test_user_profile_merges_records() {
        let records = legacy::UserRecords {
            user: legacy::User {
                id: "u1".into(),
                username: "ada".into(),
                password: Some("hash".into()),
                ..Default::default()
            },
            logged_in: Some(legacy::LoggedIn {
                id: "l1".into(),
                user: "ada".into(),
                visited_sessions: vec![legacy::VisitedRoom {
                    id: "r1".into(),
                    name: "Physics".into(),
                    keyword: "12345678".into(),
                }],
                ..Default::default()
            }),
            motd_list: Some(legacy::MotdList {
                id: "ml1".into(),
                username: "ada".into(),
                motdkeys: "k1,k2,".into(),
                ..Default::default()
            }),
        };
        let profile = user_profile(&records);

        assert_eq!(profile.login_id, "ada");
        assert_eq!(profile.account.unwrap().password.as_deref(), Some("hash"));
        assert_eq!(profile.room_history[0].short_id, "12345678");
        assert_eq!(profile.acknowledged_motds, vec!["k1", "k2"]);
        assert_eq!(profile.extensions[V2_EXTENSION]["loggedIn"]["id"], "l1");
    }

    #[test]
    fn test_unmodeled_fields_move_to_extensions() {
        let mut room = legacy::Room {
            id: "r1".into(),
            name: "Physics".into(),
            keyword: "12345678".into(),
            ..Default::default()
        };
        room.extra.insert("type".into(), "session".into());
        room.extra.insert("courseId".into(), "C-42".into());
        room.extra.insert("courseType".into(), "lecture".into());

        let translated = super::room(&room, None);
        let fields = &translated.extensions[V2_EXTENSION][UNMAPPED];
        assert_eq!(fields["courseId"], "C-42");
        assert_eq!(fields["courseType"], "lecture");
        assert!(fields.get("type").is_none());

        // A type-only extra leaves no trace.
        let mut plain = content("abcd", &["A"]);
        plain.extra.insert("type".into(), "skill_question".into());
        assert!(super::content(&plain).unwrap().extensions.is_empty());
    }

    #[test]
    fn test_unmodeled_profile_fields_stay_with_their_record() {
        let mut logged_in = legacy::LoggedIn {
            id: "l1".into(),
            user: "ada".into(),
            ..Default::default()
        };
        logged_in.extra.insert("sessionCount".into(), 3.into());
        let mut user = legacy::User {
            id: "u1".into(),
            username: "ada".into(),
            ..Default::default()
        };
        user.extra.insert("displayName".into(), "Ada".into());

        let profile = user_profile(&legacy::UserRecords {
            user,
            logged_in: Some(logged_in),
            motd_list: None,
        });
        let v2 = &profile.extensions[V2_EXTENSION];
        assert_eq!(v2[UNMAPPED]["displayName"], "Ada");
        assert_eq!(v2["loggedIn"][UNMAPPED]["sessionCount"], 3);
        assert!(v2[UNMAPPED].get("sessionCount").is_none());
    }

    #[test]
    fn test_zero_timestamp_is_unset() {
        assert!(timestamp(0).is_none());
        assert_eq!(timestamp(1_000).unwrap().timestamp_millis(), 1_000);
    }
}
