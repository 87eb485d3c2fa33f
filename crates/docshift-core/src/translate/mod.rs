//! Entity version translation.
//!
//! [`to_current`] and [`to_legacy`] hold one pure function per entity type.
//! [`Translator`] dispatches over the closed [`LegacyEntity`] and
//! [`CurrentEntity`] sums and resolves related entities (the content an
//! answer refers to, the profile behind a login) through [`RelatedLookup`].

mod error;
pub mod to_current;
pub mod to_legacy;

pub use error::TranslateError;

use docshift_model::{current, legacy, EntityKind};

/// An entity in its legacy shape.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyEntity {
    Room(legacy::Room),
    Content(legacy::Content),
    Answer(legacy::Answer),
    Comment(legacy::Comment),
    Motd(legacy::Motd),
    UserProfile(legacy::UserRecords),
}

impl LegacyEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            LegacyEntity::Room(_) => EntityKind::Room,
            LegacyEntity::Content(_) => EntityKind::Content,
            LegacyEntity::Answer(_) => EntityKind::Answer,
            LegacyEntity::Comment(_) => EntityKind::Comment,
            LegacyEntity::Motd(_) => EntityKind::Motd,
            LegacyEntity::UserProfile(_) => EntityKind::UserProfile,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LegacyEntity::Room(e) => &e.id,
            LegacyEntity::Content(e) => &e.id,
            LegacyEntity::Answer(e) => &e.id,
            LegacyEntity::Comment(e) => &e.id,
            LegacyEntity::Motd(e) => &e.id,
            LegacyEntity::UserProfile(e) => &e.user.id,
        }
    }
}

/// An entity in its current shape.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentEntity {
    Room(current::Room),
    Content(current::Content),
    Answer(current::Answer),
    Comment(current::Comment),
    Motd(current::Motd),
    UserProfile(current::UserProfile),
}

impl CurrentEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            CurrentEntity::Room(_) => EntityKind::Room,
            CurrentEntity::Content(_) => EntityKind::Content,
            CurrentEntity::Answer(_) => EntityKind::Answer,
            CurrentEntity::Comment(_) => EntityKind::Comment,
            CurrentEntity::Motd(_) => EntityKind::Motd,
            CurrentEntity::UserProfile(_) => EntityKind::UserProfile,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CurrentEntity::Room(e) => &e.id,
            CurrentEntity::Content(e) => &e.id,
            CurrentEntity::Answer(e) => e.id(),
            CurrentEntity::Comment(e) => &e.id,
            CurrentEntity::Motd(e) => &e.id,
            CurrentEntity::UserProfile(e) => &e.id,
        }
    }
}

/// Resolves entities that a translation depends on.
pub trait RelatedLookup {
    /// The content with `id`, in legacy shape regardless of how it is stored.
    fn legacy_content(&self, id: &str) -> Result<Option<legacy::Content>, TranslateError>;

    /// The content with `id`, in current shape regardless of how it is stored.
    fn current_content(&self, id: &str) -> Result<Option<current::Content>, TranslateError>;

    /// The current profile of a legacy login.
    fn profile_by_login(&self, login: &str)
        -> Result<Option<current::UserProfile>, TranslateError>;

    /// The current profile with `id`.
    fn profile(&self, id: &str) -> Result<Option<current::UserProfile>, TranslateError>;
}

/// Dispatches translations and resolves related entities.
pub struct Translator<'a> {
    lookup: &'a dyn RelatedLookup,
}

impl<'a> Translator<'a> {
    pub fn new(lookup: &'a dyn RelatedLookup) -> Self {
        Self { lookup }
    }

    /// Translate a legacy entity to its current shape.
    pub fn upgrade(&self, entity: &LegacyEntity) -> Result<CurrentEntity, TranslateError> {
        Ok(match entity {
            LegacyEntity::Room(room) => {
                let owner = self.profile_by_login(room.creator.as_deref())?;
                CurrentEntity::Room(to_current::room(room, owner.as_ref()))
            }
            LegacyEntity::Content(content) => {
                CurrentEntity::Content(to_current::content(content)?)
            }
            LegacyEntity::Answer(answer) => {
                let content = self.lookup.legacy_content(&answer.question_id)?.ok_or_else(|| {
                    TranslateError::MissingRelated {
                        kind: EntityKind::Content,
                        id: answer.question_id.clone(),
                    }
                })?;
                let creator = self.profile_by_login(answer.user.as_deref())?;
                CurrentEntity::Answer(to_current::answer(answer, &content, creator.as_ref())?)
            }
            LegacyEntity::Comment(comment) => {
                let creator = self.profile_by_login(comment.creator.as_deref())?;
                CurrentEntity::Comment(to_current::comment(comment, creator.as_ref()))
            }
            LegacyEntity::Motd(motd) => CurrentEntity::Motd(to_current::motd(motd)?),
            LegacyEntity::UserProfile(records) => {
                CurrentEntity::UserProfile(to_current::user_profile(records))
            }
        })
    }

    /// Translate a current entity back to its legacy shape.
    pub fn downgrade(&self, entity: &CurrentEntity) -> Result<LegacyEntity, TranslateError> {
        Ok(match entity {
            CurrentEntity::Room(room) => {
                let owner = self.profile(room.owner_id.as_deref())?;
                LegacyEntity::Room(to_legacy::room(room, owner.as_ref()))
            }
            CurrentEntity::Content(content) => LegacyEntity::Content(to_legacy::content(content)),
            CurrentEntity::Answer(answer) => {
                let content = self
                    .lookup
                    .current_content(answer.content_id())?
                    .ok_or_else(|| TranslateError::MissingRelated {
                        kind: EntityKind::Content,
                        id: answer.content_id().to_string(),
                    })?;
                let creator_id = match answer {
                    current::Answer::Choice(a) => a.creator_id.as_deref(),
                    current::Answer::Text(a) => a.creator_id.as_deref(),
                };
                let creator = self.profile(creator_id)?;
                LegacyEntity::Answer(to_legacy::answer(answer, &content, creator.as_ref())?)
            }
            CurrentEntity::Comment(comment) => {
                let creator = self.profile(comment.creator_id.as_deref())?;
                LegacyEntity::Comment(to_legacy::comment(comment, creator.as_ref()))
            }
            CurrentEntity::Motd(motd) => LegacyEntity::Motd(to_legacy::motd(motd)),
            CurrentEntity::UserProfile(profile) => {
                LegacyEntity::UserProfile(to_legacy::user_profile(profile))
            }
        })
    }

    fn profile_by_login(
        &self,
        login: Option<&str>,
    ) -> Result<Option<current::UserProfile>, TranslateError> {
        match login {
            Some(login) => self.lookup.profile_by_login(login),
            None => Ok(None),
        }
    }

    fn profile(&self, id: Option<&str>) -> Result<Option<current::UserProfile>, TranslateError> {
        match id {
            Some(id) => self.lookup.profile(id),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshift_model::Format;
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory lookup over a fixed set of entities.
    #[derive(Default)]
    struct Fixtures {
        contents: HashMap<String, legacy::Content>,
        profiles: Vec<current::UserProfile>,
    }

    impl RelatedLookup for Fixtures {
        fn legacy_content(&self, id: &str) -> Result<Option<legacy::Content>, TranslateError> {
            Ok(self.contents.get(id).cloned())
        }

        fn current_content(&self, id: &str) -> Result<Option<current::Content>, TranslateError> {
            self.contents
                .get(id)
                .map(to_current::content)
                .transpose()
        }

        fn profile_by_login(
            &self,
            login: &str,
        ) -> Result<Option<current::UserProfile>, TranslateError> {
            Ok(self.profiles.iter().find(|p| p.login_id == login).cloned())
        }

        fn profile(&self, id: &str) -> Result<Option<current::UserProfile>, TranslateError> {
            Ok(self.profiles.iter().find(|p| p.id == id).cloned())
        }
    }

    fn fixtures() -> Fixtures {
        let mut contents = HashMap::new();
        for (id, code, labels) in [
            ("mc", "mc", vec!["A", "B", "C"]),
            ("abcd", "abcd", vec!["A", "B", "C"]),
            ("text", "freetext", vec![]),
        ] {
            contents.insert(
                id.to_string(),
                legacy::Content {
                    id: id.into(),
                    session_id: "r1".into(),
                    question_type: code.into(),
                    possible_answers: labels
                        .into_iter()
                        .map(|label| legacy::AnswerOption {
                            text: label.into(),
                            correct: label == "A",
                            value: 10,
                        })
                        .collect(),
                    ..Default::default()
                },
            );
        }
        Fixtures {
            contents,
            profiles: vec![current::UserProfile {
                id: "p-ada".into(),
                auth_provider: current::LEGACY_AUTH_PROVIDER.into(),
                login_id: "ada".into(),
                ..Default::default()
            }],
        }
    }

    fn round_trip(translator: &Translator<'_>, entity: LegacyEntity) -> LegacyEntity {
        let upgraded = translator.upgrade(&entity).unwrap();
        assert_eq!(upgraded.kind(), entity.kind());
        assert_eq!(upgraded.id(), entity.id());
        translator.downgrade(&upgraded).unwrap()
    }

    #[test]
    fn test_room_round_trip() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        let room = LegacyEntity::Room(legacy::Room {
            id: "r1".into(),
            revision: Some("3-abc".into()),
            name: "Physics".into(),
            short_name: "PHY".into(),
            keyword: "12345678".into(),
            creator: Some("ada".into()),
            active: true,
            creation_time: 1_500_000_000_123,
            last_owner_activity: 1_500_000_100_000,
            session_type: Some("training".into()),
            pp_author_name: Some("Ada".into()),
            pp_description: Some("Mechanics".into()),
            pp_level: Some("bachelor".into()),
            features: legacy::RoomFeatures {
                lecture: true,
                interposed: true,
                ..Default::default()
            },
            flip_flashcards: true,
            ..Default::default()
        });

        let upgraded = translator.upgrade(&room).unwrap();
        match &upgraded {
            CurrentEntity::Room(current) => {
                assert_eq!(current.owner_id.as_deref(), Some("p-ada"));
                assert!(current.settings.comments_enabled);
                assert!(current.pool_properties.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(translator.downgrade(&upgraded).unwrap(), room);
    }

    #[test]
    fn test_content_round_trip() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        let mut content = lookup.contents["mc"].clone();
        content.question_variant = "lecture".into();
        content.hint = Some("think".into());
        content.pi_round = 2;
        content.timestamp = 1_600_000_000_000;
        content.show_statistic = true;

        let entity = LegacyEntity::Content(content);
        assert_eq!(round_trip(&translator, entity.clone()), entity);
    }

    #[test]
    fn test_scale_normalization_is_asserted() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        let content = legacy::Content {
            id: "s1".into(),
            session_id: "r1".into(),
            question_type: "vote".into(),
            possible_answers: (1..=4)
                .map(|i| legacy::AnswerOption {
                    text: i.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let upgraded = translator
            .upgrade(&LegacyEntity::Content(content.clone()))
            .unwrap();
        match &upgraded {
            CurrentEntity::Content(c) => assert_eq!(c.format, Format::Scale),
            other => panic!("unexpected {other:?}"),
        }
        let LegacyEntity::Content(back) = translator.downgrade(&upgraded).unwrap() else {
            panic!("expected content");
        };
        assert_eq!(back.question_type, "abcd");
        assert_eq!(
            legacy::Content {
                question_type: "vote".into(),
                ..back
            },
            content
        );
    }

    #[test]
    fn test_answer_round_trips() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        let answers = [
            ("mc", Some("1,0,1"), false),
            ("abcd", Some("B"), false),
            ("abcd", None, true),
            ("text", Some("because"), false),
            ("text", None, true),
        ];

        for (content_id, text, abstention) in answers {
            let answer = LegacyEntity::Answer(legacy::Answer {
                id: format!("a-{content_id}"),
                revision: Some("1-aa".into()),
                question_id: content_id.into(),
                session_id: "r1".into(),
                user: Some("ada".into()),
                answer_text: text.map(str::to_string),
                abstention,
                timestamp: 1_600_000_000_000,
                ..Default::default()
            });
            assert_eq!(round_trip(&translator, answer.clone()), answer);
        }
    }

    #[test]
    fn test_abstention_equivalence() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        for content_id in ["mc", "abcd", "text"] {
            let answer = LegacyEntity::Answer(legacy::Answer {
                id: "a1".into(),
                question_id: content_id.into(),
                session_id: "r1".into(),
                abstention: true,
                ..Default::default()
            });
            let CurrentEntity::Answer(upgraded) = translator.upgrade(&answer).unwrap() else {
                panic!("expected answer");
            };
            assert!(upgraded.is_abstention(), "{content_id} lost its abstention");
        }
    }

    #[test]
    fn test_answer_without_content() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        let answer = LegacyEntity::Answer(legacy::Answer {
            id: "a1".into(),
            question_id: "gone".into(),
            session_id: "r1".into(),
            ..Default::default()
        });
        assert_eq!(
            translator.upgrade(&answer),
            Err(TranslateError::MissingRelated {
                kind: EntityKind::Content,
                id: "gone".into()
            })
        );
    }

    #[test]
    fn test_comment_motd_profile_round_trips() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        let entities = [
            LegacyEntity::Comment(legacy::Comment {
                id: "q1".into(),
                session_id: "r1".into(),
                creator: Some("guest42".into()),
                subject: "Pace".into(),
                text: "Slower please".into(),
                timestamp: 1_600_000_000_000,
                read: true,
                ..Default::default()
            }),
            LegacyEntity::Motd(legacy::Motd {
                id: "m1".into(),
                motdkey: Some("k1".into()),
                title: "Maintenance".into(),
                text: "Tonight".into(),
                audience: "loggedIn".into(),
                session_id: Some("r1".into()),
                startdate: 1_600_000_000_000,
                enddate: 1_600_086_400_000,
                ..Default::default()
            }),
            LegacyEntity::UserProfile(legacy::UserRecords {
                user: legacy::User {
                    id: "u1".into(),
                    revision: Some("2-bb".into()),
                    username: "ada".into(),
                    creation: 1_500_000_000_000,
                    last_login: 1_600_000_000_000,
                    password: Some("hash".into()),
                    ..Default::default()
                },
                logged_in: Some(legacy::LoggedIn {
                    id: "l1".into(),
                    revision: Some("5-cc".into()),
                    user: "ada".into(),
                    timestamp: 1_600_000_000_000,
                    visited_sessions: vec![legacy::VisitedRoom {
                        id: "r1".into(),
                        name: "Physics".into(),
                        keyword: "12345678".into(),
                    }],
                    ..Default::default()
                }),
                motd_list: Some(legacy::MotdList {
                    id: "ml1".into(),
                    revision: None,
                    username: "ada".into(),
                    motdkeys: "k1,k2".into(),
                    ..Default::default()
                }),
            }),
        ];

        for entity in entities {
            assert_eq!(round_trip(&translator, entity.clone()), entity);
        }
    }

    fn extra(value: serde_json::Value) -> legacy::Extra {
        match value {
            serde_json::Value::Object(fields) => fields,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_unmodeled_fields_round_trip() {
        let lookup = fixtures();
        let translator = Translator::new(&lookup);
        let mut content = lookup.contents["abcd"].clone();
        content.extra = extra(json!({ "correctAnswer": "A", "imageQuestion": true }));

        let entities = [
            LegacyEntity::Room(legacy::Room {
                id: "r1".into(),
                name: "Physics".into(),
                keyword: "12345678".into(),
                extra: extra(json!({ "courseId": "C-42", "courseType": "moodle" })),
                ..Default::default()
            }),
            LegacyEntity::Content(content),
            LegacyEntity::Answer(legacy::Answer {
                id: "a1".into(),
                question_id: "abcd".into(),
                session_id: "r1".into(),
                answer_text: Some("B".into()),
                extra: extra(json!({ "answerImage": "data:," })),
                ..Default::default()
            }),
            LegacyEntity::Comment(legacy::Comment {
                id: "q1".into(),
                session_id: "r1".into(),
                extra: extra(json!({ "anonymous": true })),
                ..Default::default()
            }),
            LegacyEntity::Motd(legacy::Motd {
                id: "m1".into(),
                audience: "all".into(),
                extra: extra(json!({ "priority": 2 })),
                ..Default::default()
            }),
            LegacyEntity::UserProfile(legacy::UserRecords {
                user: legacy::User {
                    id: "u1".into(),
                    username: "ada".into(),
                    extra: extra(json!({ "displayName": "Ada" })),
                    ..Default::default()
                },
                logged_in: Some(legacy::LoggedIn {
                    id: "l1".into(),
                    user: "ada".into(),
                    extra: extra(json!({ "sessionCount": 3 })),
                    ..Default::default()
                }),
                motd_list: Some(legacy::MotdList {
                    id: "ml1".into(),
                    username: "ada".into(),
                    extra: extra(json!({ "lastSeen": "k1" })),
                    ..Default::default()
                }),
            }),
        ];

        for entity in entities {
            assert_eq!(round_trip(&translator, entity.clone()), entity);
        }
    }
}
