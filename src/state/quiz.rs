use std::time::SystemTime;

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use tracing::warn;

use crate::{
    dao::{
        models::{AlternativeEntity, ParticipantEntity, QuestionEntity, SessionEntity},
        storage::StorageError,
    },
    state::player::PlayerId,
};

/// Selectable answer of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    /// Stable identifier, unique within the question.
    pub id: String,
    /// Text shown to players.
    pub text: String,
}

/// Multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Identifier of the question in the question bank.
    pub id: String,
    /// Prompt shown to players.
    pub text: String,
    /// Alternatives in presentation order.
    pub alternatives: Vec<Alternative>,
    /// Identifier of the correct alternative.
    pub correct_answer_id: String,
}

impl Question {
    /// Whether `alternative_id` names one of this question's alternatives.
    pub fn has_alternative(&self, alternative_id: &str) -> bool {
        self.alternatives.iter().any(|alt| alt.id == alternative_id)
    }

    /// Whether `alternative_id` is the correct answer.
    pub fn is_correct(&self, alternative_id: &str) -> bool {
        self.correct_answer_id == alternative_id
    }

    /// Copy of the question with its alternatives in a random order.
    ///
    /// Ids are untouched, so `correct_answer_id` keeps pointing at the same alternative.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut question = self.clone();
        question.alternatives.shuffle(rng);
        question
    }
}

/// Draw `count` distinct questions from `pool` in random order, each with shuffled alternatives.
pub fn draw_questions<R: Rng + ?Sized>(pool: &[Question], count: usize, rng: &mut R) -> Vec<Question> {
    let mut picked: Vec<&Question> = pool.iter().collect();
    picked.shuffle(rng);
    picked
        .into_iter()
        .take(count)
        .map(|question| question.shuffled(rng))
        .collect()
}

/// Joined player within one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Nickname chosen when joining.
    pub nickname: String,
    /// Latest submitted score.
    pub score: u32,
    /// When the participant joined.
    pub joined_at: SystemTime,
    /// When the final score was submitted.
    pub completed_at: Option<SystemTime>,
}

impl Participant {
    /// Participant record written on join.
    pub fn joining(nickname: String, now: SystemTime) -> Self {
        Self {
            nickname,
            score: 0,
            joined_at: now,
            completed_at: None,
        }
    }
}

/// One shareable quiz round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Human-readable session code.
    pub id: String,
    /// Ordered questions.
    pub questions: Vec<Question>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Whether the session still accepts joins.
    pub is_active: bool,
    /// Identity of the host.
    pub created_by: PlayerId,
    /// Participants keyed by identity, in join order.
    pub participants: IndexMap<PlayerId, Participant>,
}

impl Session {
    /// Build a freshly created, active session without participants.
    pub fn new(id: String, questions: Vec<Question>, created_by: PlayerId) -> Self {
        Self {
            id,
            questions,
            created_at: SystemTime::now(),
            is_active: true,
            created_by,
            participants: IndexMap::new(),
        }
    }
}

impl From<AlternativeEntity> for Alternative {
    fn from(value: AlternativeEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
        }
    }
}

impl From<Alternative> for AlternativeEntity {
    fn from(value: Alternative) -> Self {
        Self {
            id: value.id,
            text: value.text,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            alternatives: value.alternatives.into_iter().map(Into::into).collect(),
            correct_answer_id: value.correct_answer_id,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            text: value.text,
            alternatives: value.alternatives.into_iter().map(Into::into).collect(),
            correct_answer_id: value.correct_answer_id,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            nickname: value.nickname,
            score: value.score,
            joined_at: value.joined_at,
            completed_at: value.completed_at,
        }
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        Self {
            nickname: value.nickname,
            score: value.score,
            joined_at: value.joined_at,
            completed_at: value.completed_at,
        }
    }
}

impl TryFrom<SessionEntity> for Session {
    type Error = StorageError;

    fn try_from(value: SessionEntity) -> Result<Self, Self::Error> {
        let created_by =
            PlayerId::parse(&value.created_by).map_err(|err| StorageError::Malformed {
                document: value.id.clone(),
                reason: format!("creator id: {err}"),
            })?;
        let participants = value
            .participants
            .into_iter()
            .filter_map(|(key, participant)| match PlayerId::parse(&key) {
                Ok(id) => Some((id, participant.into())),
                Err(err) => {
                    warn!(session_id = %value.id, key, error = %err, "skipping participant with malformed id");
                    None
                }
            })
            .collect();

        Ok(Self {
            id: value.id,
            questions: value.questions.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
            is_active: value.is_active,
            created_by,
            participants,
        })
    }
}

impl From<Session> for SessionEntity {
    fn from(value: Session) -> Self {
        Self {
            id: value.id,
            questions: value.questions.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
            is_active: value.is_active,
            created_by: value.created_by.into(),
            participants: value
                .participants
                .into_iter()
                .map(|(id, participant)| (id.into(), participant.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            text: format!("question {id}"),
            alternatives: (1..=4)
                .map(|n| Alternative {
                    id: n.to_string(),
                    text: format!("answer {n}"),
                })
                .collect(),
            correct_answer_id: "2".into(),
        }
    }

    #[test]
    fn draw_picks_distinct_questions_and_keeps_correct_answer() {
        let pool: Vec<Question> = (0..8).map(|n| question(&n.to_string())).collect();
        let mut rng = rand::rng();

        let drawn = draw_questions(&pool, 5, &mut rng);
        assert_eq!(drawn.len(), 5);

        let mut ids: Vec<&str> = drawn.iter().map(|q| q.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);

        for q in &drawn {
            assert_eq!(q.correct_answer_id, "2");
            assert!(q.has_alternative("2"));
            let text = &q.alternatives.iter().find(|a| a.id == "2").unwrap().text;
            assert_eq!(text, "answer 2");
        }
    }

    #[test]
    fn draw_from_small_pool_returns_whole_pool() {
        let pool = vec![question("a"), question("b")];
        assert_eq!(draw_questions(&pool, 5, &mut rand::rng()).len(), 2);
    }

    #[test]
    fn entity_round_trip_preserves_participant_order() {
        let host = PlayerId::generate();
        let mut session = Session::new("cool-race-007".into(), vec![question("1")], host);
        for name in ["zoe", "adam", "mia"] {
            session
                .participants
                .insert(PlayerId::generate(), Participant::joining(name.into(), SystemTime::now()));
        }

        let entity: SessionEntity = session.clone().into();
        let restored = Session::try_from(entity).unwrap();
        assert_eq!(restored, session);
        let names: Vec<&str> = restored
            .participants
            .values()
            .map(|p| p.nickname.as_str())
            .collect();
        assert_eq!(names, ["zoe", "adam", "mia"]);
    }

    #[test]
    fn malformed_creator_is_reported_instead_of_replaced() {
        let session = Session::new("cool-race-008".into(), vec![question("1")], PlayerId::generate());
        let mut entity: SessionEntity = session.into();
        entity.created_by = "not a/valid id".into();

        let err = Session::try_from(entity).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Malformed { ref document, .. } if document == "cool-race-008"
        ));
    }
}
