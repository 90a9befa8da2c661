use indexmap::IndexMap;
use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{ParticipantEntity, QuestionEntity, QuestionStatsEntity, SessionEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    questions: Vec<QuestionEntity>,
    created_at: DateTime,
    is_active: bool,
    created_by: String,
    #[serde(default)]
    participants: IndexMap<String, MongoParticipantDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    nickname: String,
    score: i64,
    joined_at: DateTime,
    #[serde(default)]
    completed_at: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionStatsDocument {
    #[serde(rename = "_id")]
    question_id: String,
    total_attempts: i64,
    correct_attempts: i64,
    last_updated: DateTime,
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn clamp_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            nickname: value.nickname,
            score: i64::from(value.score),
            joined_at: DateTime::from_system_time(value.joined_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            nickname: value.nickname,
            score: clamp_u32(value.score),
            joined_at: value.joined_at.to_system_time(),
            completed_at: value.completed_at.map(|at| at.to_system_time()),
        }
    }
}

impl MongoParticipantDocument {
    /// Embedded document written under `participants.<player_id>`.
    pub fn to_document(&self) -> Document {
        doc! {
            "nickname": self.nickname.as_str(),
            "score": self.score,
            "joined_at": self.joined_at,
            "completed_at": self.completed_at,
        }
    }
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            questions: value.questions,
            created_at: DateTime::from_system_time(value.created_at),
            is_active: value.is_active,
            created_by: value.created_by,
            participants: value
                .participants
                .into_iter()
                .map(|(id, participant)| (id, participant.into()))
                .collect(),
        }
    }
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            id: value.id,
            questions: value.questions,
            created_at: value.created_at.to_system_time(),
            is_active: value.is_active,
            created_by: value.created_by,
            participants: value
                .participants
                .into_iter()
                .map(|(id, participant)| (id, participant.into()))
                .collect(),
        }
    }
}

impl From<MongoQuestionStatsDocument> for QuestionStatsEntity {
    fn from(value: MongoQuestionStatsDocument) -> Self {
        Self {
            question_id: value.question_id,
            total_attempts: clamp_u64(value.total_attempts),
            correct_attempts: clamp_u64(value.correct_attempts),
            last_updated: value.last_updated.to_system_time(),
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

/// Dotted path of one participant entry inside a session document.
pub fn participant_path(player_id: &str) -> String {
    format!("participants.{player_id}")
}
