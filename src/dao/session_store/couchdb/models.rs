use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dao::models::{ParticipantEntity, QuestionEntity, QuestionStatsEntity, SessionEntity};

pub const SESSION_PREFIX: &str = "session::";
pub const STATS_PREFIX: &str = "question_stats::";

/// Body of a `_find` response.
#[derive(Debug, Deserialize)]
pub struct FindResponse<T> {
    pub docs: Vec<T>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: SessionBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBody {
    pub session_id: String,
    pub questions: Vec<QuestionEntity>,
    pub created_at: SystemTime,
    pub is_active: bool,
    pub created_by: String,
    #[serde(default)]
    pub participants: IndexMap<String, ParticipantEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchQuestionStatsDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub stats: QuestionStatsEntity,
}

impl CouchSessionDocument {
    pub fn from_entity(session: SessionEntity) -> Self {
        Self {
            id: session_doc_id(&session.id),
            rev: None,
            session: SessionBody {
                session_id: session.id,
                questions: session.questions,
                created_at: session.created_at,
                is_active: session.is_active,
                created_by: session.created_by,
                participants: session.participants,
            },
        }
    }

    pub fn into_entity(self) -> SessionEntity {
        SessionEntity {
            id: self.session.session_id,
            questions: self.session.questions,
            created_at: self.session.created_at,
            is_active: self.session.is_active,
            created_by: self.session.created_by,
            participants: self.session.participants,
        }
    }
}

impl CouchQuestionStatsDocument {
    pub fn empty(question_id: String, now: SystemTime) -> Self {
        Self {
            id: stats_doc_id(&question_id),
            rev: None,
            stats: QuestionStatsEntity::empty(question_id, now),
        }
    }
}

pub fn session_doc_id(id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

pub fn stats_doc_id(question_id: &str) -> String {
    format!("{}{}", STATS_PREFIX, question_id)
}
