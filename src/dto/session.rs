use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{QuestionOutcomeEntity, QuestionStatsEntity},
    dto::{
        format_system_time,
        validation::{validate_key, validate_nickname},
    },
    state::{
        leaderboard::RecentSession,
        quiz::{Alternative, Question, Session},
    },
};

/// Payload of `POST /sessions`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Number of questions to draw; the configured default when omitted.
    #[validate(range(min = 1, max = 50))]
    #[serde(default)]
    pub question_count: Option<usize>,
}

/// Payload of `POST /sessions/{id}/join`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
}

/// Result of a join: `joined` is false when the identity had already joined.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinSessionResponse {
    pub session_id: String,
    pub joined: bool,
}

/// Correctness of one answered question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionOutcomeInput {
    #[validate(custom(function = "validate_key"))]
    pub question_id: String,
    pub is_correct: bool,
}

impl From<QuestionOutcomeInput> for QuestionOutcomeEntity {
    fn from(value: QuestionOutcomeInput) -> Self {
        Self {
            question_id: value.question_id,
            is_correct: value.is_correct,
        }
    }
}

/// Payload of `POST /sessions/{id}/score`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitScoreRequest {
    pub score: u32,
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
    #[serde(default)]
    #[validate(nested)]
    pub outcomes: Vec<QuestionOutcomeInput>,
}

/// Alternative as shown to players.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlternativeView {
    pub id: String,
    pub text: String,
}

/// Question as shown to players; the correct answer is never exposed.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub alternatives: Vec<AlternativeView>,
}

impl From<&Alternative> for AlternativeView {
    fn from(value: &Alternative) -> Self {
        Self {
            id: value.id.clone(),
            text: value.text.clone(),
        }
    }
}

impl From<&Question> for QuestionView {
    fn from(value: &Question) -> Self {
        Self {
            id: value.id.clone(),
            text: value.text.clone(),
            alternatives: value.alternatives.iter().map(Into::into).collect(),
        }
    }
}

/// Joined participant as listed on a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantView {
    pub player_id: String,
    pub nickname: String,
    pub score: u32,
    pub joined_at: String,
    pub completed_at: Option<String>,
}

/// Session resolved from its shareable code.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub created_at: String,
    pub is_active: bool,
    pub created_by: String,
    pub questions: Vec<QuestionView>,
    /// Participants in join order.
    pub participants: Vec<ParticipantView>,
}

impl From<Session> for SessionResponse {
    fn from(value: Session) -> Self {
        Self {
            questions: value.questions.iter().map(Into::into).collect(),
            participants: value
                .participants
                .into_iter()
                .map(|(player_id, participant)| ParticipantView {
                    player_id: player_id.into(),
                    nickname: participant.nickname,
                    score: participant.score,
                    joined_at: format_system_time(participant.joined_at),
                    completed_at: participant.completed_at.map(format_system_time),
                })
                .collect(),
            id: value.id,
            created_at: format_system_time(value.created_at),
            is_active: value.is_active,
            created_by: value.created_by.into(),
        }
    }
}

/// Query string of `GET /sessions/recent`.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct RecentSessionsQuery {
    /// Maximum number of sessions to return.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

/// One entry of `GET /sessions/recent`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecentSessionItem {
    pub session_id: String,
    pub created_at: String,
    pub is_active: bool,
    pub participant_count: usize,
    pub question_count: usize,
    pub score: Option<u32>,
    pub rank: Option<usize>,
    pub completed: bool,
}

impl From<RecentSession> for RecentSessionItem {
    fn from(value: RecentSession) -> Self {
        Self {
            session_id: value.session_id,
            created_at: format_system_time(value.created_at),
            is_active: value.is_active,
            participant_count: value.participant_count,
            question_count: value.question_count,
            score: value.score,
            rank: value.rank,
            completed: value.completed,
        }
    }
}

/// Answer counters of a question across all sessions.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionStatsResponse {
    pub question_id: String,
    pub total_attempts: u64,
    pub correct_attempts: u64,
    pub last_updated: String,
}

impl From<QuestionStatsEntity> for QuestionStatsResponse {
    fn from(value: QuestionStatsEntity) -> Self {
        Self {
            question_id: value.question_id,
            total_attempts: value.total_attempts,
            correct_attempts: value.correct_attempts,
            last_updated: format_system_time(value.last_updated),
        }
    }
}
