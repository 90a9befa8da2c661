use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Selectable answer of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlternativeEntity {
    /// Stable identifier, unique within the question.
    pub id: String,
    /// Text shown to players.
    pub text: String,
}

/// Question frozen into a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Identifier of the question in the question bank.
    pub id: String,
    /// Prompt shown to players.
    pub text: String,
    /// Alternatives in presentation order.
    pub alternatives: Vec<AlternativeEntity>,
    /// Identifier of the correct alternative.
    pub correct_answer_id: String,
}

/// Participant record keyed by identity inside a session document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Nickname chosen when joining.
    pub nickname: String,
    /// Latest submitted score (0 until the run completes).
    pub score: u32,
    /// When the participant joined.
    pub joined_at: SystemTime,
    /// When the final score was submitted, absent while still playing.
    pub completed_at: Option<SystemTime>,
}

/// Aggregate session document persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Human-readable session code (e.g. `brave-duel-042`).
    pub id: String,
    /// Ordered questions every participant answers.
    pub questions: Vec<QuestionEntity>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Whether the session still accepts joins.
    pub is_active: bool,
    /// Identity of the host who created the session.
    pub created_by: String,
    /// Participants keyed by identity, in join order.
    pub participants: IndexMap<String, ParticipantEntity>,
}

/// Result of a conditional participant insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The identity had no entry and one was written.
    Joined,
    /// The identity already holds an entry; nothing was written.
    AlreadyJoined,
    /// No session document exists under that id.
    SessionMissing,
}

/// Whether a participant answered one question correctly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionOutcomeEntity {
    /// Identifier of the answered question.
    pub question_id: String,
    /// Whether the chosen alternative was the correct one.
    pub is_correct: bool,
}

/// Aggregated answer statistics of a question across all sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionStatsEntity {
    /// Identifier of the question.
    pub question_id: String,
    /// Number of recorded answers.
    pub total_attempts: u64,
    /// Number of recorded correct answers.
    pub correct_attempts: u64,
    /// Last time the counters changed.
    pub last_updated: SystemTime,
}

impl QuestionStatsEntity {
    /// Fresh counters for a question that has never been answered.
    pub fn empty(question_id: String, now: SystemTime) -> Self {
        Self {
            question_id,
            total_attempts: 0,
            correct_attempts: 0,
            last_updated: now,
        }
    }

    /// Fold one outcome into the counters.
    pub fn record(&mut self, is_correct: bool, now: SystemTime) {
        self.total_attempts += 1;
        if is_correct {
            self.correct_attempts += 1;
        }
        self.last_updated = now;
    }
}
