use serde::Serialize;
use utoipa::ToSchema;

use crate::state::leaderboard::LeaderboardEntry;

/// One ranked row.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub nickname: String,
    pub score: u32,
    pub completed: bool,
}

impl From<LeaderboardEntry> for LeaderboardRow {
    fn from(value: LeaderboardEntry) -> Self {
        Self {
            rank: value.rank,
            nickname: value.nickname,
            score: value.score,
            completed: value.completed,
        }
    }
}

/// Ranked participants of a session, highest score first.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub session_id: String,
    pub entries: Vec<LeaderboardRow>,
}

impl LeaderboardResponse {
    /// Wrap ranked entries of `session_id`.
    pub fn new(session_id: String, entries: Vec<LeaderboardEntry>) -> Self {
        Self {
            session_id,
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }
}
