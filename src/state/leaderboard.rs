//! Leaderboard assembly over a session's participant map.

use std::{cmp::Ordering, time::SystemTime};

use indexmap::IndexMap;

use crate::state::{
    player::PlayerId,
    quiz::{Participant, Session},
};

/// One ranked row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// Identity holding the row.
    pub player_id: PlayerId,
    /// Nickname chosen when joining.
    pub nickname: String,
    /// Latest submitted score.
    pub score: u32,
    /// Whether the participant submitted a final score.
    pub completed: bool,
}

/// Order participants by score descending.
///
/// Ties are broken by earliest completion (finished runs before unfinished ones),
/// then earliest join, then nickname, so the order never depends on map iteration.
pub fn compare_participants(a: &Participant, b: &Participant) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| match (a.completed_at, b.completed_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.nickname.cmp(&b.nickname))
}

/// Rank every participant of a session.
pub fn rank(participants: &IndexMap<PlayerId, Participant>) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<(&PlayerId, &Participant)> = participants.iter().collect();
    ordered.sort_by(|(_, a), (_, b)| compare_participants(a, b));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, (player_id, participant))| LeaderboardEntry {
            rank: index + 1,
            player_id: player_id.clone(),
            nickname: participant.nickname.clone(),
            score: participant.score,
            completed: participant.completed_at.is_some(),
        })
        .collect()
}

/// Locate `player` in an already ranked leaderboard.
pub fn rank_of<'a>(entries: &'a [LeaderboardEntry], player: &PlayerId) -> Option<&'a LeaderboardEntry> {
    entries.iter().find(|entry| &entry.player_id == player)
}

/// A session seen from one of its participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentSession {
    /// Session code.
    pub session_id: String,
    /// When the session was created.
    pub created_at: SystemTime,
    /// Whether the session still accepts players.
    pub is_active: bool,
    /// Number of joined participants.
    pub participant_count: usize,
    /// Number of questions in the session.
    pub question_count: usize,
    /// The player's latest score, if they are a participant.
    pub score: Option<u32>,
    /// The player's 1-based rank, if they are a participant.
    pub rank: Option<usize>,
    /// Whether the player submitted a final score.
    pub completed: bool,
}

impl RecentSession {
    /// Summarise `session` for `player`.
    pub fn for_player(session: Session, player: &PlayerId) -> Self {
        let board = rank(&session.participants);
        let mine = rank_of(&board, player);
        Self {
            session_id: session.id,
            created_at: session.created_at,
            is_active: session.is_active,
            participant_count: session.participants.len(),
            question_count: session.questions.len(),
            score: mine.map(|entry| entry.score),
            rank: mine.map(|entry| entry.rank),
            completed: mine.is_some_and(|entry| entry.completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn participant(nickname: &str, score: u32, joined: u64, completed: Option<u64>) -> Participant {
        let base = SystemTime::UNIX_EPOCH;
        Participant {
            nickname: nickname.into(),
            score,
            joined_at: base + Duration::from_secs(joined),
            completed_at: completed.map(|secs| base + Duration::from_secs(secs)),
        }
    }

    #[test]
    fn orders_by_score_descending() {
        let mut participants = IndexMap::new();
        participants.insert(PlayerId::generate(), participant("alice", 900, 0, Some(50)));
        participants.insert(PlayerId::generate(), participant("bob", 1200, 1, Some(60)));
        participants.insert(PlayerId::generate(), participant("carol", 0, 2, None));

        let board = rank(&participants);
        let rows: Vec<(&str, u32, usize)> = board
            .iter()
            .map(|e| (e.nickname.as_str(), e.score, e.rank))
            .collect();
        assert_eq!(rows, [("bob", 1200, 1), ("alice", 900, 2), ("carol", 0, 3)]);
    }

    #[test]
    fn ties_prefer_earlier_completion_then_join() {
        let mut participants = IndexMap::new();
        participants.insert(PlayerId::generate(), participant("late", 500, 0, Some(90)));
        participants.insert(PlayerId::generate(), participant("playing", 500, 0, None));
        participants.insert(PlayerId::generate(), participant("early", 500, 5, Some(40)));
        participants.insert(PlayerId::generate(), participant("idle", 500, 1, None));

        let names: Vec<String> = rank(&participants).into_iter().map(|e| e.nickname).collect();
        assert_eq!(names, ["early", "late", "playing", "idle"]);
    }

    #[test]
    fn finds_caller_rank() {
        let me = PlayerId::generate();
        let mut participants = IndexMap::new();
        participants.insert(me.clone(), participant("me", 10, 0, Some(1)));
        participants.insert(PlayerId::generate(), participant("rival", 20, 0, Some(1)));

        let board = rank(&participants);
        assert_eq!(rank_of(&board, &me).map(|e| e.rank), Some(2));
        assert!(rank_of(&board, &PlayerId::generate()).is_none());
    }
}
