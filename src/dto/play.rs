use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tokio::time::Instant;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{leaderboard::LeaderboardRow, session::QuestionView, validation::validate_nickname},
    state::{
        leaderboard::{self, LeaderboardEntry},
        player::PlayerId,
        run::{PlayerRun, SubmissionStatus},
        scoring::{self, MAX_QUESTION_SCORE, Performance, QuestionScore},
        state_machine::RunPhase,
    },
};

/// Screen the run is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayPhase {
    /// Landing screen: host a new quiz or join one.
    Home,
    /// Typing a session code.
    Join,
    /// A session is loaded and waits for a nickname.
    NicknameEntry,
    /// A question is on screen with its countdown running.
    Question,
    /// Every question is closed; score and leaderboard are shown.
    Results,
}

impl From<RunPhase> for PlayPhase {
    fn from(value: RunPhase) -> Self {
        match value {
            RunPhase::Home => PlayPhase::Home,
            RunPhase::Join => PlayPhase::Join,
            RunPhase::NicknameEntry => PlayPhase::NicknameEntry,
            RunPhase::Question(_) => PlayPhase::Question,
            RunPhase::Results => PlayPhase::Results,
        }
    }
}

/// Points earned on one closed question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuestionScoreView {
    /// 100 for a correct answer, 0 otherwise.
    pub accuracy: u32,
    /// Points for the time left on the countdown.
    pub time_bonus: u32,
    /// Sum of accuracy and time bonus.
    pub total: u32,
}

impl From<QuestionScore> for QuestionScoreView {
    fn from(value: QuestionScore) -> Self {
        Self {
            accuracy: value.accuracy,
            time_bonus: value.time_bonus,
            total: value.total(),
        }
    }
}

/// End-of-quiz rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    /// At least 80 % of the maximum score.
    Master,
    /// At least 60 % of the maximum score.
    Good,
    /// Below 60 %.
    KeepPracticing,
}

impl From<Performance> for PerformanceTier {
    fn from(value: Performance) -> Self {
        match value {
            Performance::Master => PerformanceTier::Master,
            Performance::Good => PerformanceTier::Good,
            Performance::KeepPracticing => PerformanceTier::KeepPracticing,
        }
    }
}

/// Whether the final score reached the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionView {
    /// The run has not reached results yet.
    Pending,
    /// The score is stored in the session.
    Submitted,
    /// Storing the score failed; the results are local only.
    Failed {
        /// Reason reported by the store.
        error: String,
    },
}

impl From<&SubmissionStatus> for SubmissionView {
    fn from(value: &SubmissionStatus) -> Self {
        match value {
            SubmissionStatus::Pending => SubmissionView::Pending,
            SubmissionStatus::Submitted => SubmissionView::Submitted,
            SubmissionStatus::Failed(error) => SubmissionView::Failed {
                error: error.clone(),
            },
        }
    }
}

/// Final screen of a run.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultsView {
    pub total_score: u32,
    pub max_score: u32,
    pub correct_count: usize,
    pub question_count: usize,
    pub percentage: f64,
    pub performance: PerformanceTier,
    pub submission: SubmissionView,
    /// Session leaderboard; empty when it could not be read.
    pub leaderboard: Vec<LeaderboardRow>,
    /// The player's 1-based rank, when present on the leaderboard.
    pub rank: Option<usize>,
}

/// Read-only view of a player's run, rendered after every transition.
#[serde_as]
#[derive(Debug, Serialize, ToSchema)]
pub struct PlaySnapshot {
    pub phase: PlayPhase,
    /// Bumped by every applied transition.
    pub version: usize,
    pub session_id: Option<String>,
    pub nickname: Option<String>,
    /// Last nickname used by this identity, offered on the nickname screen.
    pub nickname_suggestion: Option<String>,
    pub question_index: Option<usize>,
    pub question_count: Option<usize>,
    pub question: Option<QuestionView>,
    /// Countdown left on the current question.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[schema(value_type = Option<u64>)]
    pub remaining_ms: Option<Duration>,
    pub correct_count: usize,
    pub running_score: u32,
    pub per_question_scores: Vec<QuestionScoreView>,
    pub results: Option<ResultsView>,
}

impl PlaySnapshot {
    /// Render `run` as seen at `now`.
    ///
    /// `board` is only used on the results screen.
    pub fn render(
        run: &PlayerRun,
        player: &PlayerId,
        now: Instant,
        board: Option<Vec<LeaderboardEntry>>,
    ) -> Self {
        let machine = run.machine_snapshot();
        let progress = run.run.as_ref();

        let session_id = progress
            .map(|state| state.session_id.clone())
            .or_else(|| run.session.as_ref().map(|session| session.id.clone()));
        let question_count = progress
            .map(|state| state.questions.len())
            .or_else(|| run.session.as_ref().map(|session| session.questions.len()));

        let question = match machine.phase {
            RunPhase::Question(_) => progress
                .and_then(|state| state.current_question())
                .map(QuestionView::from),
            _ => None,
        };

        let results = match (machine.phase, progress) {
            (RunPhase::Results, Some(state)) => {
                let total = state.total();
                let count = state.questions.len();
                let board = board.unwrap_or_default();
                let rank = leaderboard::rank_of(&board, player).map(|entry| entry.rank);
                Some(ResultsView {
                    total_score: total,
                    max_score: MAX_QUESTION_SCORE * count as u32,
                    correct_count: state.score,
                    question_count: count,
                    percentage: scoring::percentage(total, count),
                    performance: Performance::rate(total, count).into(),
                    submission: (&state.submission).into(),
                    leaderboard: board.into_iter().map(Into::into).collect(),
                    rank,
                })
            }
            _ => None,
        };

        Self {
            phase: machine.phase.into(),
            version: machine.version,
            session_id,
            nickname: progress.map(|state| state.player.nickname.clone()),
            nickname_suggestion: run.nickname_suggestion.clone(),
            question_index: match machine.phase {
                RunPhase::Question(index) => Some(index),
                _ => None,
            },
            question_count,
            question,
            remaining_ms: run.remaining(now),
            correct_count: progress.map_or(0, |state| state.score),
            running_score: progress.map_or(0, |state| state.time_based_score),
            per_question_scores: progress
                .map(|state| {
                    state
                        .per_question_scores
                        .iter()
                        .copied()
                        .map(Into::into)
                        .collect()
                })
                .unwrap_or_default(),
            results,
        }
    }
}

/// Payload of `POST /play/open`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OpenRequest {
    /// Shared session code the app was opened with.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Payload of `POST /play/new`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct NewQuizRequest {
    #[validate(range(min = 1, max = 50))]
    #[serde(default)]
    pub question_count: Option<usize>,
}

/// Payload of `POST /play/join-code`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinCodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub session_id: String,
}

/// Payload of `POST /play/nickname`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct NicknameRequest {
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
}

/// Payload of `POST /play/answer`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    /// Index of the question being answered; stale indexes are rejected.
    pub question_index: usize,
    #[validate(length(min = 1))]
    pub alternative_id: String,
}

/// Outcome of an answer plus the run after it.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_answer_id: String,
    pub score: QuestionScoreView,
    pub snapshot: PlaySnapshot,
}
