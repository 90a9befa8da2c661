//! Data driven by one player's run through a session.

use std::{future::Future, time::Duration};

use tokio::time::{Instant, timeout};
use tracing::warn;

use crate::{
    dao::models::QuestionOutcomeEntity,
    error::ServiceError,
    state::{
        countdown::{Countdown, CountdownTimer},
        player::PlayerId,
        quiz::{Question, Session},
        scoring::{self, QuestionScore},
        state_machine::{Plan, RunEvent, RunPhase, RunStateMachine, Snapshot},
    },
};

/// Identity and display name of the player owning a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlayer {
    /// Identity the run belongs to.
    pub id: PlayerId,
    /// Nickname accepted on join.
    pub nickname: String,
}

/// Outcome of the best-effort score submission made when the run reaches results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Questions are still being answered.
    Pending,
    /// The final score was written to the session.
    Submitted,
    /// The write failed; results are still shown.
    Failed(String),
}

/// Message sent by a countdown timer when a question's time is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionExpired {
    /// Owner of the run.
    pub player_id: PlayerId,
    /// Session the question belongs to.
    pub session_id: String,
    /// Index of the expired question.
    pub question_index: usize,
}

/// Progress of a run once the nickname has been accepted.
#[derive(Debug)]
pub struct RunState {
    /// Session being played.
    pub session_id: String,
    /// Questions in play order.
    pub questions: Vec<Question>,
    /// Index of the question being answered, `questions.len()` once done.
    pub current_question_index: usize,
    /// Number of correct answers.
    pub score: usize,
    /// Sum of every per-question `accuracy + time_bonus`.
    pub time_based_score: u32,
    /// One entry per closed question.
    pub per_question_scores: Vec<QuestionScore>,
    /// Owner of the run.
    pub player: RunPlayer,
    /// Countdown of the current question.
    pub countdown: Option<Countdown>,
    /// Result of the final score submission.
    pub submission: SubmissionStatus,
}

impl RunState {
    /// Start a run on the first question of `questions`.
    pub fn begin(session_id: String, questions: Vec<Question>, player: RunPlayer) -> Self {
        Self {
            session_id,
            questions,
            current_question_index: 0,
            score: 0,
            time_based_score: 0,
            per_question_scores: Vec::new(),
            player,
            countdown: None,
            submission: SubmissionStatus::Pending,
        }
    }

    /// Question currently displayed, if any remain.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Whether every question has been closed.
    pub fn is_finished(&self) -> bool {
        self.current_question_index >= self.questions.len()
    }

    /// Close the current question with `result` and move to the next one.
    ///
    /// Keeps `per_question_scores.len() == current_question_index`.
    pub fn record(&mut self, result: QuestionScore) -> Result<(), ServiceError> {
        if self.is_finished() {
            return Err(ServiceError::InvalidState(
                "every question is already answered".into(),
            ));
        }

        if result.is_correct() {
            self.score += 1;
        }
        self.time_based_score += result.total();
        self.per_question_scores.push(result);
        self.current_question_index += 1;
        self.countdown = None;
        Ok(())
    }

    /// Final score submitted to the session.
    pub fn total(&self) -> u32 {
        scoring::total_score(&self.per_question_scores)
    }

    /// Per-question correctness, in play order, for the statistics counters.
    pub fn outcomes(&self) -> Vec<QuestionOutcomeEntity> {
        self.questions
            .iter()
            .zip(&self.per_question_scores)
            .map(|(question, result)| QuestionOutcomeEntity {
                question_id: question.id.clone(),
                is_correct: result.is_correct(),
            })
            .collect()
    }
}

/// Everything the server keeps for one player between requests.
#[derive(Debug)]
pub struct PlayerRun {
    machine: RunStateMachine,
    last_active: Instant,
    /// Session loaded by "new quiz" or a join code, from nickname entry onwards.
    pub session: Option<Session>,
    /// Answering progress, from the first question onwards.
    pub run: Option<RunState>,
    /// Timer delivering the expiry of the current question.
    pub timer: Option<CountdownTimer>,
    /// Remembered nickname offered on the nickname screen.
    pub nickname_suggestion: Option<String>,
}

impl Default for PlayerRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRun {
    /// Fresh run sitting on the home screen.
    pub fn new() -> Self {
        Self {
            machine: RunStateMachine::new(),
            last_active: Instant::now(),
            session: None,
            run: None,
            timer: None,
            nickname_suggestion: None,
        }
    }

    /// Time since the run last changed phase.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_active)
    }

    /// Current phase of the view state machine.
    pub fn phase(&self) -> RunPhase {
        self.machine.phase()
    }

    /// Snapshot of the view state machine.
    pub fn machine_snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    /// Apply a transition that needs no external work.
    pub fn fire(&mut self, event: RunEvent) -> Result<RunPhase, ServiceError> {
        let next = self.machine.fire(event)?;
        self.last_active = Instant::now();
        Ok(next)
    }

    /// Drop every piece of run data, keeping only the machine.
    pub fn discard(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.session = None;
        self.run = None;
        self.nickname_suggestion = None;
    }

    /// Remaining time on the current question.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.run
            .as_ref()
            .and_then(|run| run.countdown.as_ref())
            .map(|countdown| countdown.remaining_at(now))
    }

    /// Plan `event`, run `work`, then apply the plan, or abort it if the work fails or times out.
    ///
    /// The phase never moves when `work` fails.
    pub async fn run_transition<F, Fut, T>(
        &mut self,
        event: RunEvent,
        limit: Option<Duration>,
        work: F,
    ) -> Result<(T, RunPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Plan { id: plan_id, .. } = self.machine.plan(event.clone())?;

        let work_future = work();
        let outcome = if let Some(limit) = limit {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.machine.abort(plan_id) {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.machine.apply(plan_id)?;
                self.last_active = Instant::now();
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.machine.abort(plan_id) {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::quiz::Alternative;

    fn questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|n| Question {
                id: format!("q{n}"),
                text: "?".into(),
                alternatives: vec![
                    Alternative {
                        id: "a".into(),
                        text: "A".into(),
                    },
                    Alternative {
                        id: "b".into(),
                        text: "B".into(),
                    },
                ],
                correct_answer_id: "a".into(),
            })
            .collect()
    }

    fn player() -> RunPlayer {
        RunPlayer {
            id: PlayerId::generate(),
            nickname: "ann".into(),
        }
    }

    #[test]
    fn record_keeps_scores_aligned_with_index() {
        let mut run = RunState::begin("s".into(), questions(3), player());
        assert_eq!(run.per_question_scores.len(), run.current_question_index);

        run.record(scoring::score_question(true, 10.0)).unwrap();
        assert_eq!(run.per_question_scores.len(), run.current_question_index);
        run.record(scoring::timeout_score()).unwrap();
        assert_eq!(run.per_question_scores.len(), run.current_question_index);
        run.record(scoring::score_question(false, 25.0)).unwrap();

        assert!(run.is_finished());
        assert_eq!(run.per_question_scores.len(), 3);
        assert_eq!(run.score, 1);
        assert_eq!(run.time_based_score, 300 + 0 + 50);
        assert_eq!(run.total(), run.time_based_score);
        assert!(run.record(scoring::timeout_score()).is_err());
        assert_eq!(run.per_question_scores.len(), run.current_question_index);
    }

    #[test]
    fn outcomes_follow_play_order() {
        let mut run = RunState::begin("s".into(), questions(2), player());
        run.record(scoring::score_question(false, 1.0)).unwrap();
        run.record(scoring::score_question(true, 1.0)).unwrap();

        let outcomes: Vec<(String, bool)> = run
            .outcomes()
            .into_iter()
            .map(|o| (o.question_id, o.is_correct))
            .collect();
        assert_eq!(outcomes, [("q0".to_string(), false), ("q1".to_string(), true)]);
    }

    #[tokio::test]
    async fn failed_work_leaves_phase_unchanged() {
        let mut run = PlayerRun::new();
        let result: Result<((), RunPhase), ServiceError> = run
            .run_transition(RunEvent::SessionLoaded, None, || async {
                Err(ServiceError::NotFound("session `x` not found".into()))
            })
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert_eq!(run.phase(), RunPhase::Home);
        assert_eq!(run.machine_snapshot().pending, None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_times_out_and_aborts() {
        let mut run = PlayerRun::new();
        let result = run
            .run_transition(RunEvent::SessionLoaded, Some(Duration::from_secs(5)), || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Timeout)));
        assert_eq!(run.phase(), RunPhase::Home);
        assert_eq!(run.machine_snapshot().pending, None);
    }

    #[tokio::test]
    async fn successful_work_applies_plan() {
        let mut run = PlayerRun::new();
        let (value, phase) = run
            .run_transition(RunEvent::SessionLoaded, None, || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(phase, RunPhase::NicknameEntry);
    }
}
