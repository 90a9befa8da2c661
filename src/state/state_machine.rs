use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Screens a player's run can be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Landing screen: start a new quiz or go enter a code.
    Home,
    /// Entering a session code to join.
    Join,
    /// A session is loaded; waiting for the player's nickname.
    NicknameEntry,
    /// Answering the question at this index.
    Question(usize),
    /// Every question is closed; final score and leaderboard.
    Results,
}

/// Events that can be applied to the run state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Player wants to type a session code.
    OpenJoin,
    /// A session was created or resolved from a code.
    SessionLoaded,
    /// Nickname accepted and the session joined; the run has this many questions.
    NicknameAccepted {
        /// Number of questions in the loaded session.
        question_count: usize,
    },
    /// The current question got its answer or timed out.
    QuestionClosed,
    /// Leave the run and go back to the landing screen.
    ReturnHome,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RunPhase,
    /// The event that cannot be applied from this phase.
    pub event: RunEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: RunPhase,
        /// Current phase.
        actual: RunPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: RunPhase,
    /// Phase the state machine will transition to.
    pub to: RunPhase,
    /// Event that triggered this transition.
    pub event: RunEvent,
    /// Question count after applying this transition.
    pub question_count_next: usize,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: RunPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<RunPhase>,
}

/// View state machine of one player's run: home → join → nickname → questions → results.
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    phase: RunPhase,
    question_count: usize,
    version: usize,
    pending: Option<Plan>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self {
            phase: RunPhase::Home,
            question_count: 0,
            version: 0,
            pending: None,
        }
    }
}

impl RunStateMachine {
    /// Create a new state machine on the home screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Index of the question being answered, if any.
    pub fn question_index(&self) -> Option<usize> {
        match self.phase {
            RunPhase::Question(index) => Some(index),
            _ => None,
        }
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: RunEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let (next, question_count_next) = self
            .compute_transition(event.clone())
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            question_count_next,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<RunPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.question_count = plan.question_count_next;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Plan and immediately apply a transition that needs no external work.
    pub fn fire(&mut self, event: RunEvent) -> Result<RunPhase, PlanError> {
        let plan = self.plan(event)?;
        self.phase = plan.to;
        self.question_count = plan.question_count_next;
        self.version = plan.version_next;
        self.pending = None;
        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute the next phase (and question count) if the transition is valid.
    fn compute_transition(&self, event: RunEvent) -> Result<(RunPhase, usize), InvalidTransition> {
        let next = match (self.phase, &event) {
            (RunPhase::Home, RunEvent::OpenJoin) => (RunPhase::Join, 0),
            (RunPhase::Home | RunPhase::Join, RunEvent::SessionLoaded) => {
                (RunPhase::NicknameEntry, 0)
            }
            (RunPhase::NicknameEntry, RunEvent::NicknameAccepted { question_count })
                if *question_count > 0 =>
            {
                (RunPhase::Question(0), *question_count)
            }
            (RunPhase::Question(index), RunEvent::QuestionClosed) => {
                if index + 1 < self.question_count {
                    (RunPhase::Question(index + 1), self.question_count)
                } else {
                    (RunPhase::Results, self.question_count)
                }
            }
            (
                RunPhase::Join | RunPhase::NicknameEntry | RunPhase::Results,
                RunEvent::ReturnHome,
            ) => (RunPhase::Home, 0),
            (from, _) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RunStateMachine, event: RunEvent) -> RunPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_home() {
        let sm = RunStateMachine::new();
        assert_eq!(sm.phase(), RunPhase::Home);
        assert_eq!(sm.question_index(), None);
    }

    #[test]
    fn full_happy_path_through_run() {
        let mut sm = RunStateMachine::new();

        assert_eq!(apply(&mut sm, RunEvent::SessionLoaded), RunPhase::NicknameEntry);
        assert_eq!(
            apply(&mut sm, RunEvent::NicknameAccepted { question_count: 3 }),
            RunPhase::Question(0)
        );
        assert_eq!(apply(&mut sm, RunEvent::QuestionClosed), RunPhase::Question(1));
        assert_eq!(apply(&mut sm, RunEvent::QuestionClosed), RunPhase::Question(2));
        assert_eq!(apply(&mut sm, RunEvent::QuestionClosed), RunPhase::Results);
        assert_eq!(apply(&mut sm, RunEvent::ReturnHome), RunPhase::Home);
        assert_eq!(sm.snapshot().version, 6);
    }

    #[test]
    fn join_code_path() {
        let mut sm = RunStateMachine::new();
        assert_eq!(apply(&mut sm, RunEvent::OpenJoin), RunPhase::Join);
        assert_eq!(apply(&mut sm, RunEvent::SessionLoaded), RunPhase::NicknameEntry);
        assert_eq!(apply(&mut sm, RunEvent::ReturnHome), RunPhase::Home);
    }

    #[test]
    fn single_question_run_goes_straight_to_results() {
        let mut sm = RunStateMachine::new();
        sm.fire(RunEvent::SessionLoaded).unwrap();
        sm.fire(RunEvent::NicknameAccepted { question_count: 1 }).unwrap();
        assert_eq!(sm.fire(RunEvent::QuestionClosed).unwrap(), RunPhase::Results);
    }

    #[test]
    fn empty_question_set_cannot_start() {
        let mut sm = RunStateMachine::new();
        sm.fire(RunEvent::SessionLoaded).unwrap();
        let err = sm
            .plan(RunEvent::NicknameAccepted { question_count: 0 })
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition(_)));
        assert_eq!(sm.phase(), RunPhase::NicknameEntry);
    }

    #[test]
    fn cannot_leave_mid_question_or_close_twice_from_results() {
        let mut sm = RunStateMachine::new();
        sm.fire(RunEvent::SessionLoaded).unwrap();
        sm.fire(RunEvent::NicknameAccepted { question_count: 1 }).unwrap();

        let err = sm.plan(RunEvent::ReturnHome).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, RunPhase::Question(0));
                assert_eq!(invalid.event, RunEvent::ReturnHome);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        sm.fire(RunEvent::QuestionClosed).unwrap();
        assert!(sm.plan(RunEvent::QuestionClosed).is_err());
    }

    #[test]
    fn pending_plan_blocks_other_plans() {
        let mut sm = RunStateMachine::new();
        let plan = sm.plan(RunEvent::SessionLoaded).unwrap();
        assert_eq!(sm.snapshot().pending, Some(RunPhase::NicknameEntry));
        assert_eq!(sm.plan(RunEvent::OpenJoin).unwrap_err(), PlanError::AlreadyPending);
        sm.apply(plan.id).unwrap();
        assert_eq!(sm.snapshot().pending, None);
    }

    #[test]
    fn abort_clears_pending_and_keeps_phase() {
        let mut sm = RunStateMachine::new();
        let plan = sm.plan(RunEvent::SessionLoaded).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), RunPhase::Home);
        assert_eq!(sm.apply(plan.id).unwrap_err(), ApplyError::NoPending);
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan() {
        let mut sm = RunStateMachine::new();
        let plan = sm.plan(RunEvent::OpenJoin).unwrap();
        let wrong = Uuid::new_v4();
        assert!(matches!(
            sm.apply(wrong),
            Err(ApplyError::IdMismatch { .. })
        ));
        assert_eq!(sm.apply(plan.id).unwrap(), RunPhase::Join);
    }
}
