//! Server-hosted quiz runs: one view state machine per identity, driven by `/play` requests.

use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    dto::play::{AnswerResponse, PlaySnapshot},
    error::ServiceError,
    services::{leaderboard_service, session_service},
    state::{
        QuestionExpired, SharedState,
        countdown::{Countdown, CountdownTimer},
        player::PlayerId,
        run::{PlayerRun, RunPlayer, RunState, SubmissionStatus},
        scoring::{self, QuestionScore, TIME_LIMIT},
        state_machine::{RunEvent, RunPhase},
    },
};

/// Runs untouched for this long are no longer hosted.
pub const RUN_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// How often idle runs are looked for.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Current view of the caller's run; callers without one see the home screen.
pub async fn snapshot(state: &SharedState, caller: &PlayerId) -> Result<PlaySnapshot, ServiceError> {
    let Some(handle) = state.existing_run(caller) else {
        return Ok(render(state, caller, &PlayerRun::new()).await);
    };
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;
    Ok(render(state, caller, &run).await)
}

/// App start, optionally through a shared session code.
///
/// A run already past the home screen is resumed untouched. Otherwise a shared code
/// loads that session onto the nickname screen, with the remembered nickname offered.
pub async fn open(
    state: &SharedState,
    caller: &PlayerId,
    session_id: Option<String>,
) -> Result<PlaySnapshot, ServiceError> {
    let shared = session_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty());
    let handle = match state.existing_run(caller) {
        Some(handle) => handle,
        None if shared.is_some() => state.run_for(caller),
        None => {
            let mut home = PlayerRun::new();
            home.nickname_suggestion = state.nicknames().load_last_nickname(caller);
            return Ok(render(state, caller, &home).await);
        }
    };
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;

    if run.phase() != RunPhase::Home {
        debug!(player_id = %caller, phase = ?run.phase(), "resuming hosted run");
        return Ok(render(state, caller, &run).await);
    }

    if let Some(session_id) = shared {
        let (session, _) = run
            .run_transition(
                RunEvent::SessionLoaded,
                state.transition_timeout(),
                move || async move { session_service::load_active_session(state, &session_id).await },
            )
            .await?;
        run.session = Some(session);
    }
    run.nickname_suggestion = state.nicknames().load_last_nickname(caller);

    Ok(render(state, caller, &run).await)
}

/// Create a session from the question pool and move to the nickname screen.
pub async fn start_new_quiz(
    state: &SharedState,
    caller: &PlayerId,
    question_count: Option<usize>,
) -> Result<PlaySnapshot, ServiceError> {
    let handle = state.run_for(caller);
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;

    let (session, _) = run
        .run_transition(
            RunEvent::SessionLoaded,
            state.transition_timeout(),
            move || async move { session_service::start_session(state, caller, question_count).await },
        )
        .await?;
    run.session = Some(session);
    run.nickname_suggestion = state.nicknames().load_last_nickname(caller);

    Ok(render(state, caller, &run).await)
}

/// Go to the join-code screen.
pub async fn open_join(state: &SharedState, caller: &PlayerId) -> Result<PlaySnapshot, ServiceError> {
    let handle = state.run_for(caller);
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;
    run.fire(RunEvent::OpenJoin)?;
    Ok(render(state, caller, &run).await)
}

/// Resolve a typed session code; only active sessions can be entered.
pub async fn enter_join_code(
    state: &SharedState,
    caller: &PlayerId,
    session_id: &str,
) -> Result<PlaySnapshot, ServiceError> {
    let handle = state.run_for(caller);
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;

    let (session, _) = run
        .run_transition(
            RunEvent::SessionLoaded,
            state.transition_timeout(),
            move || async move { session_service::load_active_session(state, session_id).await },
        )
        .await?;
    run.session = Some(session);
    run.nickname_suggestion = state.nicknames().load_last_nickname(caller);

    Ok(render(state, caller, &run).await)
}

/// Accept the nickname, join the loaded session and show the first question.
///
/// An identity that already joined proceeds as if the join succeeded.
pub async fn submit_nickname(
    state: &SharedState,
    caller: &PlayerId,
    nickname: &str,
) -> Result<PlaySnapshot, ServiceError> {
    let nickname = session_service::normalize_nickname(nickname)?;
    let handle = state.run_for(caller);
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;

    let (session_id, question_count) = run
        .session
        .as_ref()
        .map(|session| (session.id.clone(), session.questions.len()))
        .unwrap_or_default();

    let (joined, _) = {
        let nickname = nickname.as_str();
        let session_id = session_id.as_str();
        run.run_transition(
            RunEvent::NicknameAccepted { question_count },
            state.transition_timeout(),
            move || async move {
                state.nicknames().save_last_nickname(caller, nickname);
                session_service::join_session(state, caller, session_id, nickname).await
            },
        )
        .await?
    };
    if !joined {
        debug!(player_id = %caller, session_id = %session_id, "already joined; continuing run");
    }

    let questions = run
        .session
        .as_ref()
        .map(|session| session.questions.clone())
        .unwrap_or_default();
    run.run = Some(RunState::begin(
        session_id,
        questions,
        RunPlayer {
            id: caller.clone(),
            nickname,
        },
    ));
    run.nickname_suggestion = None;
    begin_question(state, caller, &mut run);

    Ok(render(state, caller, &run).await)
}

/// Lock in an answer for the open question.
///
/// Only the question currently displayed can be answered, and only once; a question
/// whose countdown ran out is closed as a timeout first.
pub async fn answer(
    state: &SharedState,
    caller: &PlayerId,
    question_index: usize,
    alternative_id: &str,
) -> Result<AnswerResponse, ServiceError> {
    let handle = state.run_for(caller);
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;

    let RunPhase::Question(current) = run.phase() else {
        return Err(ServiceError::InvalidState("no question is open".into()));
    };
    if question_index < current {
        return Err(ServiceError::InvalidState(format!(
            "answer already locked for question {question_index}"
        )));
    }
    if question_index > current {
        return Err(ServiceError::InvalidState(format!(
            "question {question_index} is not open yet"
        )));
    }

    let progress = run
        .run
        .as_ref()
        .ok_or_else(|| ServiceError::InvalidState("run has no questions".into()))?;
    let question = progress
        .current_question()
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState("run has no open question".into()))?;
    if !question.has_alternative(alternative_id) {
        return Err(ServiceError::InvalidInput(format!(
            "unknown alternative `{alternative_id}`"
        )));
    }

    let elapsed = progress
        .countdown
        .map_or(Duration::ZERO, |countdown| countdown.elapsed_at(Instant::now()));
    let result = scoring::score_question(question.is_correct(alternative_id), elapsed.as_secs_f64());
    debug!(
        player_id = %caller,
        question_index,
        elapsed_ms = elapsed.as_millis() as u64,
        points = result.total(),
        "answer locked"
    );

    close_question(state, caller, &mut run, result).await?;

    Ok(AnswerResponse {
        correct: result.is_correct(),
        correct_answer_id: question.correct_answer_id,
        score: result.into(),
        snapshot: render(state, caller, &run).await,
    })
}

/// Close a question whose countdown fired. Stale expiries are ignored.
pub async fn expire(state: &SharedState, expired: QuestionExpired) -> Result<(), ServiceError> {
    let Some(handle) = state.existing_run(&expired.player_id) else {
        debug!(player_id = %expired.player_id, "expiry for unknown run ignored");
        return Ok(());
    };
    let mut run = handle.lock().await;

    let live = run.phase() == RunPhase::Question(expired.question_index)
        && run.run.as_ref().is_some_and(|progress| {
            progress.session_id == expired.session_id
                && progress.current_question_index == expired.question_index
                && progress
                    .countdown
                    .is_some_and(|countdown| countdown.is_expired_at(Instant::now()))
        });
    if !live {
        debug!(
            player_id = %expired.player_id,
            session_id = %expired.session_id,
            question_index = expired.question_index,
            "stale expiry ignored"
        );
        return Ok(());
    }

    run.timer = None;
    close_question(state, &expired.player_id, &mut run, scoring::timeout_score()).await
}

/// Leave the run and go back to the landing screen, discarding its data.
pub async fn return_home(state: &SharedState, caller: &PlayerId) -> Result<PlaySnapshot, ServiceError> {
    let handle = state.run_for(caller);
    let mut run = handle.lock().await;
    close_if_expired(state, caller, &mut run).await?;
    run.fire(RunEvent::ReturnHome)?;
    run.discard();
    let home = render(state, caller, &run).await;
    drop(run);

    state.release_run(caller, &handle);
    Ok(home)
}

/// Spawn the task closing questions as their countdowns fire.
///
/// Each expiry is handled on its own task so a slow score submission for one player
/// never holds back the others. Returns `None` when a worker already owns the channel.
pub async fn spawn_expiry_worker(state: SharedState) -> Option<JoinHandle<()>> {
    let mut expiries = state.take_expiry_receiver().await?;
    Some(tokio::spawn(async move {
        while let Some(expired) = expiries.recv().await {
            let state = state.clone();
            tokio::spawn(async move {
                let player_id = expired.player_id.clone();
                if let Err(err) = expire(&state, expired).await {
                    warn!(player_id = %player_id, error = %err, "failed to close expired question");
                }
            });
        }
    }))
}

/// Spawn the task that stops hosting runs left on the home screen or idle for
/// [`RUN_IDLE_TIMEOUT`].
pub fn spawn_run_reaper(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval(EVICTION_INTERVAL);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let evicted = state.evict_idle_runs(Instant::now(), RUN_IDLE_TIMEOUT);
            if evicted > 0 {
                debug!(evicted, hosted = state.hosted_runs(), "evicted idle runs");
            }
        }
    })
}

fn begin_question(state: &SharedState, caller: &PlayerId, run: &mut PlayerRun) {
    let Some(progress) = run.run.as_mut() else {
        return;
    };
    let countdown = Countdown::start(TIME_LIMIT);
    progress.countdown = Some(countdown);
    let expired = QuestionExpired {
        player_id: caller.clone(),
        session_id: progress.session_id.clone(),
        question_index: progress.current_question_index,
    };

    let timer = CountdownTimer::arm(&countdown, state.expiry_sender(), expired);
    if let Some(previous) = run.timer.replace(timer) {
        previous.cancel();
    }
}

async fn close_if_expired(
    state: &SharedState,
    caller: &PlayerId,
    run: &mut PlayerRun,
) -> Result<(), ServiceError> {
    let expired = matches!(run.phase(), RunPhase::Question(_))
        && run
            .run
            .as_ref()
            .and_then(|progress| progress.countdown)
            .is_some_and(|countdown| countdown.is_expired_at(Instant::now()));
    if expired {
        debug!(player_id = %caller, "closing timed out question");
        close_question(state, caller, run, scoring::timeout_score()).await?;
    }
    Ok(())
}

async fn close_question(
    state: &SharedState,
    caller: &PlayerId,
    run: &mut PlayerRun,
    result: QuestionScore,
) -> Result<(), ServiceError> {
    if run.run.is_none() {
        return Err(ServiceError::InvalidState("run has no questions".into()));
    }
    let next = run.fire(RunEvent::QuestionClosed)?;
    if let Some(timer) = run.timer.take() {
        timer.cancel();
    }
    if let Some(progress) = run.run.as_mut() {
        progress.record(result)?;
    }

    match next {
        RunPhase::Results => finish(state, caller, run).await,
        _ => begin_question(state, caller, run),
    }
    Ok(())
}

/// Submit the final score once; a failure is logged and the results still show.
async fn finish(state: &SharedState, caller: &PlayerId, run: &mut PlayerRun) {
    let Some(progress) = run.run.as_mut() else {
        return;
    };
    let total = progress.total();
    let session_id = progress.session_id.clone();
    let nickname = progress.player.nickname.clone();

    let outcome = bounded(
        state.transition_timeout(),
        session_service::submit_score(state, caller, &session_id, total, &nickname, progress.outcomes()),
    )
    .await;

    progress.submission = match outcome {
        Ok(()) => {
            info!(player_id = %caller, session_id = %session_id, total, "run finished");
            SubmissionStatus::Submitted
        }
        Err(err) => {
            warn!(player_id = %caller, session_id = %session_id, error = %err, "failed to submit final score");
            SubmissionStatus::Failed(err.to_string())
        }
    };
}

async fn bounded<T, F>(limit: Option<Duration>, work: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match limit {
        Some(limit) => timeout(limit, work).await.unwrap_or(Err(ServiceError::Timeout)),
        None => work.await,
    }
}

async fn render(state: &SharedState, caller: &PlayerId, run: &PlayerRun) -> PlaySnapshot {
    let board = match (run.phase(), run.run.as_ref()) {
        (RunPhase::Results, Some(progress)) => {
            match leaderboard_service::get_leaderboard(state, &progress.session_id).await {
                Ok(board) => Some(board),
                Err(err) => {
                    warn!(session_id = %progress.session_id, error = %err, "leaderboard unavailable");
                    None
                }
            }
        }
        _ => None,
    };
    PlaySnapshot::render(run, caller, Instant::now(), board)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::memory::MemorySessionStore,
        dto::play::{PlayPhase, SubmissionView},
        services::session_service::{close_session, start_session},
        state::{
            AppState,
            quiz::{Alternative, Question},
        },
    };

    fn pool() -> Vec<Question> {
        (0..2)
            .map(|n| Question {
                id: format!("q{n}"),
                text: format!("question {n}"),
                alternatives: ["a", "b", "c", "d"]
                    .into_iter()
                    .map(|id| Alternative {
                        id: id.into(),
                        text: id.to_uppercase(),
                    })
                    .collect(),
                correct_answer_id: "a".into(),
            })
            .collect()
    }

    async fn state() -> (SharedState, MemorySessionStore) {
        let config = AppConfig {
            questions_per_session: 2,
            questions: pool(),
            ..AppConfig::default()
        };
        let state = AppState::new(config);
        let store = MemorySessionStore::new();
        state.set_session_store(Arc::new(store.clone())).await;
        (state, store)
    }

    async fn at_first_question(state: &SharedState, caller: &PlayerId) -> PlaySnapshot {
        start_new_quiz(state, caller, None).await.unwrap();
        submit_nickname(state, caller, "ann").await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_reaches_results_and_submits() {
        let (state, _) = state().await;
        let me = PlayerId::generate();

        let first = at_first_question(&state, &me).await;
        assert_eq!(first.phase, PlayPhase::Question);
        assert_eq!(first.question_index, Some(0));
        assert_eq!(first.remaining_ms, Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(5)).await;
        let correct = answer(&state, &me, 0, "a").await.unwrap();
        assert!(correct.correct);
        assert_eq!(correct.score.total, 350);
        assert_eq!(correct.snapshot.question_index, Some(1));

        let wrong = answer(&state, &me, 1, "b").await.unwrap();
        assert!(!wrong.correct);
        assert_eq!(wrong.correct_answer_id, "a");
        assert_eq!(wrong.score.total, 300);

        let done = wrong.snapshot;
        assert_eq!(done.phase, PlayPhase::Results);
        assert_eq!(done.per_question_scores.len(), 2);
        assert_eq!(done.correct_count, 1);
        let results = done.results.unwrap();
        assert_eq!(results.total_score, 650);
        assert_eq!(results.max_score, 800);
        assert_eq!(results.submission, SubmissionView::Submitted);
        assert_eq!(results.rank, Some(1));
        assert_eq!(results.leaderboard[0].score, 650);
    }

    #[tokio::test(start_paused = true)]
    async fn second_answer_for_same_question_is_locked() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        at_first_question(&state, &me).await;

        answer(&state, &me, 0, "a").await.unwrap();
        let err = answer(&state, &me, 0, "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(msg) if msg.contains("already locked")));

        let snap = snapshot(&state, &me).await.unwrap();
        assert_eq!(snap.per_question_scores.len(), 1);
        assert_eq!(snap.question_index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_alternative_is_rejected_without_closing() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        at_first_question(&state, &me).await;

        let err = answer(&state, &me, 0, "zzz").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(snapshot(&state, &me).await.unwrap().question_index, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_countdown_closes_question_on_next_access() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        at_first_question(&state, &me).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        let err = answer(&state, &me, 0, "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(msg) if msg.contains("already locked")));

        let snap = snapshot(&state, &me).await.unwrap();
        assert_eq!(snap.question_index, Some(1));
        assert_eq!(snap.per_question_scores[0].total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_worker_closes_question_when_timer_fires() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        let worker = spawn_expiry_worker(state.clone()).await.unwrap();
        assert!(spawn_expiry_worker(state.clone()).await.is_none());
        at_first_question(&state, &me).await;

        tokio::time::sleep(Duration::from_secs(31)).await;

        let handle = state.existing_run(&me).unwrap();
        let run = handle.lock().await;
        assert_eq!(run.phase(), RunPhase::Question(1));
        let progress = run.run.as_ref().unwrap();
        assert_eq!(progress.per_question_scores, [QuestionScore::default()]);
        drop(run);
        worker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_expiry_is_ignored() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        let snap = at_first_question(&state, &me).await;
        answer(&state, &me, 0, "a").await.unwrap();

        expire(
            &state,
            QuestionExpired {
                player_id: me.clone(),
                session_id: snap.session_id.unwrap(),
                question_index: 0,
            },
        )
        .await
        .unwrap();

        let after = snapshot(&state, &me).await.unwrap();
        assert_eq!(after.question_index, Some(1));
        assert_eq!(after.per_question_scores.len(), 1);
    }

    #[tokio::test]
    async fn unknown_join_code_keeps_join_screen() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        open_join(&state, &me).await.unwrap();

        let err = enter_join_code(&state, &me, "quick-race-404").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(snapshot(&state, &me).await.unwrap().phase, PlayPhase::Join);
    }

    #[tokio::test]
    async fn closed_session_cannot_be_entered() {
        let (state, _) = state().await;
        let host = PlayerId::generate();
        let session = start_session(&state, &host, Some(1)).await.unwrap();
        close_session(&state, &host, &session.id).await.unwrap();

        let me = PlayerId::generate();
        open_join(&state, &me).await.unwrap();
        let err = enter_join_code(&state, &me, &session.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InactiveSession(_)));
    }

    #[tokio::test]
    async fn open_with_shared_code_offers_remembered_nickname() {
        let (state, _) = state().await;
        let host = PlayerId::generate();
        let session = start_session(&state, &host, Some(1)).await.unwrap();
        let me = PlayerId::generate();
        state.nicknames().save_last_nickname(&me, "annie");

        let snap = open(&state, &me, Some(session.id.clone())).await.unwrap();
        assert_eq!(snap.phase, PlayPhase::NicknameEntry);
        assert_eq!(snap.session_id.as_deref(), Some(session.id.as_str()));
        assert_eq!(snap.nickname_suggestion.as_deref(), Some("annie"));
    }

    #[tokio::test(start_paused = true)]
    async fn open_resumes_run_in_progress() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        at_first_question(&state, &me).await;
        answer(&state, &me, 0, "a").await.unwrap();

        let resumed = open(&state, &me, Some("cool-duel-001".into())).await.unwrap();
        assert_eq!(resumed.phase, PlayPhase::Question);
        assert_eq!(resumed.question_index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn rejoining_proceeds_as_already_joined() {
        let (state, _) = state().await;
        let host = PlayerId::generate();
        let session = start_session(&state, &host, None).await.unwrap();
        let me = PlayerId::generate();
        session_service::join_session(&state, &me, &session.id, "ann").await.unwrap();

        open(&state, &me, Some(session.id.clone())).await.unwrap();
        let snap = submit_nickname(&state, &me, "ann").await.unwrap();
        assert_eq!(snap.phase, PlayPhase::Question);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_still_shows_results() {
        let (state, store) = state().await;
        let me = PlayerId::generate();
        at_first_question(&state, &me).await;
        answer(&state, &me, 0, "a").await.unwrap();

        store.set_offline(true);
        let done = answer(&state, &me, 1, "a").await.unwrap().snapshot;
        assert_eq!(done.phase, PlayPhase::Results);
        let results = done.results.unwrap();
        assert!(matches!(results.submission, SubmissionView::Failed { .. }));
        assert!(results.leaderboard.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn return_home_discards_run() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        at_first_question(&state, &me).await;

        let err = return_home(&state, &me).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        answer(&state, &me, 0, "a").await.unwrap();
        answer(&state, &me, 1, "a").await.unwrap();
        let home = return_home(&state, &me).await.unwrap();
        assert_eq!(home.phase, PlayPhase::Home);
        assert_eq!(home.session_id, None);
        assert!(home.per_question_scores.is_empty());
    }

    #[tokio::test]
    async fn read_only_views_host_no_runs() {
        let (state, _) = state().await;
        for _ in 0..100 {
            let snap = snapshot(&state, &PlayerId::generate()).await.unwrap();
            assert_eq!(snap.phase, PlayPhase::Home);
        }
        let me = PlayerId::generate();
        state.nicknames().save_last_nickname(&me, "annie");
        let home = open(&state, &me, None).await.unwrap();
        assert_eq!(home.nickname_suggestion.as_deref(), Some("annie"));

        assert_eq!(state.hosted_runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn returning_home_stops_hosting_run() {
        let (state, _) = state().await;
        let me = PlayerId::generate();
        at_first_question(&state, &me).await;
        answer(&state, &me, 0, "a").await.unwrap();
        answer(&state, &me, 1, "a").await.unwrap();
        assert_eq!(state.hosted_runs(), 1);

        return_home(&state, &me).await.unwrap();
        assert_eq!(state.hosted_runs(), 0);
        assert_eq!(snapshot(&state, &me).await.unwrap().phase, PlayPhase::Home);
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_drops_home_and_idle_runs() {
        let (state, _) = state().await;
        let idle = PlayerId::generate();
        open_join(&state, &idle).await.unwrap();
        let failed = PlayerId::generate();
        let err = open(&state, &failed, Some("quick-race-404".into())).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(state.hosted_runs(), 2);

        let reaper = spawn_run_reaper(state.clone());
        tokio::time::sleep(EVICTION_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(state.hosted_runs(), 1);
        assert_eq!(snapshot(&state, &idle).await.unwrap().phase, PlayPhase::Join);

        tokio::time::sleep(RUN_IDLE_TIMEOUT + EVICTION_INTERVAL).await;
        assert_eq!(state.hosted_runs(), 0);
        reaper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn busy_run_does_not_hold_back_other_expiries() {
        let (state, _) = state().await;
        let worker = spawn_expiry_worker(state.clone()).await.unwrap();
        let busy = PlayerId::generate();
        let other = PlayerId::generate();
        at_first_question(&state, &busy).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        at_first_question(&state, &other).await;

        let busy_handle = state.existing_run(&busy).unwrap();
        let held = busy_handle.lock().await;
        tokio::time::sleep(Duration::from_secs(31)).await;

        let other_handle = state.existing_run(&other).unwrap();
        assert_eq!(other_handle.lock().await.phase(), RunPhase::Question(1));
        assert_eq!(held.phase(), RunPhase::Question(0));

        drop(held);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(busy_handle.lock().await.phase(), RunPhase::Question(1));
        worker.abort();
    }
}
