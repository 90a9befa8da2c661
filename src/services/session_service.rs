use std::time::SystemTime;

use rand::{Rng, seq::IndexedRandom};
use tracing::{debug, info, warn};

use crate::{
    dao::models::{JoinOutcome, QuestionOutcomeEntity, QuestionStatsEntity},
    error::ServiceError,
    state::{
        SharedState,
        player::PlayerId,
        quiz::{Participant, Question, Session, draw_questions},
    },
};

const ADJECTIVES: [&str; 8] = [
    "happy", "clever", "quick", "brave", "wise", "funny", "smart", "cool",
];
const NOUNS: [&str; 8] = [
    "quiz",
    "game",
    "test",
    "challenge",
    "match",
    "battle",
    "duel",
    "race",
];
/// Longest nickname accepted after trimming.
pub const MAX_NICKNAME_CHARS: usize = 32;
/// Longest session or question id accepted.
pub const MAX_KEY_CHARS: usize = 64;

/// Human-readable session code shaped like `brave-duel-042`.
pub fn generate_session_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or(ADJECTIVES[0]);
    let noun = NOUNS.choose(rng).copied().unwrap_or(NOUNS[0]);
    let number: u16 = rng.random_range(0..1000);
    format!("{adjective}-{noun}-{number:03}")
}

/// Trim a nickname and check it is usable.
pub fn normalize_nickname(nickname: &str) -> Result<String, ServiceError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(
            "nickname must not be empty".into(),
        ));
    }
    if trimmed.chars().count() > MAX_NICKNAME_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "nickname must be at most {MAX_NICKNAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Whether `key` can name a session or question: 1 to [`MAX_KEY_CHARS`] characters
/// from `[A-Za-z0-9_-]`, so it is safe inside document ids and URL paths.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_CHARS
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn require_session_id(session_id: &str) -> Result<&str, ServiceError> {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(
            "session id must not be empty".into(),
        ));
    }
    if !is_valid_key(trimmed) {
        return Err(ServiceError::InvalidInput(format!(
            "session id may only hold up to {MAX_KEY_CHARS} letters, digits, `-` or `_`"
        )));
    }
    Ok(trimmed)
}

fn not_found(session_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("session `{session_id}` not found"))
}

/// Persist a new session holding `questions`, hosted by `caller`.
///
/// A taken id is retried with a fresh one up to the configured number of attempts.
pub async fn create_session(
    state: &SharedState,
    caller: &PlayerId,
    questions: Vec<Question>,
) -> Result<Session, ServiceError> {
    create_session_with_ids(state, caller, questions, || {
        generate_session_id(&mut rand::rng())
    })
    .await
}

async fn create_session_with_ids<F>(
    state: &SharedState,
    caller: &PlayerId,
    questions: Vec<Question>,
    mut next_id: F,
) -> Result<Session, ServiceError>
where
    F: FnMut() -> String,
{
    if questions.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a session requires at least one question".into(),
        ));
    }

    let store = state.require_session_store().await?;
    let attempts = state.config().session_id_attempts;

    for attempt in 1..=attempts {
        let session = Session::new(next_id(), questions.clone(), caller.clone());
        if store.insert_session(session.clone().into()).await? {
            info!(session_id = %session.id, host = %caller, questions = session.questions.len(), "session created");
            return Ok(session);
        }
        debug!(session_id = %session.id, attempt, "session id already taken; retrying");
    }

    warn!(attempts, "could not allocate a free session id");
    Err(ServiceError::InvalidState(format!(
        "no free session id found after {attempts} attempt(s)"
    )))
}

/// Draw questions from the question source and create a session with them.
pub async fn start_session(
    state: &SharedState,
    caller: &PlayerId,
    question_count: Option<usize>,
) -> Result<Session, ServiceError> {
    let count = question_count.unwrap_or(state.config().questions_per_session);
    if count == 0 {
        return Err(ServiceError::InvalidInput(
            "question count must be positive".into(),
        ));
    }

    let pool = state.questions().fetch_question_pool().await?;
    let questions = draw_questions(&pool, count, &mut rand::rng());
    if questions.is_empty() {
        return Err(ServiceError::InvalidState("question pool is empty".into()));
    }

    create_session(state, caller, questions).await
}

/// Read a session through to the store.
pub async fn get_session(
    state: &SharedState,
    session_id: &str,
) -> Result<Option<Session>, ServiceError> {
    let session_id = require_session_id(session_id)?;
    let store = state.require_session_store().await?;
    let entity = store.find_session(session_id.to_owned()).await?;
    Ok(entity.map(Session::try_from).transpose()?)
}

/// Read a session, failing with [`ServiceError::NotFound`] when absent.
pub async fn load_session(state: &SharedState, session_id: &str) -> Result<Session, ServiceError> {
    get_session(state, session_id)
        .await?
        .ok_or_else(|| not_found(session_id.trim()))
}

/// Read a session that still accepts players.
pub async fn load_active_session(
    state: &SharedState,
    session_id: &str,
) -> Result<Session, ServiceError> {
    let session = load_session(state, session_id).await?;
    if !session.is_active {
        return Err(ServiceError::InactiveSession(session.id));
    }
    Ok(session)
}

/// Join `caller` to a session under `nickname`.
///
/// Returns `false` when the identity already joined; the existing entry is kept.
pub async fn join_session(
    state: &SharedState,
    caller: &PlayerId,
    session_id: &str,
    nickname: &str,
) -> Result<bool, ServiceError> {
    let nickname = normalize_nickname(nickname)?;
    let session = load_active_session(state, session_id).await?;
    let store = state.require_session_store().await?;

    let outcome = store
        .insert_participant(
            session.id.clone(),
            caller.to_string(),
            Participant::joining(nickname, SystemTime::now()).into(),
        )
        .await?;

    match outcome {
        JoinOutcome::Joined => {
            info!(session_id = %session.id, player_id = %caller, "participant joined");
            Ok(true)
        }
        JoinOutcome::AlreadyJoined => {
            debug!(session_id = %session.id, player_id = %caller, "participant already joined");
            Ok(false)
        }
        JoinOutcome::SessionMissing => Err(not_found(&session.id)),
    }
}

/// Record the final score of `caller`, joining it first if needed.
///
/// Outcomes feed the per-question statistics; failing to update them is only logged.
pub async fn submit_score(
    state: &SharedState,
    caller: &PlayerId,
    session_id: &str,
    score: u32,
    nickname: &str,
    outcomes: Vec<QuestionOutcomeEntity>,
) -> Result<(), ServiceError> {
    let session_id = require_session_id(session_id)?.to_owned();
    let nickname = normalize_nickname(nickname)?;
    let store = state.require_session_store().await?;
    let now = SystemTime::now();

    let joined = store
        .insert_participant(
            session_id.clone(),
            caller.to_string(),
            Participant::joining(nickname, now).into(),
        )
        .await?;
    if joined == JoinOutcome::SessionMissing {
        return Err(not_found(&session_id));
    }

    if !store
        .record_score(session_id.clone(), caller.to_string(), score, now)
        .await?
    {
        return Err(not_found(&session_id));
    }
    info!(session_id = %session_id, player_id = %caller, score, "score submitted");

    let outcomes: Vec<_> = outcomes
        .into_iter()
        .filter(|outcome| {
            let usable = is_valid_key(&outcome.question_id);
            if !usable {
                warn!(question_id = %outcome.question_id, "skipping outcome with unusable question id");
            }
            usable
        })
        .collect();
    if !outcomes.is_empty() {
        if let Err(err) = store.record_question_outcomes(outcomes, now).await {
            warn!(session_id = %session_id, error = %err, "failed to update question statistics");
        }
    }

    Ok(())
}

/// Stop a session from accepting players. Only its creator may do so.
pub async fn close_session(
    state: &SharedState,
    caller: &PlayerId,
    session_id: &str,
) -> Result<Session, ServiceError> {
    let mut session = load_session(state, session_id).await?;
    if &session.created_by != caller {
        return Err(ServiceError::Unauthorized(
            "only the session creator can close it".into(),
        ));
    }
    if !session.is_active {
        return Ok(session);
    }

    let store = state.require_session_store().await?;
    if !store.set_active(session.id.clone(), false).await? {
        return Err(not_found(&session.id));
    }
    info!(session_id = %session.id, "session closed");
    session.is_active = false;
    Ok(session)
}

/// Answer counters of one question.
pub async fn question_stats(
    state: &SharedState,
    question_id: &str,
) -> Result<QuestionStatsEntity, ServiceError> {
    let question_id = question_id.trim();
    if !is_valid_key(question_id) {
        return Err(ServiceError::InvalidInput(format!(
            "question id must hold 1 to {MAX_KEY_CHARS} letters, digits, `-` or `_`"
        )));
    }
    let store = state.require_session_store().await?;
    store
        .find_question_stats(question_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no statistics for question `{question_id}`")))
}
