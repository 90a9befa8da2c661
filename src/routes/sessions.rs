use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        leaderboard::LeaderboardResponse,
        session::{
            CreateSessionRequest, JoinSessionRequest, JoinSessionResponse, QuestionStatsResponse,
            RecentSessionItem, RecentSessionsQuery, SessionResponse, SubmitScoreRequest,
        },
    },
    error::AppError,
    routes::Caller,
    services::{leaderboard_service, session_service},
    state::SharedState,
};

/// Session lifecycle, leaderboard and statistics endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/recent", get(recent_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/join", post(join_session))
        .route("/sessions/{id}/score", post(submit_score))
        .route("/sessions/{id}/close", post(close_session))
        .route("/sessions/{id}/leaderboard", get(get_leaderboard))
        .route("/questions/{id}/stats", get(question_stats))
}

/// Draw questions from the pool and host a new session.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 401, description = "Missing identity"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = session_service::start_session(&state, &caller, payload.question_count).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Resolve a session code.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = session_service::load_session(&state, &id).await?;
    Ok(Json(session.into()))
}

/// Join a session; joining twice reports `joined: false`.
#[utoipa::path(
    post,
    path = "/sessions/{id}/join",
    tag = "sessions",
    params(
        ("id" = String, Path, description = "Session code"),
        ("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")
    ),
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Join outcome", body = JoinSessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session closed")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinSessionRequest>>,
) -> Result<Json<JoinSessionResponse>, AppError> {
    let joined = session_service::join_session(&state, &caller, &id, &payload.nickname).await?;
    Ok(Json(JoinSessionResponse {
        session_id: id.trim().to_owned(),
        joined,
    }))
}

/// Record the caller's final score.
#[utoipa::path(
    post,
    path = "/sessions/{id}/score",
    tag = "sessions",
    params(
        ("id" = String, Path, description = "Session code"),
        ("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")
    ),
    request_body = SubmitScoreRequest,
    responses(
        (status = 204, description = "Score stored"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn submit_score(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitScoreRequest>>,
) -> Result<StatusCode, AppError> {
    let outcomes = payload.outcomes.into_iter().map(Into::into).collect();
    session_service::submit_score(&state, &caller, &id, payload.score, &payload.nickname, outcomes)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stop a session from accepting players.
#[utoipa::path(
    post,
    path = "/sessions/{id}/close",
    tag = "sessions",
    params(
        ("id" = String, Path, description = "Session code"),
        ("x-player-id" = String, Header, description = "Identity of the session creator")
    ),
    responses(
        (status = 200, description = "Session closed", body = SessionResponse),
        (status = 403, description = "Caller did not create the session"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn close_session(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = session_service::close_session(&state, &caller, &id).await?;
    Ok(Json(session.into()))
}

/// Participants ranked by score.
#[utoipa::path(
    get,
    path = "/sessions/{id}/leaderboard",
    tag = "sessions",
    params(("id" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Ranked participants", body = LeaderboardResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let entries = leaderboard_service::get_leaderboard(&state, &id).await?;
    Ok(Json(LeaderboardResponse::new(id.trim().to_owned(), entries)))
}

/// Sessions the caller took part in, newest first.
#[utoipa::path(
    get,
    path = "/sessions/recent",
    tag = "sessions",
    params(
        RecentSessionsQuery,
        ("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")
    ),
    responses((status = 200, description = "Recent sessions", body = [RecentSessionItem]))
)]
pub async fn recent_sessions(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Query(query)): Valid<Query<RecentSessionsQuery>>,
) -> Result<Json<Vec<RecentSessionItem>>, AppError> {
    let sessions = leaderboard_service::get_recent_sessions(&state, &caller, query.limit).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// Answer counters of one question.
#[utoipa::path(
    get,
    path = "/questions/{id}/stats",
    tag = "sessions",
    params(("id" = String, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question statistics", body = QuestionStatsResponse),
        (status = 404, description = "No statistics recorded yet")
    )
)]
pub async fn question_stats(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionStatsResponse>, AppError> {
    let stats = session_service::question_stats(&state, &id).await?;
    Ok(Json(stats.into()))
}
