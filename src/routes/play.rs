use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::play::{
        AnswerRequest, AnswerResponse, JoinCodeRequest, NewQuizRequest, NicknameRequest,
        OpenRequest, PlaySnapshot,
    },
    error::AppError,
    routes::Caller,
    services::run_service,
    state::SharedState,
};

/// Endpoints driving the caller's hosted quiz run.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/play", get(current))
        .route("/play/open", post(open))
        .route("/play/new", post(new_quiz))
        .route("/play/join", post(open_join))
        .route("/play/join-code", post(join_code))
        .route("/play/nickname", post(nickname))
        .route("/play/answer", post(answer))
        .route("/play/home", post(home))
}

/// Current screen of the caller's run.
#[utoipa::path(
    get,
    path = "/play",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    responses((status = 200, description = "Run snapshot", body = PlaySnapshot))
)]
pub async fn current(
    State(state): State<SharedState>,
    Caller(caller): Caller,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(run_service::snapshot(&state, &caller).await?))
}

/// App start: resume the hosted run or load a shared session code.
#[utoipa::path(
    post,
    path = "/play/open",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    request_body = OpenRequest,
    responses(
        (status = 200, description = "Run snapshot", body = PlaySnapshot),
        (status = 404, description = "Unknown shared session"),
        (status = 410, description = "Shared session closed")
    )
)]
pub async fn open(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Json(payload): Json<OpenRequest>,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(run_service::open(&state, &caller, payload.session_id).await?))
}

/// Host a new quiz and move to the nickname screen.
#[utoipa::path(
    post,
    path = "/play/new",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    request_body = NewQuizRequest,
    responses(
        (status = 200, description = "Run snapshot", body = PlaySnapshot),
        (status = 409, description = "Not on the home screen")
    )
)]
pub async fn new_quiz(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<NewQuizRequest>>,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(
        run_service::start_new_quiz(&state, &caller, payload.question_count).await?,
    ))
}

/// Go to the join-code screen.
#[utoipa::path(
    post,
    path = "/play/join",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    responses((status = 200, description = "Run snapshot", body = PlaySnapshot))
)]
pub async fn open_join(
    State(state): State<SharedState>,
    Caller(caller): Caller,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(run_service::open_join(&state, &caller).await?))
}

/// Enter a session code.
#[utoipa::path(
    post,
    path = "/play/join-code",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    request_body = JoinCodeRequest,
    responses(
        (status = 200, description = "Run snapshot", body = PlaySnapshot),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session closed")
    )
)]
pub async fn join_code(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<JoinCodeRequest>>,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(
        run_service::enter_join_code(&state, &caller, &payload.session_id).await?,
    ))
}

/// Accept the nickname, join the session and show the first question.
#[utoipa::path(
    post,
    path = "/play/nickname",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    request_body = NicknameRequest,
    responses(
        (status = 200, description = "Run snapshot", body = PlaySnapshot),
        (status = 409, description = "No session loaded")
    )
)]
pub async fn nickname(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<NicknameRequest>>,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(
        run_service::submit_nickname(&state, &caller, &payload.nickname).await?,
    ))
}

/// Lock in an answer for the open question.
#[utoipa::path(
    post,
    path = "/play/answer",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer outcome", body = AnswerResponse),
        (status = 400, description = "Unknown alternative"),
        (status = 409, description = "Answer already locked")
    )
)]
pub async fn answer(
    State(state): State<SharedState>,
    Caller(caller): Caller,
    Valid(Json(payload)): Valid<Json<AnswerRequest>>,
) -> Result<Json<AnswerResponse>, AppError> {
    Ok(Json(
        run_service::answer(
            &state,
            &caller,
            payload.question_index,
            &payload.alternative_id,
        )
        .await?,
    ))
}

/// Leave the run and return to the landing screen.
#[utoipa::path(
    post,
    path = "/play/home",
    tag = "play",
    params(("x-player-id" = String, Header, description = "Identity issued by /auth/anonymous")),
    responses(
        (status = 200, description = "Run snapshot", body = PlaySnapshot),
        (status = 409, description = "A question is still open")
    )
)]
pub async fn home(
    State(state): State<SharedState>,
    Caller(caller): Caller,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(run_service::return_home(&state, &caller).await?))
}
