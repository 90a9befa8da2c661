use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Sprint Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::auth::sign_in_anonymously,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::submit_score,
        crate::routes::sessions::close_session,
        crate::routes::sessions::get_leaderboard,
        crate::routes::sessions::recent_sessions,
        crate::routes::sessions::question_stats,
        crate::routes::play::current,
        crate::routes::play::open,
        crate::routes::play::new_quiz,
        crate::routes::play::open_join,
        crate::routes::play::join_code,
        crate::routes::play::nickname,
        crate::routes::play::answer,
        crate::routes::play::home,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::auth::AnonymousSignInResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::JoinSessionResponse,
            crate::dto::session::SubmitScoreRequest,
            crate::dto::session::QuestionOutcomeInput,
            crate::dto::session::SessionResponse,
            crate::dto::session::QuestionView,
            crate::dto::session::AlternativeView,
            crate::dto::session::ParticipantView,
            crate::dto::session::RecentSessionItem,
            crate::dto::session::QuestionStatsResponse,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::leaderboard::LeaderboardRow,
            crate::dto::play::PlaySnapshot,
            crate::dto::play::PlayPhase,
            crate::dto::play::QuestionScoreView,
            crate::dto::play::ResultsView,
            crate::dto::play::PerformanceTier,
            crate::dto::play::SubmissionView,
            crate::dto::play::OpenRequest,
            crate::dto::play::NewQuizRequest,
            crate::dto::play::JoinCodeRequest,
            crate::dto::play::NicknameRequest,
            crate::dto::play::AnswerRequest,
            crate::dto::play::AnswerResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Anonymous identities"),
        (name = "sessions", description = "Session lifecycle, leaderboards and statistics"),
        (name = "play", description = "Server-hosted quiz runs"),
    )
)]
pub struct ApiDoc;
