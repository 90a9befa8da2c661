use axum::{Json, Router, extract::State, routing::post};
use tracing::info;

use crate::{dto::auth::AnonymousSignInResponse, error::AppError, state::SharedState};

#[utoipa::path(
    post,
    path = "/auth/anonymous",
    tag = "auth",
    responses((status = 200, description = "Freshly issued anonymous identity", body = AnonymousSignInResponse))
)]
/// Issue an anonymous identity to send back in the `x-player-id` header.
pub async fn sign_in_anonymously(
    State(state): State<SharedState>,
) -> Result<Json<AnonymousSignInResponse>, AppError> {
    let player = state.identity().sign_in().await?;
    info!(player_id = %player, "anonymous identity issued");
    Ok(Json(player.into()))
}

/// Identity routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/auth/anonymous", post(sign_in_anonymously))
}
