use axum::{Router, extract::FromRequestParts, http::request::Parts};

use crate::{
    error::{AppError, ServiceError},
    state::{SharedState, player::PlayerId},
};

pub mod auth;
pub mod docs;
pub mod health;
pub mod play;
pub mod sessions;

/// Header carrying the identity issued by `POST /auth/anonymous`.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Identity of the player making the request, read from [`PLAYER_ID_HEADER`].
#[derive(Debug, Clone)]
pub struct Caller(pub PlayerId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PLAYER_ID_HEADER)
            .ok_or_else(|| {
                ServiceError::Unauthenticated(format!("missing `{PLAYER_ID_HEADER}` header"))
            })?
            .to_str()
            .map_err(|_| {
                ServiceError::Unauthenticated(format!("`{PLAYER_ID_HEADER}` is not valid ASCII"))
            })?;
        let player = PlayerId::parse(raw).map_err(|err| ServiceError::Unauthenticated(err.to_string()))?;
        Ok(Caller(player))
    }
}

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(auth::router())
        .merge(sessions::router())
        .merge(play::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
