use serde::Serialize;
use utoipa::ToSchema;

use crate::state::player::PlayerId;

/// Identity issued by `POST /auth/anonymous`.
///
/// Send it back in the `x-player-id` header on every other call.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnonymousSignInResponse {
    pub player_id: String,
}

impl From<PlayerId> for AnonymousSignInResponse {
    fn from(value: PlayerId) -> Self {
        Self {
            player_id: value.into(),
        }
    }
}
