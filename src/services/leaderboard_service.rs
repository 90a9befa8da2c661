use tracing::warn;

use crate::{
    error::ServiceError,
    services::session_service,
    state::{
        SharedState,
        leaderboard::{self, LeaderboardEntry, RecentSession},
        player::PlayerId,
        quiz::Session,
    },
};

/// Ranked participants of a session.
pub async fn get_leaderboard(
    state: &SharedState,
    session_id: &str,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let session = session_service::load_session(state, session_id).await?;
    Ok(leaderboard::rank(&session.participants))
}

/// Sessions `caller` took part in, newest first, with the caller's standing in each.
///
/// `limit` is capped by the configured maximum.
pub async fn get_recent_sessions(
    state: &SharedState,
    caller: &PlayerId,
    limit: Option<usize>,
) -> Result<Vec<RecentSession>, ServiceError> {
    let max = state.config().recent_sessions_limit;
    let limit = limit.unwrap_or(max).min(max);
    if limit == 0 {
        return Ok(Vec::new());
    }

    let store = state.require_session_store().await?;
    let sessions = store.list_sessions_for(caller.to_string(), limit).await?;

    Ok(sessions
        .into_iter()
        .filter_map(|entity| match Session::try_from(entity) {
            Ok(session) => Some(RecentSession::for_player(session, caller)),
            Err(err) => {
                warn!(player_id = %caller, error = %err, "skipping unreadable session");
                None
            }
        })
        .collect())
}
