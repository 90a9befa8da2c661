use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the degraded flag and run count while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_session_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let hosted_runs = state.hosted_runs();
    if state.is_degraded().await {
        HealthResponse::degraded(hosted_runs)
    } else {
        HealthResponse::ok(hosted_runs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::session_store::memory::MemorySessionStore, state::AppState,
        state::player::PlayerId,
    };

    #[tokio::test]
    async fn degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        state.set_session_store(Arc::new(MemorySessionStore::new())).await;
        state.run_for(&PlayerId::generate());
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.hosted_runs, 1);
    }
}
