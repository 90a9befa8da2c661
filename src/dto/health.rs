use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of player runs currently hosted.
    pub hosted_runs: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(hosted_runs: usize) -> Self {
        Self {
            status: "ok".to_string(),
            hosted_runs,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(hosted_runs: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            hosted_runs,
        }
    }
}
