/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Anonymous identity issuing.
pub mod identity;
/// Leaderboards and the caller's recent sessions.
pub mod leaderboard_service;
/// Last nickname per identity.
pub mod nickname_memory;
/// Question pool supplier.
pub mod question_source;
/// Per-identity quiz runs and their countdowns.
pub mod run_service;
/// Session creation, joins, scores and closing.
pub mod session_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
