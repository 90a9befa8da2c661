#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{
    JoinOutcome, ParticipantEntity, QuestionOutcomeEntity, QuestionStatsEntity, SessionEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the document store holding quiz sessions and question statistics.
///
/// Participant writes are field level: joining or scoring one identity never rewrites
/// another participant's entry.
pub trait SessionStore: Send + Sync {
    /// Write a new session unless one already exists under the same id.
    ///
    /// Returns `false` when the id is taken; nothing is written in that case.
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>>;

    /// Load a session by id.
    fn find_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;

    /// Add `participant` under `player_id` only if that identity has no entry yet.
    fn insert_participant(
        &self,
        session_id: String,
        player_id: String,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>>;

    /// Overwrite the score of an existing participant and stamp its completion time.
    ///
    /// Returns `false` when the session or the participant does not exist.
    fn record_score(
        &self,
        session_id: String,
        player_id: String,
        score: u32,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Set the activity flag of a session. Returns `false` when the session does not exist.
    fn set_active(&self, session_id: String, active: bool)
    -> BoxFuture<'static, StorageResult<bool>>;

    /// Sessions `player_id` participates in, newest first, at most `limit` of them.
    fn list_sessions_for(
        &self,
        player_id: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>>;

    /// Fold answer outcomes into the per-question counters.
    fn record_question_outcomes(
        &self,
        outcomes: Vec<QuestionOutcomeEntity>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Counters of one question, if it was ever answered.
    fn find_question_stats(
        &self,
        question_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionStatsEntity>>>;

    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
