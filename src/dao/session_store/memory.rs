//! Process-local session store backed by [`DashMap`].

use std::{
    cmp::Reverse,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use thiserror::Error;

use crate::dao::{
    models::{
        JoinOutcome, ParticipantEntity, QuestionOutcomeEntity, QuestionStatsEntity, SessionEntity,
    },
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

/// Failure reported while the store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory session store is offline")]
pub struct MemoryStoreOffline;

impl From<MemoryStoreOffline> for StorageError {
    fn from(err: MemoryStoreOffline) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

#[derive(Default)]
struct MemoryInner {
    sessions: DashMap<String, SessionEntity>,
    stats: DashMap<String, QuestionStatsEntity>,
    offline: AtomicBool,
}

/// Session store keeping every document in memory.
///
/// Each session lives in one map entry, so the entry lock gives the same
/// per-document write serialization a document database provides.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<MemoryInner>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again) as if the backend dropped.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), MemoryStoreOffline> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(MemoryStoreOffline)
        } else {
            Ok(())
        }
    }

    fn insert_session(&self, session: SessionEntity) -> Result<bool, MemoryStoreOffline> {
        self.ensure_online()?;
        match self.inner.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(true)
            }
        }
    }

    fn find_session(&self, id: &str) -> Result<Option<SessionEntity>, MemoryStoreOffline> {
        self.ensure_online()?;
        Ok(self.inner.sessions.get(id).map(|entry| entry.value().clone()))
    }

    fn insert_participant(
        &self,
        session_id: &str,
        player_id: String,
        participant: ParticipantEntity,
    ) -> Result<JoinOutcome, MemoryStoreOffline> {
        self.ensure_online()?;
        let Some(mut session) = self.inner.sessions.get_mut(session_id) else {
            return Ok(JoinOutcome::SessionMissing);
        };

        if session.participants.contains_key(&player_id) {
            return Ok(JoinOutcome::AlreadyJoined);
        }

        session.participants.insert(player_id, participant);
        Ok(JoinOutcome::Joined)
    }

    fn record_score(
        &self,
        session_id: &str,
        player_id: &str,
        score: u32,
        completed_at: SystemTime,
    ) -> Result<bool, MemoryStoreOffline> {
        self.ensure_online()?;
        let Some(mut session) = self.inner.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        let Some(participant) = session.participants.get_mut(player_id) else {
            return Ok(false);
        };

        participant.score = score;
        participant.completed_at = Some(completed_at);
        Ok(true)
    }

    fn set_active(&self, session_id: &str, active: bool) -> Result<bool, MemoryStoreOffline> {
        self.ensure_online()?;
        let Some(mut session) = self.inner.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        session.is_active = active;
        Ok(true)
    }

    fn list_sessions_for(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionEntity>, MemoryStoreOffline> {
        self.ensure_online()?;
        let mut sessions: Vec<SessionEntity> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| entry.participants.contains_key(player_id))
            .map(|entry| entry.value().clone())
            .collect();

        sessions.sort_by_key(|session| Reverse(session.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    fn record_question_outcomes(
        &self,
        outcomes: Vec<QuestionOutcomeEntity>,
        now: SystemTime,
    ) -> Result<(), MemoryStoreOffline> {
        self.ensure_online()?;
        for outcome in outcomes {
            self.inner
                .stats
                .entry(outcome.question_id.clone())
                .or_insert_with(|| QuestionStatsEntity::empty(outcome.question_id, now))
                .record(outcome.is_correct, now);
        }
        Ok(())
    }

    fn find_question_stats(
        &self,
        question_id: &str,
    ) -> Result<Option<QuestionStatsEntity>, MemoryStoreOffline> {
        self.ensure_online()?;
        Ok(self
            .inner
            .stats
            .get(question_id)
            .map(|entry| entry.value().clone()))
    }
}

impl SessionStore for MemorySessionStore {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).map_err(Into::into) })
    }

    fn find_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(&id).map_err(Into::into) })
    }

    fn insert_participant(
        &self,
        session_id: String,
        player_id: String,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<JoinOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_participant(&session_id, player_id, participant)
                .map_err(Into::into)
        })
    }

    fn record_score(
        &self,
        session_id: String,
        player_id: String,
        score: u32,
        completed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_score(&session_id, &player_id, score, completed_at)
                .map_err(Into::into)
        })
    }

    fn set_active(
        &self,
        session_id: String,
        active: bool,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.set_active(&session_id, active).map_err(Into::into) })
    }

    fn list_sessions_for(
        &self,
        player_id: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_sessions_for(&player_id, limit).map_err(Into::into) })
    }

    fn record_question_outcomes(
        &self,
        outcomes: Vec<QuestionOutcomeEntity>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.record_question_outcomes(outcomes, now).map_err(Into::into) })
    }

    fn find_question_stats(
        &self,
        question_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question_stats(&question_id).map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online().map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online().map_err(Into::into) })
    }
}
