use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoParticipantDocument, MongoQuestionStatsDocument, MongoSessionDocument, doc_id,
        participant_path,
    },
};
use crate::dao::{
    models::{
        JoinOutcome, ParticipantEntity, QuestionOutcomeEntity, QuestionStatsEntity, SessionEntity,
    },
    session_store::SessionStore,
    storage::StorageResult,
};

const SESSION_COLLECTION_NAME: &str = "sessions";
const STATS_COLLECTION_NAME: &str = "question_stats";
const DUPLICATE_KEY: i32 = 11000;

/// Session store persisting documents in MongoDB.
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.sessions().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_created_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "created_at",
                source,
            })?;

        Ok(())
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn stats(&self) -> Collection<MongoQuestionStatsDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoQuestionStatsDocument>(STATS_COLLECTION_NAME)
    }

    async fn insert_session(&self, session: SessionEntity) -> MongoResult<bool> {
        let id = session.id.clone();
        let document: MongoSessionDocument = session.into();
        let collection = self.sessions().await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::InsertSession { id, source }),
        }
    }

    async fn find_session(&self, id: String) -> MongoResult<Option<SessionEntity>> {
        let collection = self.sessions().await;
        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn insert_participant(
        &self,
        session_id: String,
        player_id: String,
        participant: ParticipantEntity,
    ) -> MongoResult<JoinOutcome> {
        let path = participant_path(&player_id);
        let participant: MongoParticipantDocument = participant.into();
        let collection = self.sessions().await;

        // The `$exists: false` filter makes the insert conditional in a single write.
        let result = collection
            .update_one(
                doc! { "_id": session_id.as_str(), path.as_str(): { "$exists": false } },
                doc! { "$set": { path.as_str(): participant.to_document() } },
            )
            .await
            .map_err(|source| MongoDaoError::UpdateSession {
                id: session_id.clone(),
                source,
            })?;

        if result.matched_count > 0 {
            return Ok(JoinOutcome::Joined);
        }

        let exists = collection
            .count_documents(doc_id(&session_id))
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                id: session_id,
                source,
            })?;

        Ok(if exists > 0 {
            JoinOutcome::AlreadyJoined
        } else {
            JoinOutcome::SessionMissing
        })
    }

    async fn record_score(
        &self,
        session_id: String,
        player_id: String,
        score: u32,
        completed_at: SystemTime,
    ) -> MongoResult<bool> {
        let path = participant_path(&player_id);
        let collection = self.sessions().await;

        let result = collection
            .update_one(
                doc! { "_id": session_id.as_str(), path.as_str(): { "$exists": true } },
                doc! { "$set": {
                    format!("{path}.score"): i64::from(score),
                    format!("{path}.completed_at"): DateTime::from_system_time(completed_at),
                } },
            )
            .await
            .map_err(|source| MongoDaoError::UpdateSession {
                id: session_id,
                source,
            })?;

        Ok(result.matched_count > 0)
    }

    async fn set_active(&self, session_id: String, active: bool) -> MongoResult<bool> {
        let collection = self.sessions().await;
        let result = collection
            .update_one(
                doc_id(&session_id),
                doc! { "$set": { "is_active": active } },
            )
            .await
            .map_err(|source| MongoDaoError::UpdateSession {
                id: session_id,
                source,
            })?;

        Ok(result.matched_count > 0)
    }

    async fn list_sessions_for(
        &self,
        player_id: String,
        limit: usize,
    ) -> MongoResult<Vec<SessionEntity>> {
        let collection = self.sessions().await;
        let path = participant_path(&player_id);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let documents: Vec<MongoSessionDocument> = collection
            .find(doc! { path.as_str(): { "$exists": true } })
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::ListSessions {
                player_id: player_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListSessions { player_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn record_question_outcomes(
        &self,
        outcomes: Vec<QuestionOutcomeEntity>,
        now: SystemTime,
    ) -> MongoResult<()> {
        let mut counters: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for outcome in outcomes {
            let entry = counters.entry(outcome.question_id).or_default();
            entry.0 += 1;
            if outcome.is_correct {
                entry.1 += 1;
            }
        }

        let collection = self.stats().await;
        let now = DateTime::from_system_time(now);
        for (question_id, (total, correct)) in counters {
            collection
                .update_one(
                    doc_id(&question_id),
                    doc! {
                        "$inc": { "total_attempts": total, "correct_attempts": correct },
                        "$set": { "last_updated": now },
                    },
                )
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::RecordStats {
                    question_id,
                    source,
                })?;
        }

        Ok(())
    }

    async fn find_question_stats(
        &self,
        question_id: String,
    ) -> MongoResult<Option<QuestionStatsEntity>> {
        let collection = self.stats().await;
        let document = collection
            .find_one(doc_id(&question_id))
            .await
            .map_err(|source| MongoDaoError::LoadStats {
                question_id,
                source,
            })?;
        Ok(document.map(Into::into))
    }
}

impl SessionStore for MongoSessionStore {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).await.map_err(Into::into) })
    }

    fn find_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
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
                .insert_participant(session_id, player_id, participant)
                .await
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
                .record_score(session_id, player_id, score, completed_at)
                .await
                .map_err(Into::into)
        })
    }

    fn set_active(
        &self,
        session_id: String,
        active: bool,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.set_active(session_id, active).await.map_err(Into::into) })
    }

    fn list_sessions_for(
        &self,
        player_id: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_sessions_for(player_id, limit)
                .await
                .map_err(Into::into)
        })
    }

    fn record_question_outcomes(
        &self,
        outcomes: Vec<QuestionOutcomeEntity>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_question_outcomes(outcomes, now)
                .await
                .map_err(Into::into)
        })
    }

    fn find_question_stats(
        &self,
        question_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question_stats(question_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
