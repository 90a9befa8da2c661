use std::{cmp::Reverse, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;

use crate::dao::{
    models::{
        JoinOutcome, ParticipantEntity, QuestionOutcomeEntity, QuestionStatsEntity, SessionEntity,
    },
    session_store::SessionStore,
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        CouchQuestionStatsDocument, CouchSessionDocument, FindResponse, session_doc_id,
        stats_doc_id,
    },
};

const MAX_CONFLICT_RETRIES: u32 = 5;
const CREATED_AT_FIELD: &str = "created_at.secs_since_epoch";
const CREATED_AT_INDEX: &str = "session-created-idx";

enum PutOutcome {
    Written,
    Conflict,
}

/// Result of inspecting the current revision of a document.
enum Edit<T, R> {
    /// Write the new revision, then report `R`.
    Put(T, R),
    /// Leave the document alone and report `R`.
    Done(R),
}

/// Session store persisting documents in CouchDB.
#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    base_url: Arc<Url>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchSessionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .map(Arc::new)
            .ok_or_else(|| CouchDaoError::InvalidBaseUrl {
                url: config.base_url.clone(),
            })?;
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// URL of `segments` under the database, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = Url::clone(&self.base_url);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.database).extend(segments);
        }
        url
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.request(method, self.url(&[path])))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.url(&[]);

        let response = self
            .with_auth(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .with_auth(self.client.put(url.clone()))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means a concurrent creator won the race.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<PutOutcome>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => Ok(PutOutcome::Written),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Read-modify-write guarded by the document revision, retried on conflict.
    async fn edit_document<T, R, F>(&self, doc_id: &str, mut edit: F) -> CouchResult<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(Option<T>) -> Edit<T, R>,
    {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let current = self.get_document::<T>(doc_id).await?;
            match edit(current) {
                Edit::Done(result) => return Ok(result),
                Edit::Put(document, result) => match self.put_document(doc_id, &document).await? {
                    PutOutcome::Written => return Ok(result),
                    PutOutcome::Conflict => {
                        debug!(doc_id, attempt, "CouchDB revision conflict; retrying");
                    }
                },
            }
        }

        Err(CouchDaoError::Conflict {
            doc_id: doc_id.to_string(),
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    async fn ensure_indexes(&self) -> CouchResult<()> {
        const INDEX: &str = "_index";
        let body = json!({
            "index": { "fields": [CREATED_AT_FIELD] },
            "name": CREATED_AT_INDEX,
            "type": "json",
        });

        let response = self
            .request(Method::POST, INDEX)
            .json(&body)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: INDEX.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: INDEX.to_string(),
                status: response.status(),
            })
        }
    }

    async fn find_sessions(&self, body: Value) -> CouchResult<Vec<CouchSessionDocument>> {
        const FIND: &str = "_find";
        let response = self
            .request(Method::POST, FIND)
            .json(&body)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: FIND.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: FIND.to_string(),
                status: response.status(),
            });
        }

        let payload = response
            .json::<FindResponse<CouchSessionDocument>>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: FIND.to_string(),
                source,
            })?;
        if let Some(warning) = payload.warning {
            debug!(warning, "CouchDB _find warning");
        }
        Ok(payload.docs)
    }

    async fn insert_participant(
        &self,
        session_id: String,
        player_id: String,
        participant: ParticipantEntity,
    ) -> CouchResult<JoinOutcome> {
        let doc_id = session_doc_id(&session_id);
        self.edit_document(&doc_id, |current: Option<CouchSessionDocument>| {
            let Some(mut document) = current else {
                return Edit::Done(JoinOutcome::SessionMissing);
            };
            if document.session.participants.contains_key(&player_id) {
                return Edit::Done(JoinOutcome::AlreadyJoined);
            }
            document
                .session
                .participants
                .insert(player_id.clone(), participant.clone());
            Edit::Put(document, JoinOutcome::Joined)
        })
        .await
    }

    async fn record_score(
        &self,
        session_id: String,
        player_id: String,
        score: u32,
        completed_at: SystemTime,
    ) -> CouchResult<bool> {
        let doc_id = session_doc_id(&session_id);
        self.edit_document(&doc_id, |current: Option<CouchSessionDocument>| {
            let Some(mut document) = current else {
                return Edit::Done(false);
            };
            let Some(participant) = document.session.participants.get_mut(&player_id) else {
                return Edit::Done(false);
            };
            participant.score = score;
            participant.completed_at = Some(completed_at);
            Edit::Put(document, true)
        })
        .await
    }

    async fn set_active(&self, session_id: String, active: bool) -> CouchResult<bool> {
        let doc_id = session_doc_id(&session_id);
        self.edit_document(&doc_id, |current: Option<CouchSessionDocument>| {
            let Some(mut document) = current else {
                return Edit::Done(false);
            };
            if document.session.is_active == active {
                return Edit::Done(true);
            }
            document.session.is_active = active;
            Edit::Put(document, true)
        })
        .await
    }

    async fn list_sessions_for(
        &self,
        player_id: String,
        limit: usize,
    ) -> CouchResult<Vec<SessionEntity>> {
        let mut sessions: Vec<SessionEntity> = self
            .find_sessions(recent_sessions_query(&player_id, limit))
            .await?
            .into_iter()
            .map(CouchSessionDocument::into_entity)
            .collect();

        // The index orders by whole seconds only.
        sessions.sort_by_key(|session| Reverse(session.created_at));
        Ok(sessions)
    }

    async fn record_question_outcomes(
        &self,
        outcomes: Vec<QuestionOutcomeEntity>,
        now: SystemTime,
    ) -> CouchResult<()> {
        for outcome in outcomes {
            let doc_id = stats_doc_id(&outcome.question_id);
            self.edit_document(&doc_id, |current: Option<CouchQuestionStatsDocument>| {
                let mut document = current.unwrap_or_else(|| {
                    CouchQuestionStatsDocument::empty(outcome.question_id.clone(), now)
                });
                document.stats.record(outcome.is_correct, now);
                Edit::Put(document, ())
            })
            .await?;
        }
        Ok(())
    }
}

/// `_find` body selecting the sessions `player_id` joined, newest first.
///
/// Player ids are restricted to `[A-Za-z0-9_-]`, so they are safe inside a field path.
fn recent_sessions_query(player_id: &str, limit: usize) -> Value {
    json!({
        "selector": {
            CREATED_AT_FIELD: { "$gte": 0 },
            format!("participants.{player_id}"): { "$exists": true },
        },
        "sort": [{ CREATED_AT_FIELD: "desc" }],
        "limit": limit,
        "use_index": CREATED_AT_INDEX,
    })
}

impl SessionStore for CouchSessionStore {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let document = CouchSessionDocument::from_entity(session);
            // Without a `_rev` CouchDB only accepts the PUT if the id is free.
            match store.put_document(&document.id, &document).await? {
                PutOutcome::Written => Ok(true),
                PutOutcome::Conflict => Ok(false),
            }
        })
    }

    fn find_session(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = session_doc_id(&id);
            let maybe_doc = store.get_document::<CouchSessionDocument>(&doc_id).await?;
            Ok(maybe_doc.map(CouchSessionDocument::into_entity))
        })
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
        Box::pin(async move {
            let doc_id = stats_doc_id(&question_id);
            let maybe_doc = store
                .get_document::<CouchQuestionStatsDocument>(&doc_id)
                .await?;
            Ok(maybe_doc.map(|doc| doc.stats))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.url(&[]);
            let response = store
                .with_auth(store.client.get(url.clone()))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.to_string(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url.to_string(),
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> CouchSessionStore {
        CouchSessionStore {
            client: Client::new(),
            base_url: Arc::new(Url::parse(base_url).unwrap()),
            database: "quiz".into(),
            auth: None,
        }
    }

    #[test]
    fn document_ids_are_percent_encoded() {
        let store = store("http://localhost:5984");
        assert_eq!(
            store.url(&[session_doc_id("x?conflicts=true").as_str()]).as_str(),
            "http://localhost:5984/quiz/session::x%3Fconflicts=true"
        );
        assert_eq!(
            store.url(&[stats_doc_id("a#b/c").as_str()]).as_str(),
            "http://localhost:5984/quiz/question_stats::a%23b%2Fc"
        );
    }

    #[test]
    fn base_path_is_kept() {
        let store = store("http://couch:5984/proxy/");
        assert_eq!(store.url(&[]).as_str(), "http://couch:5984/proxy/quiz");
        assert_eq!(store.url(&["_find"]).as_str(), "http://couch:5984/proxy/quiz/_find");
    }

    #[test]
    fn recent_sessions_use_indexed_find() {
        let query = recent_sessions_query("p1", 10);
        assert_eq!(query["selector"]["participants.p1"], json!({ "$exists": true }));
        assert_eq!(query["sort"], json!([{ CREATED_AT_FIELD: "desc" }]));
        assert_eq!(query["limit"], 10);
        assert_eq!(query["use_index"], CREATED_AT_INDEX);
    }
}
