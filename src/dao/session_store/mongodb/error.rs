use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB session store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert session `{id}`")]
    InsertSession {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load session `{id}`")]
    LoadSession {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update session `{id}`")]
    UpdateSession {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list sessions of participant `{player_id}`")]
    ListSessions {
        player_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to record statistics of question `{question_id}`")]
    RecordStats {
        question_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load statistics of question `{question_id}`")]
    LoadStats {
        question_id: String,
        #[source]
        source: MongoError,
    },
}
