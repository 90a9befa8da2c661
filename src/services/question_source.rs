//! Supplier of the question pool sessions are drawn from.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{error::ServiceError, state::quiz::Question};

/// Boundary to wherever questions come from.
pub trait QuestionSource: Send + Sync {
    /// Every question available for drawing.
    fn fetch_question_pool(&self) -> BoxFuture<'static, Result<Vec<Question>, ServiceError>>;
}

/// Fixed pool loaded once from configuration.
pub struct StaticQuestionSource {
    pool: Arc<[Question]>,
}

impl StaticQuestionSource {
    /// Serve `pool` for the lifetime of the process.
    pub fn new(pool: Vec<Question>) -> Self {
        Self { pool: pool.into() }
    }
}

impl QuestionSource for StaticQuestionSource {
    fn fetch_question_pool(&self) -> BoxFuture<'static, Result<Vec<Question>, ServiceError>> {
        let pool = self.pool.clone();
        Box::pin(async move { Ok(pool.to_vec()) })
    }
}
