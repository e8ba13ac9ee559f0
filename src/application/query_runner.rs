// Query runner trait - widget data fetching
use crate::domain::query_result::QueryResult;
use crate::domain::widget::Query;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// The query ran but produced an error result. Expected; shown on the
    /// widget itself.
    #[error("query result error: {0}")]
    QueryResult(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoadError {
    pub fn is_expected(&self) -> bool {
        matches!(self, LoadError::QueryResult(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub query: Query,
    pub parameters: BTreeMap<String, Value>,
    /// `Some(0)` forces a fresh execution; `None` accepts any cached result.
    pub max_age: Option<u64>,
}

#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(&self, request: LoadRequest) -> Result<QueryResult, LoadError>;
}
