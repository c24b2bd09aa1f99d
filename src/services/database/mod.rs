// Datastore executors for generated queries
pub mod neo4j;
pub mod postgresql;

pub use neo4j::Neo4jExecutor;
pub use postgresql::PostgresExecutor;

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::models::{ExecutionOutcome, FailureStage};

/// Failure of one datastore call
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Query timeout after {0} seconds")]
    Timeout(u64),
}

/// Rows materialized from a datastore, in driver order
#[derive(Debug, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
}

/// Runs one ad-hoc query against a datastore.
///
/// Implementations open their own connection for every call, release it on
/// every exit path and never let an error escape: driver failures come back
/// as `ExecutionOutcome::Failure`.
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    type Params: Send + Sync;

    async fn execute(&self, params: &Self::Params, text: &str) -> ExecutionOutcome;
}

/// Apply the timeout to a datastore call and fold its result into an outcome
pub(crate) async fn run_with_timeout<F>(timeout_secs: u64, call: F) -> ExecutionOutcome
where
    F: std::future::Future<Output = Result<QueryResult, ExecutionError>>,
{
    let start_time = Instant::now();
    let result = match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::Timeout(timeout_secs)),
    };
    let execution_time_ms = start_time.elapsed().as_millis() as u64;

    match result {
        Ok(result) => ExecutionOutcome::success(result.columns, result.rows, execution_time_ms),
        Err(e) => ExecutionOutcome::failure(FailureStage::Execution, e.to_string()),
    }
}

/// Column names in first-seen order across a set of JSON objects
pub(crate) fn collect_columns(rows: &[serde_json::Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}
