use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dialect::{Dialect, ResultKind};

/// Pipeline step at which a dialect failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Generation,
    Validation,
    Execution,
    Internal,
}

/// Terminal result of one dialect pipeline.
///
/// `Failure` means the result set is absent, which is not the same as a
/// `Success` with zero rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionOutcome {
    Success {
        columns: Vec<String>,
        rows: Vec<serde_json::Value>,
        row_count: usize,
        execution_time_ms: u64,
    },
    Failure {
        stage: FailureStage,
        message: String,
    },
}

impl ExecutionOutcome {
    pub fn success(columns: Vec<String>, rows: Vec<serde_json::Value>, execution_time_ms: u64) -> Self {
        let row_count = rows.len();
        ExecutionOutcome::Success {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }

    pub fn failure(stage: FailureStage, message: impl Into<String>) -> Self {
        ExecutionOutcome::Failure {
            stage,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn rows(&self) -> Option<&[serde_json::Value]> {
        match self {
            ExecutionOutcome::Success { rows, .. } => Some(rows),
            ExecutionOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_stage(&self) -> Option<FailureStage> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure { stage, .. } => Some(*stage),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure { message, .. } => Some(message),
        }
    }
}

/// Generated query text after sanitization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedQuery {
    pub dialect: Dialect,
    pub text: String,
}

/// What one dialect produced for a submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialectReport {
    pub dialect: Dialect,
    pub result_kind: ResultKind,
    /// Absent only when generation failed
    pub query: Option<String>,
    pub outcome: ExecutionOutcome,
}

impl DialectReport {
    pub fn new(dialect: Dialect, query: Option<String>, outcome: ExecutionOutcome) -> Self {
        Self {
            dialect,
            result_kind: dialect.config().result_kind,
            query,
            outcome,
        }
    }
}

/// Everything the presenter needs for one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualQueryResponse {
    pub request_id: String,
    pub question: String,
    pub generated_at: DateTime<Utc>,
    pub sql: DialectReport,
    pub cypher: DialectReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let ok = ExecutionOutcome::success(vec!["n".to_string()], vec![json!({"n": 1})], 4);
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["row_count"], 1);

        let failed = ExecutionOutcome::failure(FailureStage::Execution, "connection refused");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["stage"], "execution");
        assert_eq!(value["message"], "connection refused");
    }

    #[test]
    fn test_failure_is_distinct_from_empty_success() {
        let empty = ExecutionOutcome::success(vec![], vec![], 0);
        let failed = ExecutionOutcome::failure(FailureStage::Execution, "boom");
        assert_eq!(empty.rows().map(|r| r.len()), Some(0));
        assert!(failed.rows().is_none());
        assert_eq!(failed.error_message(), Some("boom"));
    }

    #[test]
    fn test_report_takes_result_kind_from_dialect() {
        let report = DialectReport::new(
            Dialect::Cypher,
            Some("MATCH (n) RETURN n".to_string()),
            ExecutionOutcome::success(vec![], vec![], 0),
        );
        assert_eq!(report.result_kind, ResultKind::Structured);
    }
}
