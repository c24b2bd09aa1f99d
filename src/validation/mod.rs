pub mod cypher_validator;
pub mod sanitizer;
pub mod sql_validator;

pub use cypher_validator::CypherValidator;
pub use sanitizer::sanitize;
pub use sql_validator::SqlValidator;

use thiserror::Error;

use crate::models::Dialect;

/// Why the read-only guard refused a generated query
#[derive(Debug, Error, PartialEq)]
pub enum GuardError {
    #[error("{0}")]
    Parse(String),

    #[error("{0} statements are not allowed. Only read queries are permitted.")]
    Forbidden(String),

    #[error("Empty query")]
    Empty,
}

impl GuardError {
    fn forbidden(kind: impl Into<String>) -> Self {
        GuardError::Forbidden(kind.into())
    }
}

/// Opt-in check that a generated query cannot write
pub fn validate_read_only(dialect: Dialect, text: &str) -> Result<(), GuardError> {
    match dialect {
        Dialect::Sql => SqlValidator::validate_select_only(text),
        Dialect::Cypher => CypherValidator::validate_read_only(text),
    }
}
