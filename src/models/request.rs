use serde::Deserialize;
use thiserror::Error;

use super::connection::{ModelCredential, Neo4jParams, PostgresParams};

/// Why a submission could not be turned into a request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Please enter a question.")]
    MissingQuestion,

    #[error("Model API key not set. Provide api_key or configure LLM_API_KEY.")]
    MissingCredential,

    #[error("{0} schema cannot be empty")]
    EmptySchema(&'static str),
}

/// One natural-language question and the schema context for both dialects.
///
/// Built once per submission and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    question: String,
    relational_schema: String,
    graph_schema: String,
}

impl Request {
    pub fn new(
        question: &str,
        relational_schema: &str,
        graph_schema: &str,
    ) -> Result<Self, RequestError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RequestError::MissingQuestion);
        }
        if relational_schema.trim().is_empty() {
            return Err(RequestError::EmptySchema("Relational"));
        }
        if graph_schema.trim().is_empty() {
            return Err(RequestError::EmptySchema("Graph"));
        }

        Ok(Self {
            question: question.to_string(),
            relational_schema: relational_schema.to_string(),
            graph_schema: graph_schema.to_string(),
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn relational_schema(&self) -> &str {
        &self.relational_schema
    }

    pub fn graph_schema(&self) -> &str {
        &self.graph_schema
    }
}

/// Body of `POST /api/queries`. Every field except the question may be
/// omitted and is then taken from configuration.
#[derive(Debug, Default, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub question: String,
    pub relational_schema: Option<String>,
    pub graph_schema: Option<String>,
    pub api_key: Option<String>,
    pub postgres: Option<PostgresParams>,
    pub neo4j: Option<Neo4jParams>,
}

impl QueryForm {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// Fallback values for fields a form leaves out
#[derive(Debug, Clone)]
pub struct SubmissionDefaults {
    pub relational_schema: String,
    pub graph_schema: String,
    pub credential: Option<ModelCredential>,
    pub postgres: PostgresParams,
    pub neo4j: Neo4jParams,
}

/// A fully resolved submission, ready for the pipelines
#[derive(Debug, Clone)]
pub struct Submission {
    pub request: Request,
    pub credential: ModelCredential,
    pub postgres: PostgresParams,
    pub neo4j: Neo4jParams,
}

impl Submission {
    /// Merge a form over the defaults, failing fast when the question or the
    /// model credential is missing.
    pub fn resolve(form: QueryForm, defaults: &SubmissionDefaults) -> Result<Self, RequestError> {
        let relational_schema = form
            .relational_schema
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| defaults.relational_schema.clone());
        let graph_schema = form
            .graph_schema
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| defaults.graph_schema.clone());

        let request = Request::new(&form.question, &relational_schema, &graph_schema)?;

        let credential = form
            .api_key
            .and_then(ModelCredential::new)
            .or_else(|| defaults.credential.clone())
            .ok_or(RequestError::MissingCredential)?;

        Ok(Self {
            request,
            credential,
            postgres: form.postgres.unwrap_or_else(|| defaults.postgres.clone()),
            neo4j: form.neo4j.unwrap_or_else(|| defaults.neo4j.clone()),
        })
    }
}
