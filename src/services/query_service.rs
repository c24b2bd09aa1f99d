use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::models::{
    Dialect, DialectReport, DualQueryResponse, ExecutionOutcome, FailureStage, GeneratedQuery,
    ModelCredential, Neo4jParams, PostgresParams, QueryForm, Request, RequestError, Submission,
    SubmissionDefaults,
};
use crate::services::database::QueryExecutor;
use crate::services::llm_service::QueryGenerator;
use crate::validation::{sanitize, validate_read_only};

pub type RelationalExecutor = Arc<dyn QueryExecutor<Params = PostgresParams>>;
pub type GraphExecutor = Arc<dyn QueryExecutor<Params = Neo4jParams>>;

/// Question → (SQL, Cypher) → (PostgreSQL, Neo4j) pipeline
pub struct QueryService {
    generator: Arc<dyn QueryGenerator>,
    relational: RelationalExecutor,
    graph: GraphExecutor,
    defaults: SubmissionDefaults,
    read_only: bool,
}

impl QueryService {
    pub fn new(
        generator: Arc<dyn QueryGenerator>,
        relational: RelationalExecutor,
        graph: GraphExecutor,
        defaults: SubmissionDefaults,
    ) -> Self {
        Self {
            generator,
            relational,
            graph,
            defaults,
            read_only: false,
        }
    }

    /// Reject generated queries that could write
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn defaults(&self) -> &SubmissionDefaults {
        &self.defaults
    }

    /// Resolve a form and run both pipelines.
    ///
    /// A missing question or credential fails before any network call.
    pub async fn submit(&self, form: QueryForm) -> Result<DualQueryResponse, RequestError> {
        let submission = Submission::resolve(form, &self.defaults)?;
        Ok(self.execute(submission).await)
    }

    /// Run the SQL and Cypher pipelines concurrently.
    ///
    /// Each pipeline ends in exactly one outcome. Neither can cancel the
    /// other, and a panic in one is reported as that dialect's failure.
    pub async fn execute(&self, submission: Submission) -> DualQueryResponse {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("dual_query", request_id = %request_id);

        async move {
            let Submission {
                request,
                credential,
                postgres,
                neo4j,
            } = submission;
            tracing::info!("Processing question: {}", request.question());

            let sql_pipeline = self.run_pipeline(
                Dialect::Sql,
                &request,
                &credential,
                self.relational.as_ref(),
                &postgres,
            );
            let cypher_pipeline = self.run_pipeline(
                Dialect::Cypher,
                &request,
                &credential,
                self.graph.as_ref(),
                &neo4j,
            );

            let (sql, cypher) = tokio::join!(
                Self::isolate(Dialect::Sql, sql_pipeline),
                Self::isolate(Dialect::Cypher, cypher_pipeline),
            );

            DualQueryResponse {
                request_id,
                question: request.question().to_string(),
                generated_at: Utc::now(),
                sql,
                cypher,
            }
        }
        .instrument(span)
        .await
    }

    /// Catch a panic inside one pipeline so its sibling still completes
    async fn isolate<F>(dialect: Dialect, pipeline: F) -> DialectReport
    where
        F: std::future::Future<Output = DialectReport>,
    {
        match AssertUnwindSafe(pipeline).catch_unwind().await {
            Ok(report) => report,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("{} pipeline panicked: {}", dialect, detail);
                DialectReport::new(
                    dialect,
                    None,
                    ExecutionOutcome::failure(
                        FailureStage::Internal,
                        format!("An unexpected error occurred: {}", detail),
                    ),
                )
            }
        }
    }

    /// generate → sanitize (SQL) → (read-only guard) → execute, for one dialect
    async fn run_pipeline<P: Send + Sync>(
        &self,
        dialect: Dialect,
        request: &Request,
        credential: &ModelCredential,
        executor: &dyn QueryExecutor<Params = P>,
        params: &P,
    ) -> DialectReport {
        let schema = match dialect {
            Dialect::Sql => request.relational_schema(),
            Dialect::Cypher => request.graph_schema(),
        };

        let raw = match self
            .generator
            .generate(dialect, schema, request.question(), credential)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("{} generation failed: {}", dialect, e);
                return DialectReport::new(
                    dialect,
                    None,
                    ExecutionOutcome::failure(FailureStage::Generation, e.to_string()),
                );
            }
        };

        // Cypher runs exactly as generated
        let text = if dialect.config().sanitize_output {
            sanitize(&raw)
        } else {
            raw
        };
        let query = GeneratedQuery { dialect, text };
        tracing::info!("Generated {} query: {}", dialect, query.text);

        if self.read_only {
            if let Err(e) = validate_read_only(dialect, &query.text) {
                tracing::warn!("{} query rejected by read-only guard: {}", dialect, e);
                return DialectReport::new(
                    dialect,
                    Some(query.text),
                    ExecutionOutcome::failure(FailureStage::Validation, e.to_string()),
                );
            }
        }

        let outcome = executor.execute(params, &query.text).await;
        match &outcome {
            ExecutionOutcome::Success {
                row_count,
                execution_time_ms,
                ..
            } => tracing::info!(
                "{} query returned {} rows in {} ms",
                dialect,
                row_count,
                execution_time_ms
            ),
            ExecutionOutcome::Failure { message, .. } => {
                tracing::warn!("{} query failed: {}", dialect, message)
            }
        }

        DialectReport::new(dialect, Some(query.text), outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_GRAPH_SCHEMA, DEFAULT_RELATIONAL_SCHEMA};
    use crate::services::database::PostgresExecutor;
    use crate::services::llm_service::GenerationError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Canned completions per dialect, counting calls
    #[derive(Default)]
    struct FakeGenerator {
        calls: AtomicUsize,
        fail: Option<Dialect>,
        panic_on: Option<Dialect>,
        prompts: Mutex<Vec<(Dialect, String, String)>>,
    }

    #[async_trait::async_trait]
    impl QueryGenerator for FakeGenerator {
        async fn generate(
            &self,
            dialect: Dialect,
            schema: &str,
            question: &str,
            _credential: &ModelCredential,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .unwrap()
                .push((dialect, schema.to_string(), question.to_string()));
            if self.panic_on == Some(dialect) {
                panic!("generator exploded");
            }
            if self.fail == Some(dialect) {
                return Err(GenerationError::Authentication {
                    status: 401,
                    body: "Invalid API Key".to_string(),
                });
            }
            Ok(match dialect {
                Dialect::Sql => "<s> ```sql\nSELECT i.name, COUNT(*) AS courses FROM instructors i \
                    JOIN course_instructors ci ON ci.instructor_id = i.instructor_id \
                    GROUP BY i.name HAVING COUNT(*) > 2;\n```"
                    .to_string(),
                Dialect::Cypher => "MATCH (i:Instructor)-[:TEACHES]->(c:Course) \
                    WITH i, count(c) AS courses WHERE courses > 2 RETURN i.name, courses"
                    .to_string(),
            })
        }
    }

    /// Records the text it receives and answers with a fixed outcome
    struct FakeExecutor<P> {
        calls: AtomicUsize,
        received: Mutex<Vec<String>>,
        outcome: ExecutionOutcome,
        _params: std::marker::PhantomData<fn(P)>,
    }

    impl<P> FakeExecutor<P> {
        fn new(outcome: ExecutionOutcome) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
                outcome,
                _params: std::marker::PhantomData,
            }
        }
    }

    #[async_trait::async_trait]
    impl<P: Send + Sync + 'static> QueryExecutor for FakeExecutor<P> {
        type Params = P;

        async fn execute(&self, _params: &P, text: &str) -> ExecutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.received.lock().unwrap().push(text.to_string());
            self.outcome.clone()
        }
    }

    fn defaults() -> SubmissionDefaults {
        SubmissionDefaults {
            relational_schema: DEFAULT_RELATIONAL_SCHEMA.to_string(),
            graph_schema: DEFAULT_GRAPH_SCHEMA.to_string(),
            credential: ModelCredential::new("test-key"),
            postgres: PostgresParams {
                host: "127.0.0.1".to_string(),
                port: 1,
                database: "postgres".to_string(),
                username: "postgres".to_string(),
                password: "root".to_string(),
            },
            neo4j: Neo4jParams {
                uri: "bolt://localhost:7687".to_string(),
                username: "neo4j".to_string(),
                password: "root1234".to_string(),
                database: None,
            },
        }
    }

    fn instructor_rows() -> ExecutionOutcome {
        ExecutionOutcome::success(
            vec!["i.name".to_string(), "courses".to_string()],
            vec![json!({"i.name": "Ada", "courses": 3})],
            2,
        )
    }

    struct Harness {
        generator: Arc<FakeGenerator>,
        relational: Arc<FakeExecutor<PostgresParams>>,
        graph: Arc<FakeExecutor<Neo4jParams>>,
        service: QueryService,
    }

    fn harness(generator: FakeGenerator, relational: ExecutionOutcome, graph: ExecutionOutcome) -> Harness {
        let generator = Arc::new(generator);
        let relational = Arc::new(FakeExecutor::new(relational));
        let graph = Arc::new(FakeExecutor::new(graph));
        let service = QueryService::new(
            generator.clone(),
            relational.clone(),
            graph.clone(),
            defaults(),
        );
        Harness {
            generator,
            relational,
            graph,
            service,
        }
    }

    #[tokio::test]
    async fn test_both_pipelines_succeed_with_sanitized_sql() {
        let h = harness(FakeGenerator::default(), instructor_rows(), instructor_rows());

        let response = h
            .service
            .submit(QueryForm::new("List all instructors with more than 2 courses"))
            .await
            .unwrap();

        assert!(response.sql.outcome.is_success());
        assert!(response.cypher.outcome.is_success());

        let sql = response.sql.query.unwrap();
        assert!(sql.starts_with("SELECT"));
        assert!(sql.contains("GROUP BY") && sql.contains("HAVING COUNT(*) > 2"));
        assert!(!sql.contains('`') && !sql.contains("<s>"));
        assert!(response.cypher.query.unwrap().starts_with("MATCH"));

        // Executors saw exactly the sanitized text, once each
        assert_eq!(h.relational.received.lock().unwrap().as_slice(), [sql.as_str()]);
        assert_eq!(h.graph.calls.load(Ordering::SeqCst), 1);

        // Each dialect got its own schema and the same question
        let prompts = h.generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        for (dialect, schema, question) in prompts.iter() {
            assert_eq!(question, "List all instructors with more than 2 courses");
            match dialect {
                Dialect::Sql => assert_eq!(schema, DEFAULT_RELATIONAL_SCHEMA),
                Dialect::Cypher => assert_eq!(schema, DEFAULT_GRAPH_SCHEMA),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_question_makes_no_calls() {
        let h = harness(FakeGenerator::default(), instructor_rows(), instructor_rows());

        let err = h.service.submit(QueryForm::new("")).await.unwrap_err();

        assert_eq!(err, RequestError::MissingQuestion);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.relational.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.graph.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_calls() {
        let mut h = harness(FakeGenerator::default(), instructor_rows(), instructor_rows());
        h.service.defaults.credential = None;

        let err = h.service.submit(QueryForm::new("How many users?")).await.unwrap_err();

        assert_eq!(err, RequestError::MissingCredential);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_relational_failure_does_not_touch_graph_outcome() {
        let h = harness(
            FakeGenerator::default(),
            ExecutionOutcome::failure(
                FailureStage::Execution,
                "Connection failed: error connecting to server: Connection refused",
            ),
            instructor_rows(),
        );

        let response = h.service.submit(QueryForm::new("q")).await.unwrap();

        assert_eq!(response.sql.outcome.failure_stage(), Some(FailureStage::Execution));
        assert!(response.sql.query.is_some());
        assert_eq!(response.cypher.outcome, instructor_rows());
    }

    #[tokio::test]
    async fn test_generation_failure_is_terminal_for_that_dialect_only() {
        let generator = FakeGenerator {
            fail: Some(Dialect::Cypher),
            ..FakeGenerator::default()
        };
        let h = harness(generator, instructor_rows(), instructor_rows());

        let response = h.service.submit(QueryForm::new("q")).await.unwrap();

        assert!(response.sql.outcome.is_success());
        assert!(response.cypher.query.is_none());
        assert_eq!(response.cypher.outcome.failure_stage(), Some(FailureStage::Generation));
        assert_eq!(h.graph.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.relational.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_in_one_pipeline_is_contained() {
        let generator = FakeGenerator {
            panic_on: Some(Dialect::Sql),
            ..FakeGenerator::default()
        };
        let h = harness(generator, instructor_rows(), instructor_rows());

        let response = h.service.submit(QueryForm::new("q")).await.unwrap();

        assert_eq!(response.sql.outcome.failure_stage(), Some(FailureStage::Internal));
        assert!(response.sql.outcome.error_message().unwrap().contains("generator exploded"));
        assert!(response.cypher.outcome.is_success());
    }

    #[tokio::test]
    async fn test_cypher_text_is_executed_unmodified() {
        struct FencedGenerator;

        #[async_trait::async_trait]
        impl QueryGenerator for FencedGenerator {
            async fn generate(
                &self,
                dialect: Dialect,
                _schema: &str,
                _question: &str,
                _credential: &ModelCredential,
            ) -> Result<String, GenerationError> {
                Ok(match dialect {
                    Dialect::Sql => "```sql\nSELECT 1\n```".to_string(),
                    Dialect::Cypher => "MATCH (u:`User`) RETURN u.username".to_string(),
                })
            }
        }

        let relational = Arc::new(FakeExecutor::<PostgresParams>::new(instructor_rows()));
        let graph = Arc::new(FakeExecutor::<Neo4jParams>::new(instructor_rows()));
        let service = QueryService::new(
            Arc::new(FencedGenerator),
            relational.clone(),
            graph.clone(),
            defaults(),
        );

        service.submit(QueryForm::new("q")).await.unwrap();

        assert_eq!(relational.received.lock().unwrap().as_slice(), ["SELECT 1"]);
        assert_eq!(
            graph.received.lock().unwrap().as_slice(),
            ["MATCH (u:`User`) RETURN u.username"]
        );
    }

    #[tokio::test]
    async fn test_read_only_guard_blocks_writes_before_execution() {
        struct WritingGenerator;

        #[async_trait::async_trait]
        impl QueryGenerator for WritingGenerator {
            async fn generate(
                &self,
                dialect: Dialect,
                _schema: &str,
                _question: &str,
                _credential: &ModelCredential,
            ) -> Result<String, GenerationError> {
                Ok(match dialect {
                    Dialect::Sql => "DELETE FROM users".to_string(),
                    Dialect::Cypher => "MATCH (u:User) RETURN u.username".to_string(),
                })
            }
        }

        let relational = Arc::new(FakeExecutor::<PostgresParams>::new(instructor_rows()));
        let graph = Arc::new(FakeExecutor::<Neo4jParams>::new(instructor_rows()));
        let service = QueryService::new(
            Arc::new(WritingGenerator),
            relational.clone(),
            graph.clone(),
            defaults(),
        )
        .with_read_only(true);

        let response = service.submit(QueryForm::new("Remove everyone")).await.unwrap();

        assert_eq!(response.sql.outcome.failure_stage(), Some(FailureStage::Validation));
        assert_eq!(relational.calls.load(Ordering::SeqCst), 0);
        assert!(response.cypher.outcome.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_postgres_with_working_graph() {
        // Real relational executor pointed at a closed port
        let graph = Arc::new(FakeExecutor::<Neo4jParams>::new(instructor_rows()));
        let service = QueryService::new(
            Arc::new(FakeGenerator::default()),
            Arc::new(PostgresExecutor::new(2)),
            graph.clone(),
            defaults(),
        );

        let response = service
            .submit(QueryForm::new("List all instructors with more than 2 courses"))
            .await
            .unwrap();

        assert_eq!(response.sql.outcome.failure_stage(), Some(FailureStage::Execution));
        assert!(response.sql.outcome.rows().is_none());
        assert_eq!(response.cypher.outcome.rows().map(|r| r.len()), Some(1));
    }
}
