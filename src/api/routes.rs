use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers::{query, AppState};
use crate::config::Config;
use crate::models::{ModelCredential, SubmissionDefaults, DEFAULT_GRAPH_SCHEMA, DEFAULT_RELATIONAL_SCHEMA};
use crate::services::database::{Neo4jExecutor, PostgresExecutor};
use crate::services::{LlmService, QueryService};

/// Wire the generator and both executors from configuration
pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    let llm_service = LlmService::new(&config.llm)?;
    tracing::info!(
        "Using model {} at {} (credential configured: {})",
        llm_service.model(),
        config.llm.endpoint,
        config.llm.api_key.is_some()
    );

    let defaults = SubmissionDefaults {
        relational_schema: DEFAULT_RELATIONAL_SCHEMA.to_string(),
        graph_schema: DEFAULT_GRAPH_SCHEMA.to_string(),
        credential: config.llm.api_key.clone().and_then(ModelCredential::new),
        postgres: config.postgres.clone(),
        neo4j: config.neo4j.clone(),
    };

    let query_service = QueryService::new(
        Arc::new(llm_service),
        Arc::new(
            PostgresExecutor::new(config.execution.timeout_secs)
                .with_read_only(config.execution.read_only),
        ),
        Arc::new(Neo4jExecutor::new(config.execution.timeout_secs)),
        defaults,
    )
    .with_read_only(config.execution.read_only);

    Ok(AppState {
        config: Arc::new(config),
        query_service: Arc::new(query_service),
    })
}

/// Create router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/defaults", get(query::get_defaults))
        .route("/api/queries", post(query::execute_dual_query))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
