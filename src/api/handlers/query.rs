use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::json;

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{mask_credentials, DualQueryResponse, Neo4jParams, QueryForm};

/// Generate SQL and Cypher for a question and run both
pub async fn execute_dual_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryForm>, JsonRejection>,
) -> Result<Json<DualQueryResponse>, AppError> {
    let Json(form) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    tracing::info!("Received dual query submission");
    let response = state.query_service.submit(form).await?;

    Ok(Json(response))
}

/// Schemas and non-secret connection defaults for pre-filling a form
pub async fn get_defaults(State(state): State<AppState>) -> Json<serde_json::Value> {
    let defaults = state.query_service.defaults();
    let neo4j = Neo4jParams {
        uri: mask_credentials(&defaults.neo4j.uri),
        ..defaults.neo4j.clone()
    };

    Json(json!({
        "relational_schema": defaults.relational_schema,
        "graph_schema": defaults.graph_schema,
        "postgres": defaults.postgres,
        "neo4j": neo4j,
        "llm": {
            "endpoint": state.config.llm.endpoint,
            "model": state.config.llm.model,
            "credential_configured": defaults.credential.is_some(),
        },
        "read_only": state.config.execution.read_only,
    }))
}
