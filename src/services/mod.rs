pub mod database; // PostgreSQL and Neo4j executors
pub mod llm_service;
pub mod query_service;

pub use llm_service::*;
pub use query_service::*;
