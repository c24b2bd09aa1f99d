use serde::Deserialize;
use std::env;

use crate::models::{Neo4jParams, PostgresParams};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub postgres: PostgresParams,
    pub neo4j: Neo4jParams,
    pub execution: ExecutionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Applies to connecting and running a single query, per datastore.
    pub timeout_secs: u64,
    /// Reject generated queries that could write before they reach a datastore.
    pub read_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env first so its values participate in the overrides below
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("llm.endpoint", "https://api.groq.com/openai/v1/chat/completions")?
            .set_default("llm.model", "llama3-70b-8192")?
            .set_default("llm.timeout_secs", 60)?
            .set_default("llm.temperature", 0.1)?
            .set_default("llm.max_tokens", 512)?
            .set_default("postgres.host", "localhost")?
            .set_default("postgres.port", 5432)?
            .set_default("postgres.database", "postgres")?
            .set_default("postgres.username", "postgres")?
            .set_default("postgres.password", "root")?
            .set_default("neo4j.uri", "bolt://localhost:7687")?
            .set_default("neo4j.username", "neo4j")?
            .set_default("neo4j.password", "root1234")?
            .set_default("execution.timeout_secs", 30)?
            .set_default("execution.read_only", false)?
            .set_default("logging.level", "info")?;

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(endpoint) = env::var("LLM_ENDPOINT") {
            builder = builder.set_override("llm.endpoint", endpoint)?;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            builder = builder.set_override("llm.model", model)?;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY").or_else(|_| env::var("GROQ_API_KEY")) {
            if !api_key.trim().is_empty() {
                builder = builder.set_override("llm.api_key", Some(api_key))?;
            }
        }

        if let Ok(timeout) = env::var("LLM_TIMEOUT_SECS") {
            builder = builder.set_override("llm.timeout_secs", timeout.parse::<u64>().unwrap_or(60))?;
        }

        if let Ok(temperature) = env::var("LLM_TEMPERATURE") {
            builder = builder.set_override("llm.temperature", temperature.parse::<f64>().unwrap_or(0.1))?;
        }

        if let Ok(max_tokens) = env::var("LLM_MAX_TOKENS") {
            builder = builder.set_override("llm.max_tokens", max_tokens.parse::<u32>().unwrap_or(512))?;
        }

        if let Ok(host) = env::var("PG_HOST") {
            builder = builder.set_override("postgres.host", host)?;
        }

        if let Ok(port) = env::var("PG_PORT") {
            builder = builder.set_override("postgres.port", port.parse::<u16>().unwrap_or(5432))?;
        }

        if let Ok(database) = env::var("PG_DATABASE") {
            builder = builder.set_override("postgres.database", database)?;
        }

        if let Ok(user) = env::var("PG_USER") {
            builder = builder.set_override("postgres.username", user)?;
        }

        if let Ok(password) = env::var("PG_PASSWORD") {
            builder = builder.set_override("postgres.password", password)?;
        }

        if let Ok(uri) = env::var("NEO4J_URI") {
            builder = builder.set_override("neo4j.uri", uri)?;
        }

        if let Ok(user) = env::var("NEO4J_USERNAME") {
            builder = builder.set_override("neo4j.username", user)?;
        }

        if let Ok(password) = env::var("NEO4J_PASSWORD") {
            builder = builder.set_override("neo4j.password", password)?;
        }

        if let Ok(database) = env::var("NEO4J_DATABASE") {
            builder = builder.set_override("neo4j.database", Some(database))?;
        }

        if let Ok(timeout) = env::var("QUERY_TIMEOUT_SECS") {
            builder = builder.set_override("execution.timeout_secs", timeout.parse::<u64>().unwrap_or(30))?;
        }

        if let Ok(read_only) = env::var("QUERY_READ_ONLY") {
            let enabled = matches!(read_only.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
            builder = builder.set_override("execution.read_only", enabled)?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
