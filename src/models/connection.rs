use serde::{Deserialize, Serialize};
use std::fmt;

/// PostgreSQL connection parameters for one submission.
///
/// The password is accepted on input but never serialized or printed.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct PostgresParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl fmt::Debug for PostgresParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Neo4j connection parameters for one submission.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Neo4jParams {
    pub uri: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
}

impl fmt::Debug for Neo4jParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jParams")
            .field("uri", &mask_credentials(&self.uri))
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// API key for the completion endpoint.
#[derive(Clone, PartialEq)]
pub struct ModelCredential(String);

impl ModelCredential {
    /// Returns `None` for blank keys so an empty form field counts as missing.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ModelCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModelCredential(***)")
    }
}

/// Mask credentials in a connection URI for safe logging
pub fn mask_credentials(uri: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(uri) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-uri]".to_string()
    }
}
