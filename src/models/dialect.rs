use serde::{Deserialize, Serialize};
use std::fmt;

/// Target query language of one pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sql,
    Cypher,
}

/// How a presenter should render a dialect's rows
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Flat rows with a fixed column list
    Tabular,
    /// Nested records (nodes, relationships, maps)
    Structured,
}

/// Per-dialect generation record
#[derive(Debug)]
pub struct DialectConfig {
    /// Instruction text with `{schema}` and `{question}` placeholders
    pub template: &'static str,
    pub result_kind: ResultKind,
    /// Whether generated text goes through the sanitizer before execution
    pub sanitize_output: bool,
}

const SQL_TEMPLATE: &str = r#"You are a SQL expert. Given the following SQL DDL schema and a question, generate a SQL query that answers the question.

SQL DDL Schema:
{schema}

Question: {question}

SQL Query:"#;

const CYPHER_TEMPLATE: &str = r#"You are a Neo4j Cypher expert. Given the following Neo4j schema and a question, generate a Cypher query that answers the question.

Neo4j Schema:
{schema}

Question: {question}

Cypher Query:"#;

static SQL_CONFIG: DialectConfig = DialectConfig {
    template: SQL_TEMPLATE,
    result_kind: ResultKind::Tabular,
    sanitize_output: true,
};

static CYPHER_CONFIG: DialectConfig = DialectConfig {
    template: CYPHER_TEMPLATE,
    result_kind: ResultKind::Structured,
    sanitize_output: false,
};

impl Dialect {
    pub fn config(&self) -> &'static DialectConfig {
        match self {
            Dialect::Sql => &SQL_CONFIG,
            Dialect::Cypher => &CYPHER_CONFIG,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sql => "sql",
            Dialect::Cypher => "cypher",
        }
    }

    /// Fill the dialect's template with the schema and question.
    ///
    /// Substitution is a single left-to-right pass over the template, so braces
    /// inside the schema or the question are copied through untouched.
    pub fn render_prompt(&self, schema: &str, question: &str) -> String {
        let template = self.config().template;
        let mut prompt = String::with_capacity(template.len() + schema.len() + question.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            prompt.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{schema}") {
                prompt.push_str(schema);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                prompt.push_str(question);
                rest = after;
            } else {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
        prompt.push_str(rest);
        prompt
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_embeds_inputs_verbatim() {
        let prompt = Dialect::Sql.render_prompt("CREATE TABLE t (id INT);", "How many rows?");
        assert!(prompt.starts_with("You are a SQL expert."));
        assert!(prompt.contains("SQL DDL Schema:\nCREATE TABLE t (id INT);\n"));
        assert!(prompt.contains("Question: How many rows?"));
        assert!(prompt.ends_with("SQL Query:"));
        assert!(!prompt.contains("{schema}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_render_prompt_does_not_rescan_substituted_text() {
        let prompt = Dialect::Cypher.render_prompt(
            "- User: {user_id: INTEGER} {question}",
            "Who? {schema}",
        );
        assert!(prompt.contains("Neo4j Schema:\n- User: {user_id: INTEGER} {question}\n"));
        assert!(prompt.contains("Question: Who? {schema}"));
        assert!(prompt.starts_with("You are a Neo4j Cypher expert."));
    }

    #[test]
    fn test_dialect_configs() {
        assert_eq!(Dialect::Sql.config().result_kind, ResultKind::Tabular);
        assert_eq!(Dialect::Cypher.config().result_kind, ResultKind::Structured);
        assert!(Dialect::Sql.config().sanitize_output);
        assert!(!Dialect::Cypher.config().sanitize_output);
        assert_eq!(serde_json::to_string(&Dialect::Sql).unwrap(), "\"sql\"");
    }
}
