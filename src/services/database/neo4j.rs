// Neo4j executor: one single-connection driver per generated query
use neo4rs::{query, ConfigBuilder, Graph, Row};
use serde_json::{Map, Value};

use crate::models::{mask_credentials, ExecutionOutcome, Neo4jParams};
use crate::services::database::{
    collect_columns, run_with_timeout, ExecutionError, QueryExecutor, QueryResult,
};

const SUPPORTED_SCHEMES: [&str; 6] = ["bolt", "bolt+s", "bolt+ssc", "neo4j", "neo4j+s", "neo4j+ssc"];

/// Words that end a RETURN projection list
const PROJECTION_TERMINATORS: [&str; 4] = ["ORDER", "SKIP", "LIMIT", "UNION"];

pub struct Neo4jExecutor {
    timeout_secs: u64,
}

impl Neo4jExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    async fn run(&self, params: &Neo4jParams, cypher: &str) -> Result<QueryResult, ExecutionError> {
        validate_uri(&params.uri)?;

        let mut builder = ConfigBuilder::default()
            .uri(params.uri.as_str())
            .user(params.username.as_str())
            .password(params.password.as_str())
            .max_connections(1);
        if let Some(database) = params.database.as_deref() {
            builder = builder.db(database);
        }
        let config = builder
            .build()
            .map_err(|e| ExecutionError::Connection(e.to_string()))?;

        // Stream and driver are dropped before returning, which hands the
        // connection back and closes the pool on every path.
        let graph = Graph::connect(config)
            .await
            .map_err(|e| ExecutionError::Connection(e.to_string()))?;
        let mut stream = graph
            .execute(query(cypher))
            .await
            .map_err(|e| ExecutionError::Query(e.to_string()))?;

        // Rows arrive as hash maps, so field order comes from the query text
        let projection = projection_names(cypher);
        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| ExecutionError::Query(e.to_string()))?
        {
            rows.push(record_to_json(&row, &projection)?);
        }
        drop(stream);
        drop(graph);

        let columns = if rows.is_empty() {
            projection
        } else {
            collect_columns(&rows)
        };
        Ok(QueryResult { columns, rows })
    }
}

#[async_trait::async_trait]
impl QueryExecutor for Neo4jExecutor {
    type Params = Neo4jParams;

    async fn execute(&self, params: &Neo4jParams, cypher: &str) -> ExecutionOutcome {
        tracing::debug!("Executing Cypher against {}", mask_credentials(&params.uri));
        run_with_timeout(self.timeout_secs, self.run(params, cypher)).await
    }
}

fn validate_uri(uri: &str) -> Result<(), ExecutionError> {
    let parsed = url::Url::parse(uri)
        .map_err(|e| ExecutionError::Connection(format!("Invalid Neo4j URI: {}", e)))?;

    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(ExecutionError::Connection(format!(
            "Unsupported Neo4j URI scheme '{}'. Use one of: {}",
            parsed.scheme(),
            SUPPORTED_SCHEMES.join(", ")
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ExecutionError::Connection("Neo4j URI has no host".to_string()));
    }

    Ok(())
}

/// Materialize one record as a JSON object with fields in projection order.
///
/// Nodes and relationships become objects of their properties. Fields the
/// projection does not name (`RETURN *`) follow in name order.
fn record_to_json(row: &Row, projection: &[String]) -> Result<Value, ExecutionError> {
    let record: Value = row
        .to()
        .map_err(|e| ExecutionError::Query(format!("Failed to read record: {}", e)))?;

    let Value::Object(fields) = record else {
        return Ok(record);
    };
    let mut fields: Vec<(String, Value)> = fields.into_iter().collect();
    let mut ordered = Map::with_capacity(fields.len());
    for name in projection {
        if let Some(pos) = fields.iter().position(|(key, _)| key == name) {
            let (key, value) = fields.swap_remove(pos);
            ordered.insert(key, value);
        }
    }
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    ordered.extend(fields);

    Ok(Value::Object(ordered))
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    Word(usize, usize),
    Comma(usize),
    End(usize),
}

/// Byte positions of bare words, commas and semicolons outside brackets,
/// quotes and property access
fn top_level_marks(cypher: &str) -> Vec<Mark> {
    let mut marks = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut word_start: Option<usize> = None;
    let mut prev = ' ';

    for (i, c) in cypher.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            prev = c;
            continue;
        }

        let ident = c.is_alphanumeric() || c == '_';
        if let Some(start) = word_start {
            if !ident {
                if depth == 0 {
                    marks.push(Mark::Word(start, i));
                }
                word_start = None;
            }
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => marks.push(Mark::Comma(i)),
            ';' if depth == 0 => marks.push(Mark::End(i)),
            _ if ident
                && word_start.is_none()
                && !(prev.is_alphanumeric() || matches!(prev, '_' | '.' | '$')) =>
            {
                word_start = Some(i)
            }
            _ => {}
        }
        prev = c;
    }
    if let (Some(start), 0) = (word_start, depth) {
        marks.push(Mark::Word(start, cypher.len()));
    }
    marks
}

/// Column names of the last top-level RETURN, in order.
///
/// Aliased items use the alias; others use their expression text, which is
/// how the server names them. `RETURN *` gives an empty list.
fn projection_names(cypher: &str) -> Vec<String> {
    let marks = top_level_marks(cypher);
    let Some((ret, body_start)) = marks.iter().enumerate().rev().find_map(|(idx, mark)| match *mark {
        Mark::Word(s, e) if cypher[s..e].eq_ignore_ascii_case("RETURN") => Some((idx, e)),
        _ => None,
    }) else {
        return Vec::new();
    };

    let mut items: Vec<(usize, usize, Option<usize>)> = Vec::new();
    let mut start = body_start;
    let mut end = cypher.len();
    let mut alias = None;
    for mark in &marks[ret + 1..] {
        match *mark {
            Mark::Comma(at) => {
                items.push((start, at, alias.take()));
                start = at + 1;
            }
            Mark::End(at) => {
                end = at;
                break;
            }
            Mark::Word(s, e) => {
                let word = &cypher[s..e];
                if PROJECTION_TERMINATORS.iter().any(|k| word.eq_ignore_ascii_case(k)) {
                    end = s;
                    break;
                }
                if word.eq_ignore_ascii_case("AS") {
                    alias = Some(e);
                }
            }
        }
    }
    items.push((start, end.max(start), alias));

    let mut names = Vec::with_capacity(items.len());
    for (idx, (s, e, alias)) in items.into_iter().enumerate() {
        let name = match alias {
            Some(a) => cypher[a..e].trim().trim_matches('`'),
            None if idx == 0 => strip_distinct(cypher[s..e].trim()),
            None => cypher[s..e].trim(),
        };
        if name.is_empty() || name == "*" {
            return Vec::new();
        }
        names.push(name.to_string());
    }
    names
}

fn strip_distinct(item: &str) -> &str {
    match item.get(..8) {
        Some(head)
            if head.eq_ignore_ascii_case("DISTINCT")
                && item[8..].starts_with(char::is_whitespace) =>
        {
            item[8..].trim_start()
        }
        _ => item,
    }
}
