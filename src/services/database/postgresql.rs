// PostgreSQL executor: one short-lived connection per generated query
use serde_json::{json, Map, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, NoTls, Row, SimpleQueryMessage};

use crate::models::{ExecutionOutcome, PostgresParams};
use crate::services::database::{run_with_timeout, ExecutionError, QueryExecutor, QueryResult};

pub struct PostgresExecutor {
    timeout_secs: u64,
    read_only: bool,
}

impl PostgresExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            read_only: false,
        }
    }

    /// Open every session with `default_transaction_read_only` set, so the
    /// server refuses writes the static guard cannot see
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    async fn run(&self, params: &PostgresParams, sql: &str) -> Result<QueryResult, ExecutionError> {
        let session = PgSession::open(params, self.timeout_secs, self.read_only).await?;

        // No bound parameters: the generated text runs as-is
        let result = if is_multi_statement(sql) {
            run_simple(&session.client, sql).await
        } else {
            match session.client.query(sql, &[]).await {
                Ok(rows) => Ok(rows_to_result(&rows)),
                Err(e) if is_multiple_commands_error(&e) => run_simple(&session.client, sql).await,
                Err(e) => Err(ExecutionError::Query(describe_error(&e))),
            }
        };
        session.close().await;

        result
    }
}

/// True when the text parses as more than one statement
fn is_multi_statement(sql: &str) -> bool {
    Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map(|statements| statements.len() > 1)
        .unwrap_or(false)
}

/// The extended protocol refuses several commands in one prepared statement
fn is_multiple_commands_error(e: &tokio_postgres::Error) -> bool {
    e.as_db_error()
        .is_some_and(|db| db.message().contains("multiple commands"))
}

/// Run text through the simple protocol and keep the last statement's rows.
///
/// Values arrive in text format, so every non-null cell is a JSON string.
async fn run_simple(client: &Client, sql: &str) -> Result<QueryResult, ExecutionError> {
    let messages = client
        .simple_query(sql)
        .await
        .map_err(|e| ExecutionError::Query(describe_error(&e)))?;

    let pieces = messages.iter().filter_map(|message| match message {
        SimpleQueryMessage::RowDescription(columns) => Some(SimplePiece::Columns(
            columns.iter().map(|c| c.name().to_string()).collect(),
        )),
        SimpleQueryMessage::Row(row) => Some(SimplePiece::Row(
            (0..row.len())
                .map(|idx| row.try_get(idx).ok().flatten().map(str::to_string))
                .collect(),
        )),
        SimpleQueryMessage::CommandComplete(_) => Some(SimplePiece::Complete),
        _ => None,
    });
    Ok(last_result_set(pieces))
}

/// Simple-protocol traffic reduced to what result folding needs
#[derive(Debug)]
enum SimplePiece {
    Columns(Vec<String>),
    Row(Vec<Option<String>>),
    Complete,
}

/// Fold statement results, keeping only the last one. A trailing command
/// without rows gives an empty result.
fn last_result_set(pieces: impl IntoIterator<Item = SimplePiece>) -> QueryResult {
    let mut last = QueryResult::default();
    let mut current: Option<(Vec<String>, Vec<Value>)> = None;

    for piece in pieces {
        match piece {
            SimplePiece::Columns(names) => current = Some((unique_column_names(names), Vec::new())),
            SimplePiece::Row(values) => {
                if let Some((columns, rows)) = current.as_mut() {
                    let values = values
                        .into_iter()
                        .map(|v| v.map_or(Value::Null, Value::String));
                    rows.push(row_object(columns, values));
                }
            }
            SimplePiece::Complete => {
                let (columns, rows) = current.take().unwrap_or_default();
                last = QueryResult { columns, rows };
            }
        }
    }

    last
}

#[async_trait::async_trait]
impl QueryExecutor for PostgresExecutor {
    type Params = PostgresParams;

    async fn execute(&self, params: &PostgresParams, sql: &str) -> ExecutionOutcome {
        tracing::debug!(
            "Executing SQL against {}:{}/{}",
            params.host,
            params.port,
            params.database
        );
        run_with_timeout(self.timeout_secs, self.run(params, sql)).await
    }
}

/// A connected client together with the task driving its socket.
///
/// `close` drops the client and waits for the connection task to finish. If
/// the session is dropped instead (timeout, cancellation) the client drop
/// still terminates the connection and the task ends on its own.
struct PgSession {
    client: Client,
    connection: JoinHandle<()>,
}

impl PgSession {
    async fn open(
        params: &PostgresParams,
        timeout_secs: u64,
        read_only: bool,
    ) -> Result<Self, ExecutionError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .dbname(&params.database)
            .user(&params.username)
            .password(&params.password)
            .connect_timeout(Duration::from_secs(timeout_secs.max(1)));
        if read_only {
            config.options("-c default_transaction_read_only=on");
        }

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| ExecutionError::Connection(describe_error(&e)))?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("PostgreSQL connection closed with error: {}", e);
            }
        });

        Ok(Self { client, connection })
    }

    async fn close(self) {
        let PgSession { client, connection } = self;
        drop(client);
        if let Err(e) = connection.await {
            tracing::warn!("PostgreSQL connection task failed: {}", e);
        }
    }
}

/// Error text with SQLSTATE details when the server sent them
fn describe_error(e: &tokio_postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        let mut details = format!(
            "Code: {}, Message: {}",
            db_error.code().code(),
            db_error.message()
        );
        if let Some(detail) = db_error.detail() {
            details.push_str(&format!(", Detail: {}", detail));
        }
        if let Some(hint) = db_error.hint() {
            details.push_str(&format!(", Hint: {}", hint));
        }
        details
    } else {
        e.to_string()
    }
}

/// Column names made unique by suffixing repeats: `name`, `name_2`, ...
fn unique_column_names(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 1;
        while unique.contains(&candidate) {
            n += 1;
            candidate = format!("{}_{}", name, n);
        }
        unique.push(candidate);
    }
    unique
}

/// One JSON object per row, fields in column order
fn row_object(columns: &[String], values: impl IntoIterator<Item = Value>) -> Value {
    Value::Object(columns.iter().cloned().zip(values).collect::<Map<String, Value>>())
}

/// Convert PostgreSQL rows to JSON objects keyed by column name
fn rows_to_result(rows: &[Row]) -> QueryResult {
    let Some(first) = rows.first() else {
        return QueryResult::default();
    };
    let columns = unique_column_names(first.columns().iter().map(|c| c.name().to_string()).collect());

    let rows = rows
        .iter()
        .map(|row| {
            let values = row
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| column_to_json(row, idx, column.type_()));
            row_object(&columns, values)
        })
        .collect();

    QueryResult { columns, rows }
}

/// Undecoded column bytes, `None` for SQL NULL
struct RawColumn<'a>(Option<&'a [u8]>);

impl<'a> FromSql<'a> for RawColumn<'a> {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(Some(raw)))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(None))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn column_to_json(row: &Row, idx: usize, ty: &Type) -> Value {
    match row.try_get::<_, RawColumn>(idx) {
        Ok(RawColumn(raw)) => decode_value(ty, raw),
        Err(e) => {
            tracing::warn!("Failed to read column {}: {}", idx, e);
            Value::Null
        }
    }
}

/// Decode one binary-format value to JSON by its PostgreSQL type
fn decode_value(ty: &Type, raw: Option<&[u8]>) -> Value {
    fn get<'a, T, F>(ty: &Type, raw: Option<&'a [u8]>, to_json: F) -> Value
    where
        T: FromSql<'a>,
        F: FnOnce(T) -> Value,
    {
        match Option::<T>::from_sql_nullable(ty, raw) {
            Ok(Some(v)) => to_json(v),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::warn!("Failed to decode {} value: {}", ty.name(), e);
                Value::Null
            }
        }
    }

    match *ty {
        Type::BOOL => get::<bool, _>(ty, raw, |v| json!(v)),
        Type::INT2 => get::<i16, _>(ty, raw, |v| json!(v)),
        Type::INT4 => get::<i32, _>(ty, raw, |v| json!(v)),
        Type::INT8 => get::<i64, _>(ty, raw, |v| json!(v)),
        Type::OID => get::<u32, _>(ty, raw, |v| json!(v)),
        Type::FLOAT4 => get::<f32, _>(ty, raw, |v| json!(v)),
        Type::FLOAT8 => get::<f64, _>(ty, raw, |v| json!(v)),
        Type::NUMERIC => get::<PgNumeric, _>(ty, raw, |v| v.into_json()),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String, _>(ty, raw, Value::String)
        }
        Type::TIMESTAMP => get::<chrono::NaiveDateTime, _>(ty, raw, |v| {
            json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        Type::TIMESTAMPTZ => {
            get::<chrono::DateTime<chrono::Utc>, _>(ty, raw, |v| json!(v.to_rfc3339()))
        }
        Type::DATE => get::<chrono::NaiveDate, _>(ty, raw, |v| json!(v.to_string())),
        Type::TIME => get::<chrono::NaiveTime, _>(ty, raw, |v| json!(v.to_string())),
        Type::JSON | Type::JSONB => get::<Value, _>(ty, raw, |v| v),
        Type::UUID => get::<uuid::Uuid, _>(ty, raw, |v| json!(v.to_string())),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => get::<Vec<Option<String>>, _>(ty, raw, |v| json!(v)),
        Type::INT4_ARRAY => get::<Vec<Option<i32>>, _>(ty, raw, |v| json!(v)),
        Type::INT8_ARRAY => get::<Vec<Option<i64>>, _>(ty, raw, |v| json!(v)),
        _ => match raw {
            None => Value::Null,
            Some(_) if <String as FromSql<'_>>::accepts(ty) => get::<String, _>(ty, raw, Value::String),
            // Types with no text decoding show their name as a placeholder
            Some(_) => json!(format!("<{}>", ty.name())),
        },
    }
}

/// Exact decimal text of a `numeric` value, decoded from the binary wire format
#[derive(Debug, Clone, PartialEq)]
struct PgNumeric(String);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

impl PgNumeric {
    fn decode(raw: &[u8]) -> Result<Self, String> {
        let read_u16 = |at: usize| -> Result<u16, String> {
            raw.get(at..at + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .ok_or_else(|| "truncated numeric value".to_string())
        };

        let ndigits = read_u16(0)? as usize;
        let weight = read_u16(2)? as i16 as i32;
        let sign = read_u16(4)?;
        let dscale = read_u16(6)? as usize;

        match sign {
            NUMERIC_NAN => return Ok(Self("NaN".to_string())),
            NUMERIC_PINF => return Ok(Self("Infinity".to_string())),
            NUMERIC_NINF => return Ok(Self("-Infinity".to_string())),
            _ => {}
        }

        let digits = (0..ndigits)
            .map(|i| read_u16(8 + i * 2))
            .collect::<Result<Vec<u16>, String>>()?;
        let digit = |i: i32| -> u16 {
            if i < 0 {
                0
            } else {
                digits.get(i as usize).copied().unwrap_or(0)
            }
        };

        // Each digit is a base-10000 group; group i has weight (weight - i)
        let mut text = String::new();
        if sign == NUMERIC_NEG {
            text.push('-');
        }
        if weight >= 0 {
            for i in 0..=weight {
                if i == 0 {
                    text.push_str(&digit(i).to_string());
                } else {
                    text.push_str(&format!("{:04}", digit(i)));
                }
            }
        } else {
            text.push('0');
        }

        if dscale > 0 {
            let mut fraction = String::new();
            let mut i = weight + 1;
            while fraction.len() < dscale {
                fraction.push_str(&format!("{:04}", digit(i)));
                i += 1;
            }
            fraction.truncate(dscale);
            text.push('.');
            text.push_str(&fraction);
        }

        Ok(Self(text))
    }

    /// JSON number when it fits, otherwise the exact text
    fn into_json(self) -> Value {
        match self.0.parse::<serde_json::Number>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::String(self.0),
        }
    }
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        PgNumeric::decode(raw).map_err(|e| e.into())
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}
