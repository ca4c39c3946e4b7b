//! SQLite metadata source over a single sqlx connection.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - In-memory: `sqlite::memory:` or `:memory:`
//!
//! File databases are opened read-only. SQLite is dynamically typed, so each
//! value is decoded by trying the likely Rust types in turn.

use super::{MetadataRow, MetadataSource, RowStream};
use crate::Result;
use crate::error::CrawlError;
use base64::Engine;
use futures::StreamExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Row};
use std::str::FromStr;

/// Metadata source backed by one SQLite connection.
#[derive(Debug)]
pub struct SqliteSource {
    connection: SqliteConnection,
}

impl SqliteSource {
    /// Opens a connection from a SQLite URL or file path.
    ///
    /// # Errors
    /// Returns error if the connection string is malformed or the database
    /// cannot be opened.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let normalized = normalize_connection_string(connection_string);
        let in_memory = normalized.contains(":memory:") || normalized.contains("mode=memory");

        let options = SqliteConnectOptions::from_str(&normalized).map_err(|e| {
            CrawlError::configuration(format!("Invalid SQLite connection string: {e}"))
        })?;
        let options = options.read_only(!in_memory);

        tracing::debug!(
            "Opening SQLite metadata source (in_memory: {})",
            in_memory
        );
        let connection = options
            .connect()
            .await
            .map_err(CrawlError::connection_failed)?;
        Ok(Self { connection })
    }

    /// Wraps an already open connection.
    pub fn from_connection(connection: SqliteConnection) -> Self {
        Self { connection }
    }

    /// The underlying connection, for callers that need to run setup SQL.
    pub fn connection_mut(&mut self) -> &mut SqliteConnection {
        &mut self.connection
    }
}

impl MetadataSource for SqliteSource {
    fn query<'a>(&'a mut self, sql: &'a str) -> RowStream<'a> {
        sqlx::query(sql)
            .fetch(&mut self.connection)
            .map(|result| {
                result
                    .map(|row| metadata_row(&row))
                    .map_err(|e| CrawlError::query_failed("SQLite metadata query failed", e))
            })
            .boxed()
    }
}

fn metadata_row(row: &SqliteRow) -> MetadataRow {
    let mut metadata = MetadataRow::new();
    for column in row.columns() {
        metadata.push(column.name(), column_value(row, column.ordinal()));
    }
    metadata
}

fn column_value(row: &SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|bytes| {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Value::String(format!("base64:{encoded}"))
            })
            .unwrap_or(Value::Null);
    }

    Value::Null
}

/// Normalizes a connection string to SQLite URL format.
fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }
    format!("sqlite://{connection_string}")
}
