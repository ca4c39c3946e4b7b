//! Metadata sources: something that runs SQL text and streams rows back.
//!
//! # Module Structure
//! - `memory`: canned rows keyed by SQL text, for fixtures and tests
//! - `sqlite`: a single sqlx SQLite connection (feature `sqlite`)
//! - `postgres`: a single sqlx PostgreSQL connection (feature `postgresql`)
//!
//! A source hands out one [`RowStream`] at a time: the stream borrows the
//! source mutably, so two retrievers can never hold cursors on the same
//! connection. Dropping the stream releases the statement and cursor,
//! whichever way the consuming retriever exits.

pub mod memory;
#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemorySource;
#[cfg(feature = "postgresql")]
pub use postgres::PgSource;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;

use crate::Result;
use crate::attributes::AttributeBag;
use crate::models::MetadataEnum;
use futures::stream::BoxStream;
use serde_json::Value;

/// Forward-only stream of rows for one query.
pub type RowStream<'a> = BoxStream<'a, Result<MetadataRow>>;

/// Executes metadata queries against one connection.
pub trait MetadataSource: Send {
    /// Runs `sql` and streams its rows. Execution errors surface as the
    /// first item of the stream.
    fn query<'a>(&'a mut self, sql: &'a str) -> RowStream<'a>;
}

/// One result row with named, loosely typed values.
///
/// Column names match case-insensitively. Every typed accessor marks its
/// column as consumed; [`MetadataRow::attributes`] returns only the columns
/// nobody asked for, which become the entity's vendor attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRow {
    columns: Vec<(String, Value)>,
    consumed: Vec<bool>,
}

impl MetadataRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MetadataRow::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a column.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
        self.consumed.push(false);
    }

    /// Whether the row has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Whether the row has a non-null value for this column.
    pub fn has_value(&self, name: &str) -> bool {
        self.position(name)
            .and_then(|slot| self.columns.get(slot))
            .is_some_and(|(_, value)| !value.is_null())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|(column, _)| column.eq_ignore_ascii_case(name))
    }

    fn take(&mut self, name: &str) -> Option<&Value> {
        let slot = self.position(name)?;
        if let Some(flag) = self.consumed.get_mut(slot) {
            *flag = true;
        }
        self.columns.get(slot).map(|(_, value)| value)
    }

    /// Trimmed text value; numbers and booleans are rendered as text.
    pub fn string(&mut self, name: &str) -> Option<String> {
        match self.take(name)? {
            Value::String(text) => Some(text.trim().to_string()),
            other => render(other),
        }
    }

    /// Untrimmed text value, for definition fragments whose whitespace at
    /// the split points is significant.
    pub fn text(&mut self, name: &str) -> Option<String> {
        match self.take(name)? {
            Value::String(text) => Some(text.clone()),
            other => render(other),
        }
    }

    /// Integer value, or `default` when absent or unparseable.
    pub fn int(&mut self, name: &str, default: i64) -> i64 {
        match self.take(name) {
            Some(Value::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(Value::String(text)) => text.trim().parse().unwrap_or(default),
            Some(Value::Bool(flag)) => i64::from(*flag),
            _ => default,
        }
    }

    /// Boolean value. Accepts `true`, non-zero numbers and the usual
    /// INFORMATION_SCHEMA spellings (`YES`, `Y`, `TRUE`, `T`, `1`).
    pub fn boolean(&mut self, name: &str) -> bool {
        match self.take(name) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(text)) => matches!(
                text.trim().to_ascii_uppercase().as_str(),
                "YES" | "Y" | "TRUE" | "T" | "1"
            ),
            _ => false,
        }
    }

    /// Enumeration value, or `default` when absent or unrecognised.
    pub fn enumeration<E: MetadataEnum>(&mut self, name: &str, default: E) -> E {
        self.string(name)
            .and_then(|text| E::parse_metadata(&text))
            .unwrap_or(default)
    }

    /// Columns not read through a typed accessor, skipping SQL NULLs.
    pub fn attributes(&self) -> AttributeBag {
        self.columns
            .iter()
            .zip(&self.consumed)
            .filter(|((_, value), consumed)| !**consumed && !value.is_null())
            .map(|((name, value), _)| (name.clone(), value.clone()))
            .collect()
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckOptionType, ConditionTimingType};
    use serde_json::json;

    fn view_row() -> MetadataRow {
        MetadataRow::new()
            .with("TABLE_CATALOG", Value::Null)
            .with("TABLE_SCHEMA", " PUBLIC ")
            .with("TABLE_NAME", "V")
            .with("VIEW_DEFINITION", "SELECT a ")
            .with("CHECK_OPTION", "local")
            .with("IS_UPDATABLE", "YES")
            .with("REMARKS", "vendor note")
            .with("ROW_ESTIMATE", 42)
    }

    #[test]
    fn test_typed_accessors() {
        let mut row = view_row();

        assert_eq!(row.string("table_schema").as_deref(), Some("PUBLIC"));
        assert_eq!(row.string("TABLE_CATALOG"), None);
        assert_eq!(row.text("VIEW_DEFINITION").as_deref(), Some("SELECT a "));
        assert_eq!(
            row.enumeration("CHECK_OPTION", CheckOptionType::Unknown),
            CheckOptionType::Local
        );
        assert!(row.boolean("IS_UPDATABLE"));
        assert!(!row.boolean("MISSING"));
        assert!(row.has_value("REMARKS"));
        assert!(!row.has_value("TABLE_CATALOG"));
        assert!(!row.has_value("MISSING"));
        assert_eq!(row.int("ROW_ESTIMATE", 0), 42);
        assert_eq!(row.int("MISSING", 7), 7);
    }

    #[test]
    fn test_attributes_are_the_unread_columns() {
        let mut row = view_row();
        let _ = row.string("TABLE_SCHEMA");
        let _ = row.string("TABLE_NAME");
        let _ = row.text("VIEW_DEFINITION");
        let _ = row.string("CHECK_OPTION");
        let _ = row.boolean("IS_UPDATABLE");

        let attributes = row.attributes();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes.get("REMARKS"), Some(&json!("vendor note")));
        assert_eq!(attributes.get("ROW_ESTIMATE"), Some(&json!(42)));
        // NULL catalog was never read but is skipped
        assert!(!attributes.contains_key("TABLE_CATALOG"));
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let mut row = MetadataRow::new()
            .with("ACTION_ORDER", "first")
            .with("ACTION_TIMING", "sometimes")
            .with("IS_GRANTABLE", "NO");

        assert_eq!(row.int("ACTION_ORDER", 0), 0);
        assert_eq!(
            row.enumeration("ACTION_TIMING", ConditionTimingType::Unknown),
            ConditionTimingType::Unknown
        );
        assert!(!row.boolean("IS_GRANTABLE"));
    }

    #[test]
    fn test_numbers_render_as_strings() {
        let mut row = MetadataRow::new().with("ORDINAL_POSITION", 3).with("FLAG", true);
        assert_eq!(row.string("ORDINAL_POSITION").as_deref(), Some("3"));
        assert_eq!(row.int("FLAG", 0), 1);
    }
}
