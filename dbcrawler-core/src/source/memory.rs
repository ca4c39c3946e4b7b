//! Canned metadata source keyed by SQL text.

use super::{MetadataRow, MetadataSource, RowStream};
use crate::error::CrawlError;
use futures::StreamExt;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct CannedResult {
    rows: Vec<MetadataRow>,
    failure: Option<String>,
}

/// Replays registered rows for known SQL text and counts every query.
///
/// Unknown SQL fails like a query against a missing view would.
///
/// # Example
/// ```rust
/// use dbcrawler_core::source::{MemorySource, MetadataRow};
///
/// let source = MemorySource::new()
///     .with_rows("SELECT 1", vec![MetadataRow::new().with("X", 1)]);
/// assert_eq!(source.invocations("SELECT 1"), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    results: HashMap<String, CannedResult>,
    invocations: HashMap<String, usize>,
}

impl MemorySource {
    /// Creates a source with no registered queries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers rows returned for `sql`.
    pub fn with_rows(mut self, sql: impl Into<String>, rows: Vec<MetadataRow>) -> Self {
        self.results.insert(
            sql.into(),
            CannedResult {
                rows,
                failure: None,
            },
        );
        self
    }

    /// Registers a query that fails before returning any row.
    pub fn with_failure(self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.with_failure_after(sql, Vec::new(), message)
    }

    /// Registers a query that yields `rows` and then fails mid-stream.
    pub fn with_failure_after(
        mut self,
        sql: impl Into<String>,
        rows: Vec<MetadataRow>,
        message: impl Into<String>,
    ) -> Self {
        self.results.insert(
            sql.into(),
            CannedResult {
                rows,
                failure: Some(message.into()),
            },
        );
        self
    }

    /// How many times `sql` was executed.
    pub fn invocations(&self, sql: &str) -> usize {
        self.invocations.get(sql).copied().unwrap_or(0)
    }

    /// Total number of executed queries.
    pub fn total_invocations(&self) -> usize {
        self.invocations
            .values()
            .fold(0, |total, count| total.saturating_add(*count))
    }
}

impl MetadataSource for MemorySource {
    fn query<'a>(&'a mut self, sql: &'a str) -> RowStream<'a> {
        let count = self.invocations.entry(sql.to_string()).or_insert(0);
        *count = count.saturating_add(1);

        let Some(canned) = self.results.get(sql) else {
            let error = CrawlError::query_message(format!("no canned result for query: {sql}"));
            return futures::stream::once(async move { Err(error) }).boxed();
        };

        let rows = canned.rows.clone().into_iter().map(Ok);
        let failure = canned
            .failure
            .clone()
            .map(|message| Err(CrawlError::query_message(message)));
        futures::stream::iter(rows.chain(failure)).boxed()
    }
}
