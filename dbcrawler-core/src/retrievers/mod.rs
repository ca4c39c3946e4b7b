//! Enrichment retrievers, one per metadata facet.
//!
//! # Module Structure
//! - `tables`: table attributes and long-form table definitions
//! - `columns`: column attributes
//! - `indexes`: index definitions
//! - `views`: view definitions, check options and updatability
//! - `triggers`: find-or-create triggers
//! - `privileges`: table and column grants, generic over the owner
//! - `constraints`: three-phase table constraint assembly
//!
//! Every retriever runs the same loop ([`run_facet`]): return early when the
//! facet has no query template, stream the rows, resolve each row against
//! the catalog and skip the ones that do not resolve. A query that fails to
//! execute or iterate ends the facet with a warning; rows applied before
//! the failure stay applied.

pub mod columns;
pub mod constraints;
pub mod indexes;
pub mod privileges;
pub mod tables;
pub mod triggers;
pub mod views;

pub use columns::retrieve_additional_column_attributes;
pub use constraints::{
    ConstraintLookup, ConstraintOutcome, attach_constraint_columns, attach_constraint_definitions,
    create_table_constraints, retrieve_table_constraints,
};
pub use indexes::retrieve_indexes;
pub use privileges::{retrieve_column_privileges, retrieve_table_privileges};
pub use tables::{retrieve_additional_table_attributes, retrieve_table_definitions};
pub use triggers::retrieve_triggers;
pub use views::retrieve_views;

use crate::catalog::Catalog;
use crate::diagnostics::{CrawlEvent, DiagnosticSink, FacetStats};
use crate::models::{Table, TableId};
use crate::queries::{Facet, QueryTemplates};
use crate::source::{MetadataRow, MetadataSource};
use futures::StreamExt;
use serde::Serialize;

/// How one facet run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FacetOutcome {
    /// No query template; nothing was executed
    NotConfigured,
    /// The row stream was consumed to the end
    Completed { stats: FacetStats },
    /// The query failed; `stats` covers the rows handled before the failure
    Failed { stats: FacetStats, error: String },
}

impl FacetOutcome {
    /// Row counters, zero when nothing ran.
    pub fn stats(&self) -> FacetStats {
        match self {
            Self::NotConfigured => FacetStats::default(),
            Self::Completed { stats } | Self::Failed { stats, .. } => *stats,
        }
    }

    /// Whether the facet's query failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Why a row was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowRejection {
    /// An identity key did not resolve
    NotFound { kind: &'static str, name: String },
    /// The row resolved to something it cannot apply to
    Skipped { name: String, reason: String },
}

impl RowRejection {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    fn into_event(self, facet: Facet) -> CrawlEvent {
        match self {
            Self::NotFound { kind, name } => CrawlEvent::EntityNotFound { facet, kind, name },
            Self::Skipped { name, reason } => CrawlEvent::RowSkipped {
                facet,
                name,
                reason,
            },
        }
    }
}

pub(crate) type RowResult = std::result::Result<(), RowRejection>;

/// Runs one facet's query and feeds every row to `apply`.
///
/// The row stream, and with it the statement and cursor, is dropped before
/// this returns on every path.
pub(crate) async fn run_facet<F>(
    facet: Facet,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
    mut apply: F,
) -> FacetOutcome
where
    F: FnMut(MetadataRow) -> RowResult,
{
    let Some(sql) = queries.sql(facet) else {
        sink.emit(CrawlEvent::CapabilityAbsent { facet });
        return FacetOutcome::NotConfigured;
    };

    tracing::trace!("Running {} query", facet);
    let mut stats = FacetStats::default();
    let mut rows = source.query(sql);
    while let Some(item) = rows.next().await {
        let row = match item {
            Ok(row) => row,
            Err(error) => {
                let error = error.detailed();
                sink.emit(CrawlEvent::QueryFailed {
                    facet,
                    error: error.clone(),
                });
                return FacetOutcome::Failed { stats, error };
            }
        };

        stats.seen();
        match apply(row) {
            Ok(()) => stats.applied(),
            Err(rejection) => {
                stats.skipped();
                sink.emit(rejection.into_event(facet));
            }
        }
    }

    sink.emit(CrawlEvent::FacetCompleted { facet, stats });
    FacetOutcome::Completed { stats }
}

/// Row columns naming a table: each slot lists alternate spellings in
/// preference order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyColumns {
    pub catalog: &'static [&'static str],
    pub schema: &'static [&'static str],
    pub table: &'static [&'static str],
}

/// INFORMATION_SCHEMA table identity.
pub(crate) const TABLE_KEY: KeyColumns = KeyColumns {
    catalog: &["TABLE_CATALOG"],
    schema: &["TABLE_SCHEMA"],
    table: &["TABLE_NAME"],
};

/// Raw identity values read from a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RowKey {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
}

impl RowKey {
    pub(crate) fn read(row: &mut MetadataRow, columns: &KeyColumns) -> Self {
        Self {
            catalog: first_string(row, columns.catalog),
            schema: first_string(row, columns.schema),
            table: first_string(row, columns.table),
        }
    }

    /// Present parts joined with `.`, plus an optional member name.
    pub(crate) fn display(&self, member: Option<&str>) -> String {
        [
            self.catalog.as_deref(),
            self.schema.as_deref(),
            self.table.as_deref(),
            member,
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(".")
    }
}

/// First non-null value among alternate column names. Every listed column
/// is consumed so none of them leaks into the attribute bag.
pub(crate) fn first_string(row: &mut MetadataRow, names: &[&str]) -> Option<String> {
    let mut found = None;
    for name in names {
        let value = row.string(name);
        if found.is_none() {
            found = value;
        }
    }
    found
}

/// Resolves a row key to an existing table.
pub(crate) fn resolve_table(catalog: &Catalog, key: &RowKey) -> Result<TableId, RowRejection> {
    key.table
        .as_deref()
        .and_then(|name| catalog.find_table(key.catalog.as_deref(), key.schema.as_deref(), name))
        .ok_or_else(|| RowRejection::not_found("table", key.display(None)))
}

/// Mutable table for a handle that was just resolved.
pub(crate) fn table_mut<'c>(
    catalog: &'c mut Catalog,
    id: TableId,
    key: &RowKey,
) -> Result<&'c mut Table, RowRejection> {
    catalog
        .table_mut(id)
        .ok_or_else(|| RowRejection::not_found("table", key.display(None)))
}

/// Ordinal position column value, clamped to the `u32` range.
pub(crate) fn ordinal(row: &mut MetadataRow, name: &str) -> u32 {
    u32::try_from(row.int(name, 0).max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::source::MemorySource;

    #[test]
    fn test_first_string_prefers_primary_and_consumes_both() {
        let mut row = MetadataRow::new()
            .with("TABLE_CAT", "C")
            .with("TABLE_CATALOG", serde_json::Value::Null)
            .with("EXTRA", 1);

        assert_eq!(
            first_string(&mut row, &["TABLE_CATALOG", "TABLE_CAT"]).as_deref(),
            Some("C")
        );
        let attributes = row.attributes();
        assert_eq!(attributes.len(), 1);
        assert!(attributes.contains_key("EXTRA"));
    }

    #[test]
    fn test_row_key_display_skips_absent_parts() {
        let key = RowKey {
            catalog: None,
            schema: Some("S".to_string()),
            table: Some("T".to_string()),
        };
        assert_eq!(key.display(None), "S.T");
        assert_eq!(key.display(Some("ID")), "S.T.ID");
    }

    #[tokio::test]
    async fn test_run_facet_without_template_does_not_query() {
        let mut source = MemorySource::new();
        let mut sink = RecordingSink::new();
        let outcome = run_facet(
            Facet::Views,
            &QueryTemplates::new(),
            &mut source,
            &mut sink,
            |_| Ok(()),
        )
        .await;

        assert_eq!(outcome, FacetOutcome::NotConfigured);
        assert_eq!(source.total_invocations(), 0);
        assert_eq!(
            sink.events(),
            &[CrawlEvent::CapabilityAbsent {
                facet: Facet::Views
            }]
        );
    }

    #[tokio::test]
    async fn test_run_facet_keeps_progress_on_failure() {
        let queries = QueryTemplates::new().with_query(Facet::Indexes, "Q");
        let mut source = MemorySource::new().with_failure_after(
            "Q",
            vec![MetadataRow::new(), MetadataRow::new()],
            "cursor lost",
        );
        let mut sink = RecordingSink::new();
        let mut applied = 0;

        let outcome = run_facet(Facet::Indexes, &queries, &mut source, &mut sink, |_| {
            applied += 1;
            Ok(())
        })
        .await;

        assert_eq!(applied, 2);
        assert!(outcome.is_failed());
        assert_eq!(outcome.stats().rows_applied, 2);
        assert!(matches!(
            sink.events().last(),
            Some(CrawlEvent::QueryFailed { error, .. }) if error.contains("cursor lost")
        ));
    }
}
