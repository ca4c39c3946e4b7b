//! Index definition retriever.

use super::{FacetOutcome, KeyColumns, RowKey, RowRejection, resolve_table, run_facet, table_mut};
use crate::attributes::{Attributed, Defined};
use crate::catalog::Catalog;
use crate::diagnostics::DiagnosticSink;
use crate::queries::{Facet, QueryTemplates};
use crate::source::MetadataSource;

const INDEX_KEY: KeyColumns = KeyColumns {
    catalog: &["INDEX_CATALOG"],
    schema: &["INDEX_SCHEMA"],
    table: &["TABLE_NAME"],
};

/// Appends `INDEX_DEFINITION` text and merges attributes into existing
/// indexes.
pub async fn retrieve_indexes(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(Facet::Indexes, queries, source, sink, |mut row| {
        let key = RowKey::read(&mut row, &INDEX_KEY);
        let index_name = row.string("INDEX_NAME");
        let table = resolve_table(catalog, &key)?;

        let not_found = || RowRejection::not_found("index", key.display(index_name.as_deref()));
        let slot = index_name
            .as_deref()
            .and_then(|name| catalog.find_index(table, name))
            .ok_or_else(not_found)?;

        let definition = row.text("INDEX_DEFINITION");
        let attributes = row.attributes();
        let index = table_mut(catalog, table, &key)?
            .indexes
            .at_mut(slot)
            .ok_or_else(not_found)?;
        index.append_definition(definition.as_deref());
        index.merge_attributes(attributes);
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Index;
    use crate::source::{MemorySource, MetadataRow};
    use crate::diagnostics::RecordingSink;

    fn index_row(index: &str, fragment: &str) -> MetadataRow {
        MetadataRow::new()
            .with("INDEX_CATALOG", "C")
            .with("INDEX_SCHEMA", "S")
            .with("TABLE_NAME", "T")
            .with("INDEX_NAME", index)
            .with("INDEX_DEFINITION", fragment)
    }

    #[tokio::test]
    async fn test_index_definitions_accumulate_in_row_order() {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(Some("C"), Some("S"), "T").unwrap();
        catalog.add_index(table, Index::new("IDX_T")).unwrap();
        let queries = QueryTemplates::new().with_query(Facet::Indexes, "Q");
        let mut source = MemorySource::new().with_rows(
            "Q",
            vec![
                index_row("IDX_T", "A"),
                index_row("IDX_T", "B"),
                index_row("IDX_UNKNOWN", "X"),
                index_row("IDX_T", "C"),
            ],
        );
        let mut sink = RecordingSink::new();

        let outcome = retrieve_indexes(&mut catalog, &queries, &mut source, &mut sink).await;

        let index = catalog.table(table).and_then(|t| t.index("IDX_T")).unwrap();
        assert_eq!(index.definition(), Some("ABC"));
        assert_eq!(catalog.table(table).map(|t| t.indexes.len()), Some(1));
        assert_eq!(outcome.stats().rows_applied, 3);
        assert_eq!(sink.not_found(Facet::Indexes), 1);
    }
}
