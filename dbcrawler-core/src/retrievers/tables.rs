//! Table-level attribute and definition retrievers.

use super::{FacetOutcome, TABLE_KEY, RowKey, resolve_table, run_facet, table_mut};
use crate::attributes::{Attributed, Defined};
use crate::catalog::Catalog;
use crate::diagnostics::DiagnosticSink;
use crate::queries::{Facet, QueryTemplates};
use crate::source::MetadataSource;

/// Merges vendor attributes into existing tables.
pub async fn retrieve_additional_table_attributes(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(
        Facet::AdditionalTableAttributes,
        queries,
        source,
        sink,
        |mut row| {
            let key = RowKey::read(&mut row, &TABLE_KEY);
            let id = resolve_table(catalog, &key)?;
            let attributes = row.attributes();
            table_mut(catalog, id, &key)?.merge_attributes(attributes);
            Ok(())
        },
    )
    .await
}

/// Appends long-form `TABLE_DEFINITION` text to existing tables.
pub async fn retrieve_table_definitions(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(Facet::TableDefinitions, queries, source, sink, |mut row| {
        let key = RowKey::read(&mut row, &TABLE_KEY);
        let id = resolve_table(catalog, &key)?;
        let definition = row.text("TABLE_DEFINITION");
        let attributes = row.attributes();

        let table = table_mut(catalog, id, &key)?;
        table.append_definition(definition.as_deref());
        table.merge_attributes(attributes);
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::identifiers::{IdentifierCase, IdentifierRules};
    use crate::source::{MemorySource, MetadataRow};
    use serde_json::json;

    fn table_row(schema: &str, name: &str) -> MetadataRow {
        MetadataRow::new()
            .with("TABLE_CATALOG", serde_json::Value::Null)
            .with("TABLE_SCHEMA", schema)
            .with("TABLE_NAME", name)
    }

    #[tokio::test]
    async fn test_attributes_merge_into_matching_table_only() {
        let mut catalog = Catalog::default();
        let orders = catalog.add_table(None, Some("APP"), "ORDERS").unwrap();
        let queries = QueryTemplates::new().with_query(Facet::AdditionalTableAttributes, "Q");
        let mut source = MemorySource::new().with_rows(
            "Q",
            vec![
                table_row("APP", "ORDERS").with("ENGINE", "InnoDB"),
                table_row("APP", "MISSING").with("ENGINE", "MyISAM"),
            ],
        );
        let mut sink = RecordingSink::new();

        let outcome =
            retrieve_additional_table_attributes(&mut catalog, &queries, &mut source, &mut sink)
                .await;

        let table = catalog.table(orders).unwrap();
        assert_eq!(table.attribute("ENGINE"), Some(&json!("InnoDB")));
        assert_eq!(table.attributes().len(), 1);
        assert_eq!(outcome.stats().rows_skipped, 1);
        assert_eq!(sink.not_found(Facet::AdditionalTableAttributes), 1);
    }

    #[tokio::test]
    async fn test_case_sensitive_table_receives_its_own_row() {
        let mut catalog =
            Catalog::new(IdentifierRules::default().with_case(IdentifierCase::Upper));
        let upper = catalog.add_table(None, Some("APP"), "ORDERS").unwrap();
        let mixed = catalog.add_table(None, Some("APP"), "Orders").unwrap();
        let queries = QueryTemplates::new().with_query(Facet::AdditionalTableAttributes, "Q");
        let mut source = MemorySource::new().with_rows(
            "Q",
            vec![table_row("APP", "Orders").with("REMARKS", "belongs to Orders")],
        );
        let mut sink = RecordingSink::new();

        retrieve_additional_table_attributes(&mut catalog, &queries, &mut source, &mut sink)
            .await;

        assert!(catalog.table(upper).unwrap().attributes().is_empty());
        assert_eq!(
            catalog.table(mixed).unwrap().attribute("REMARKS"),
            Some(&json!("belongs to Orders"))
        );
    }

    #[tokio::test]
    async fn test_table_definition_fragments_accumulate() {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(None, Some("APP"), "T").unwrap();
        let queries = QueryTemplates::new().with_query(Facet::TableDefinitions, "Q");
        let mut source = MemorySource::new().with_rows(
            "Q",
            vec![
                table_row("APP", "T").with("TABLE_DEFINITION", "CREATE TABLE T "),
                table_row("APP", "T").with("TABLE_DEFINITION", "(ID INT)"),
            ],
        );
        let mut sink = RecordingSink::new();

        retrieve_table_definitions(&mut catalog, &queries, &mut source, &mut sink).await;

        let table = catalog.table(table).unwrap();
        assert_eq!(table.definition(), Some("CREATE TABLE T (ID INT)"));
        assert!(table.attributes().is_empty());
    }
}
