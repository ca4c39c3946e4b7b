//! Column attribute retriever.

use super::{FacetOutcome, RowKey, RowRejection, TABLE_KEY, resolve_table, run_facet};
use crate::attributes::Attributed;
use crate::catalog::Catalog;
use crate::diagnostics::DiagnosticSink;
use crate::queries::{Facet, QueryTemplates};
use crate::source::MetadataSource;

/// Merges vendor attributes into existing columns.
pub async fn retrieve_additional_column_attributes(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(
        Facet::AdditionalColumnAttributes,
        queries,
        source,
        sink,
        |mut row| {
            let key = RowKey::read(&mut row, &TABLE_KEY);
            let column_name = row.string("COLUMN_NAME");
            let table = resolve_table(catalog, &key)?;

            let not_found = || RowRejection::not_found("column", key.display(column_name.as_deref()));
            let id = column_name
                .as_deref()
                .and_then(|name| catalog.find_column(table, name))
                .ok_or_else(not_found)?;

            let attributes = row.attributes();
            catalog
                .column_mut(id)
                .ok_or_else(not_found)?
                .merge_attributes(attributes);
            Ok(())
        },
    )
    .await
}
