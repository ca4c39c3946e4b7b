//! View retriever.

use super::{FacetOutcome, RowKey, RowRejection, TABLE_KEY, resolve_table, run_facet, table_mut};
use crate::attributes::{Attributed, Defined};
use crate::catalog::Catalog;
use crate::diagnostics::DiagnosticSink;
use crate::models::CheckOptionType;
use crate::queries::{Facet, QueryTemplates};
use crate::source::MetadataSource;

/// Sets view definition text, check option and updatability.
///
/// A row naming a base table instead of a view is skipped.
pub async fn retrieve_views(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(Facet::Views, queries, source, sink, |mut row| {
        let key = RowKey::read(&mut row, &TABLE_KEY);
        let id = resolve_table(catalog, &key)?;

        let definition = row.text("VIEW_DEFINITION");
        let check_option = row.enumeration("CHECK_OPTION", CheckOptionType::Unknown);
        let updatable = row.boolean("IS_UPDATABLE");
        let attributes = row.attributes();

        let view = table_mut(catalog, id, &key)?;
        let Some(details) = view.view_mut() else {
            return Err(RowRejection::Skipped {
                name: key.display(None),
                reason: "not a view".to_string(),
            });
        };
        details.check_option = check_option;
        details.updatable = updatable;
        view.append_definition(definition.as_deref());
        view.merge_attributes(attributes);
        Ok(())
    })
    .await
}
