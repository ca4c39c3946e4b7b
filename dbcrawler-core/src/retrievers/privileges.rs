//! Table and column privilege retrievers.
//!
//! Both facets share one loop, generic over the [`PrivilegeOwner`] the
//! grants attach to. JDBC-style result sets name the key columns
//! `TABLE_CAT` / `TABLE_SCHEM` / `PRIVILEGE`, INFORMATION_SCHEMA uses
//! `TABLE_CATALOG` / `TABLE_SCHEMA` / `PRIVILEGE_TYPE`; either is accepted.

use super::{
    FacetOutcome, KeyColumns, RowKey, RowRejection, RowResult, first_string, resolve_table,
    run_facet,
};
use crate::catalog::Catalog;
use crate::diagnostics::DiagnosticSink;
use crate::models::{Column, ColumnId, Grant, Privileged, Table, TableId};
use crate::queries::{Facet, QueryTemplates};
use crate::source::{MetadataRow, MetadataSource};

const PRIVILEGE_KEY: KeyColumns = KeyColumns {
    catalog: &["TABLE_CATALOG", "TABLE_CAT"],
    schema: &["TABLE_SCHEMA", "TABLE_SCHEM"],
    table: &["TABLE_NAME"],
};

const PRIVILEGE_NAME_COLUMNS: &[&str] = &["PRIVILEGE_TYPE", "PRIVILEGE"];

/// A catalog entity grants can be recorded on.
pub(crate) trait PrivilegeOwner: Privileged {
    /// Facet whose rows target this owner.
    const FACET: Facet;

    /// Handle used to find the owner again after resolution.
    type Handle: Copy;

    /// Resolves the owner under an already resolved table.
    fn resolve(
        catalog: &Catalog,
        table: TableId,
        row: &mut MetadataRow,
        key: &RowKey,
    ) -> Result<Self::Handle, RowRejection>;

    /// The owner behind a handle.
    fn owner_mut(catalog: &mut Catalog, handle: Self::Handle) -> Option<&mut Self>;
}

impl PrivilegeOwner for Table {
    const FACET: Facet = Facet::TablePrivileges;
    type Handle = TableId;

    fn resolve(
        _catalog: &Catalog,
        table: TableId,
        _row: &mut MetadataRow,
        _key: &RowKey,
    ) -> Result<TableId, RowRejection> {
        Ok(table)
    }

    fn owner_mut(catalog: &mut Catalog, handle: TableId) -> Option<&mut Self> {
        catalog.table_mut(handle)
    }
}

impl PrivilegeOwner for Column {
    const FACET: Facet = Facet::ColumnPrivileges;
    type Handle = ColumnId;

    fn resolve(
        catalog: &Catalog,
        table: TableId,
        row: &mut MetadataRow,
        key: &RowKey,
    ) -> Result<ColumnId, RowRejection> {
        let column_name = row.string("COLUMN_NAME");
        column_name
            .as_deref()
            .and_then(|name| catalog.find_column(table, name))
            .ok_or_else(|| RowRejection::not_found("column", key.display(column_name.as_deref())))
    }

    fn owner_mut(catalog: &mut Catalog, handle: ColumnId) -> Option<&mut Self> {
        catalog.column_mut(handle)
    }
}

/// Records table-level grants.
pub async fn retrieve_table_privileges(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    retrieve_privileges::<Table>(catalog, queries, source, sink).await
}

/// Records column-level grants.
pub async fn retrieve_column_privileges(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    retrieve_privileges::<Column>(catalog, queries, source, sink).await
}

/// Find-or-creates one privilege per owner and name, and adds each row's
/// grant to it. An identical grant seen twice is kept once.
pub(crate) async fn retrieve_privileges<O: PrivilegeOwner>(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(O::FACET, queries, source, sink, |mut row| {
        apply_grant::<O>(catalog, &mut row)
    })
    .await
}

fn apply_grant<O: PrivilegeOwner>(catalog: &mut Catalog, row: &mut MetadataRow) -> RowResult {
    let key = RowKey::read(row, &PRIVILEGE_KEY);
    let table = resolve_table(catalog, &key)?;
    let handle = O::resolve(catalog, table, row, &key)?;

    let Some(privilege_name) = first_string(row, PRIVILEGE_NAME_COLUMNS) else {
        return Err(RowRejection::Skipped {
            name: key.display(None),
            reason: "privilege name is missing".to_string(),
        });
    };
    let grant = Grant {
        grantor: row.string("GRANTOR"),
        grantee: row.string("GRANTEE"),
        grantable: row.boolean("IS_GRANTABLE"),
    };

    O::owner_mut(catalog, handle)
        .ok_or_else(|| RowRejection::not_found(O::OWNER_KIND, key.display(None)))?
        .grant(&privilege_name, grant);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::source::MemorySource;

    fn grant_row(privilege: &str, grantor: &str, grantee: &str) -> MetadataRow {
        MetadataRow::new()
            .with("TABLE_CAT", serde_json::Value::Null)
            .with("TABLE_SCHEM", "S")
            .with("TABLE_NAME", "T")
            .with("PRIVILEGE", privilege)
            .with("GRANTOR", grantor)
            .with("GRANTEE", grantee)
            .with("IS_GRANTABLE", "NO")
    }

    fn sample() -> (Catalog, TableId, ColumnId) {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(None, Some("S"), "T").unwrap();
        let column = catalog.add_column(table, "ID", 1).unwrap();
        (catalog, table, column)
    }

    #[tokio::test]
    async fn test_grants_accumulate_on_one_privilege() {
        let (mut catalog, table, _) = sample();
        let queries = QueryTemplates::new().with_query(Facet::TablePrivileges, "Q");
        let mut source = MemorySource::new().with_rows(
            "Q",
            vec![
                grant_row("SELECT", "A", "X"),
                grant_row("SELECT", "B", "Y"),
                grant_row("INSERT", "A", "X"),
            ],
        );
        let mut sink = RecordingSink::new();

        retrieve_table_privileges(&mut catalog, &queries, &mut source, &mut sink).await;

        let privileges = catalog.table(table).unwrap().privileges();
        assert_eq!(privileges.len(), 2);
        let select = privileges.get("SELECT").unwrap();
        assert_eq!(select.grants.len(), 2);
        assert!(select.grants.contains(&Grant {
            grantor: Some("B".to_string()),
            grantee: Some("Y".to_string()),
            grantable: false,
        }));
    }

    #[tokio::test]
    async fn test_column_privileges_require_the_column() {
        let (mut catalog, table, column) = sample();
        let queries = QueryTemplates::new().with_query(Facet::ColumnPrivileges, "Q");
        let mut source = MemorySource::new().with_rows(
            "Q",
            vec![
                grant_row("UPDATE", "A", "X").with("COLUMN_NAME", "ID"),
                grant_row("UPDATE", "A", "X").with("COLUMN_NAME", "MISSING"),
            ],
        );
        let mut sink = RecordingSink::new();

        let outcome =
            retrieve_column_privileges(&mut catalog, &queries, &mut source, &mut sink).await;

        let column = catalog.column(column).unwrap();
        assert_eq!(column.privileges().get("UPDATE").map(|p| p.grants.len()), Some(1));
        assert!(catalog.table(table).unwrap().privileges().is_empty());
        assert_eq!(outcome.stats().rows_skipped, 1);
        assert_eq!(sink.not_found(Facet::ColumnPrivileges), 1);
    }

    #[tokio::test]
    async fn test_information_schema_column_names_are_accepted() {
        let (mut catalog, table, _) = sample();
        let queries = QueryTemplates::new().with_query(Facet::TablePrivileges, "Q");
        let mut source = MemorySource::new().with_rows(
            "Q",
            vec![MetadataRow::new()
                .with("TABLE_CATALOG", serde_json::Value::Null)
                .with("TABLE_SCHEMA", "S")
                .with("TABLE_NAME", "T")
                .with("PRIVILEGE_TYPE", "DELETE")
                .with("GRANTOR", "postgres")
                .with("GRANTEE", "app")
                .with("IS_GRANTABLE", "YES")],
        );
        let mut sink = RecordingSink::new();

        retrieve_table_privileges(&mut catalog, &queries, &mut source, &mut sink).await;

        let privilege = catalog.table(table).unwrap().privileges().get("DELETE").cloned().unwrap();
        assert!(privilege.grants.iter().all(|grant| grant.grantable));
    }
}
