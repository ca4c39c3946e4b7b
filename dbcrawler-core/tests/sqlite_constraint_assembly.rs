//! Constraint assembly against metadata tables in an in-memory SQLite
//! database.
#![cfg(feature = "sqlite")]

use dbcrawler_core::{
    Catalog, CrawlConfig, CrawlSession, Facet, FacetStatus, QueryTemplates, RecordingSink,
    SqliteSource, TableConstraintType,
};
use sqlx::{Connection, SqliteConnection};

const METADATA_DDL: &[&str] = &[
    "CREATE TABLE constraint_listing (
        constraint_catalog TEXT, constraint_schema TEXT, constraint_name TEXT,
        table_name TEXT, constraint_type TEXT)",
    "CREATE TABLE constraint_columns (
        constraint_catalog TEXT, constraint_schema TEXT, constraint_name TEXT,
        table_name TEXT, column_name TEXT, ordinal_position INTEGER)",
    "CREATE TABLE constraint_definitions (
        constraint_catalog TEXT, constraint_schema TEXT, constraint_name TEXT,
        check_clause TEXT)",
    "INSERT INTO constraint_listing VALUES ('C', 'S', 'PK_X', 'T', 'PRIMARY KEY')",
    "INSERT INTO constraint_columns VALUES ('C', 'S', 'PK_X', 'T', 'ID', 1)",
];

fn templates() -> QueryTemplates {
    QueryTemplates::new()
        .with_query(
            Facet::TableConstraints,
            "SELECT constraint_catalog AS CONSTRAINT_CATALOG, constraint_schema AS CONSTRAINT_SCHEMA,
                    constraint_name AS CONSTRAINT_NAME, table_name AS TABLE_NAME,
                    constraint_type AS CONSTRAINT_TYPE
             FROM constraint_listing",
        )
        .with_query(
            Facet::TableConstraintColumns,
            "SELECT constraint_catalog AS CONSTRAINT_CATALOG, constraint_schema AS CONSTRAINT_SCHEMA,
                    constraint_name AS CONSTRAINT_NAME, table_name AS TABLE_NAME,
                    column_name AS COLUMN_NAME, ordinal_position AS ORDINAL_POSITION
             FROM constraint_columns
             ORDER BY ordinal_position",
        )
        .with_query(
            Facet::TableConstraintDefinitions,
            "SELECT constraint_catalog AS CONSTRAINT_CATALOG, constraint_schema AS CONSTRAINT_SCHEMA,
                    constraint_name AS CONSTRAINT_NAME, check_clause AS CHECK_CLAUSE
             FROM constraint_definitions",
        )
}

async fn metadata_source() -> SqliteSource {
    let connection = SqliteConnection::connect("sqlite::memory:").await.unwrap();
    let mut source = SqliteSource::from_connection(connection);
    for statement in METADATA_DDL {
        sqlx::query(statement)
            .execute(source.connection_mut())
            .await
            .unwrap();
    }
    source
}

fn base_catalog() -> Catalog {
    let mut catalog = Catalog::default();
    let table = catalog.add_table(Some("C"), Some("S"), "T").unwrap();
    catalog.add_column(table, "ID", 1).unwrap();
    catalog.add_column(table, "NAME", 2).unwrap();
    catalog
}

#[tokio::test]
async fn test_sqlite_primary_key_is_assembled() {
    let mut source = metadata_source().await;
    let config = CrawlConfig::new().with_queries(templates());
    let session = CrawlSession::new(base_catalog(), config).unwrap();
    let mut sink = RecordingSink::new();

    let (catalog, report) = session.run(&mut source, &mut sink).await;

    let table = catalog.find_table(Some("C"), Some("S"), "T").unwrap();
    let table = catalog.table(table).unwrap();
    assert_eq!(table.constraints.len(), 1);

    let constraint = table.constraint("PK_X").unwrap();
    assert_eq!(constraint.constraint_type, TableConstraintType::PrimaryKey);
    assert_eq!(constraint.columns.len(), 1);
    assert_eq!(constraint.columns[0].column_name, "ID");
    assert_eq!(constraint.columns[0].ordinal_position, 1);
    assert_eq!(constraint.definition, None);
    assert!(!constraint.deferrable);

    for facet in [
        Facet::TableConstraints,
        Facet::TableConstraintColumns,
        Facet::TableConstraintDefinitions,
    ] {
        assert_eq!(report.status(facet), Some(&FacetStatus::Completed));
    }
}

#[tokio::test]
async fn test_sqlite_missing_metadata_table_is_isolated() {
    let mut source = metadata_source().await;
    let queries = templates().with_query(Facet::Views, "SELECT * FROM missing_views");
    let config = CrawlConfig::new().with_queries(queries);
    let session = CrawlSession::new(base_catalog(), config).unwrap();
    let mut sink = RecordingSink::new();

    let (catalog, report) = session.run(&mut source, &mut sink).await;

    assert_eq!(report.failed_facets(), vec![Facet::Views]);
    assert_eq!(report.warnings.len(), 1);
    let table = catalog.find_table(Some("C"), Some("S"), "T").unwrap();
    assert!(catalog.table(table).unwrap().constraint("PK_X").is_some());
}
