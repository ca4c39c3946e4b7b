//! Base catalog skeletons.
//!
//! The enrichment engine only adds to tables, columns and indexes that
//! already exist. A skeleton is a JSON description of that base layer:
//!
//! ```json
//! {
//!   "schemas": [{
//!     "catalog": "shop",
//!     "schema": "public",
//!     "tables": [{
//!       "name": "orders",
//!       "columns": [{ "name": "id", "data_type": "integer" }],
//!       "indexes": [{ "name": "orders_pkey", "unique": true, "columns": ["id"] }]
//!     }, {
//!       "name": "open_orders",
//!       "view": true
//!     }]
//!   }]
//! }
//! ```

use crate::Result;
use crate::catalog::Catalog;
use crate::error::CrawlError;
use crate::identifiers::IdentifierRules;
use crate::models::Index;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schemas, tables, columns and indexes known before enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSkeleton {
    /// Schemas to register
    #[serde(default)]
    pub schemas: Vec<SchemaSkeleton>,
}

/// One catalog/schema pair and its tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSkeleton {
    /// Catalog name, if the database has catalogs
    #[serde(default)]
    pub catalog: Option<String>,
    /// Schema name, if the database has schemas
    #[serde(default)]
    pub schema: Option<String>,
    /// Tables and views in this schema
    #[serde(default)]
    pub tables: Vec<TableSkeleton>,
}

/// A table or view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSkeleton {
    /// Table or view name
    pub name: String,
    /// Registers a view instead of a base table
    #[serde(default)]
    pub view: bool,
    /// Columns in ordinal order, starting at 1
    #[serde(default)]
    pub columns: Vec<ColumnSkeleton>,
    /// Indexes on the table
    #[serde(default)]
    pub indexes: Vec<IndexSkeleton>,
}

/// A column; its ordinal comes from its position in the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSkeleton {
    /// Column name
    pub name: String,
    /// Reported type name
    #[serde(default)]
    pub data_type: Option<String>,
}

/// An index and the columns it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSkeleton {
    /// Index name
    pub name: String,
    /// Whether the index is unique
    #[serde(default)]
    pub unique: bool,
    /// Indexed column names in key order
    #[serde(default)]
    pub columns: Vec<String>,
}

impl CatalogSkeleton {
    /// Loads a skeleton from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not a valid skeleton.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CrawlError::io(format!("Failed to read {}", path.display()), e))?;
        serde_json::from_str(&text).map_err(|e| {
            CrawlError::serialization(format!("Invalid catalog skeleton in {}", path.display()), e)
        })
    }

    /// Builds the base catalog, normalizing every name with `rules`.
    ///
    /// # Errors
    /// Returns error on blank names or on a table, column or index declared
    /// twice after normalization.
    pub fn into_catalog(self, rules: IdentifierRules) -> Result<Catalog> {
        let mut catalog = Catalog::new(rules);
        for schema in self.schemas {
            let catalog_name = schema.catalog.as_deref();
            let schema_name = schema.schema.as_deref();
            for table in schema.tables {
                let id = if table.view {
                    catalog.add_view(catalog_name, schema_name, &table.name)?
                } else {
                    catalog.add_table(catalog_name, schema_name, &table.name)?
                };

                for (ordinal_position, column) in (1u32..).zip(table.columns) {
                    let ColumnSkeleton { name, data_type } = column;
                    let column_id = catalog.add_column(id, &name, ordinal_position)?;
                    if let Some(entry) = catalog.column_mut(column_id) {
                        entry.data_type = data_type;
                    }
                }

                for index in table.indexes {
                    catalog.add_index(
                        id,
                        Index {
                            unique: index.unique,
                            columns: index.columns,
                            ..Index::new(index.name)
                        },
                    )?;
                }
            }
        }

        tracing::debug!(
            "Loaded catalog skeleton with {} tables",
            catalog.table_count()
        );
        Ok(catalog)
    }
}
