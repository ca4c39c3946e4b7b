//! The catalog graph and its identity resolver.
//!
//! Tables live in an arena addressed by [`TableId`] with a composite-key
//! index `(catalog, schema, table)`. Every name passed in is normalized
//! with the catalog's [`IdentifierRules`] before it is stored or looked up,
//! so lookups are insensitive to padding and redundant quoting.

use crate::error::CrawlError;
use crate::identifiers::IdentifierRules;
use crate::models::{
    Column, ColumnId, ConstraintId, Index, SchemaRef, Table, TableConstraint, TableId, TableKind,
    ViewDetails,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type TableKey = (SchemaRef, String);

/// Serialized shape of a [`Catalog`].
#[derive(Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    identifiers: IdentifierRules,
    tables: Vec<Table>,
}

/// Mutable object model enriched by a crawl session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogData", into = "CatalogData")]
pub struct Catalog {
    identifiers: IdentifierRules,
    tables: Vec<Table>,
    table_slots: HashMap<TableKey, TableId>,
}

impl From<CatalogData> for Catalog {
    fn from(data: CatalogData) -> Self {
        let mut catalog = Self {
            identifiers: data.identifiers,
            tables: data.tables,
            table_slots: HashMap::new(),
        };
        catalog.reindex();
        catalog
    }
}

impl From<Catalog> for CatalogData {
    fn from(catalog: Catalog) -> Self {
        Self {
            identifiers: catalog.identifiers,
            tables: catalog.tables,
        }
    }
}

impl Catalog {
    /// Creates an empty catalog using the given naming rules.
    pub fn new(identifiers: IdentifierRules) -> Self {
        Self {
            identifiers,
            tables: Vec::new(),
            table_slots: HashMap::new(),
        }
    }

    /// Naming rules used for every key.
    pub fn identifiers(&self) -> &IdentifierRules {
        &self.identifiers
    }

    /// Rebuilds the table key index from the arena.
    pub fn reindex(&mut self) {
        self.table_slots = self
            .tables
            .iter()
            .enumerate()
            .map(|(slot, table)| ((table.schema.clone(), table.name.clone()), TableId(slot)))
            .collect();
    }

    /// Normalizes a raw `(catalog, schema)` pair.
    pub fn schema_ref(&self, catalog: Option<&str>, schema: Option<&str>) -> SchemaRef {
        SchemaRef::new(
            self.identifiers.normalize_opt(catalog),
            self.identifiers.normalize_opt(schema),
        )
    }

    // Base pass ---------------------------------------------------------

    /// Registers a base table.
    ///
    /// # Errors
    /// Returns error if the name is blank or the table already exists.
    pub fn add_table(
        &mut self,
        catalog: Option<&str>,
        schema: Option<&str>,
        name: &str,
    ) -> Result<TableId> {
        self.insert_table(catalog, schema, name, TableKind::Table)
    }

    /// Registers a view.
    ///
    /// # Errors
    /// Returns error if the name is blank or the table already exists.
    pub fn add_view(
        &mut self,
        catalog: Option<&str>,
        schema: Option<&str>,
        name: &str,
    ) -> Result<TableId> {
        self.insert_table(catalog, schema, name, TableKind::View(ViewDetails::default()))
    }

    fn insert_table(
        &mut self,
        catalog: Option<&str>,
        schema: Option<&str>,
        name: &str,
        kind: TableKind,
    ) -> Result<TableId> {
        let schema = self.schema_ref(catalog, schema);
        let name = self
            .identifiers
            .normalize(name)
            .ok_or_else(|| CrawlError::configuration("Table name must not be blank"))?;

        let key = (schema.clone(), name.clone());
        if self.table_slots.contains_key(&key) {
            let table = Table::new(schema, name, kind);
            return Err(CrawlError::duplicate("table", table.full_name()));
        }

        let id = TableId(self.tables.len());
        self.tables.push(Table::new(schema, name, kind));
        self.table_slots.insert(key, id);
        Ok(id)
    }

    /// Registers a column on a table.
    ///
    /// # Errors
    /// Returns error if the table is unknown, the name is blank, or the
    /// column already exists.
    pub fn add_column(
        &mut self,
        table: TableId,
        name: &str,
        ordinal_position: u32,
    ) -> Result<ColumnId> {
        let name = self
            .identifiers
            .normalize(name)
            .ok_or_else(|| CrawlError::configuration("Column name must not be blank"))?;
        let owner = self.table_mut_or_err(table)?;
        let full_name = format!("{}.{}", owner.full_name(), name);
        owner
            .columns
            .insert(Column::new(name, ordinal_position))
            .map(|slot| ColumnId { table, slot })
            .map_err(|_| CrawlError::duplicate("column", full_name))
    }

    /// Registers an index on a table, returning its slot.
    ///
    /// # Errors
    /// Returns error if the table is unknown, the name is blank, or the
    /// index already exists.
    pub fn add_index(&mut self, table: TableId, index: Index) -> Result<usize> {
        let name = self
            .identifiers
            .normalize(&index.name)
            .ok_or_else(|| CrawlError::configuration("Index name must not be blank"))?;
        let owner = self.table_mut_or_err(table)?;
        let full_name = format!("{}.{}", owner.full_name(), name);
        owner
            .indexes
            .insert(Index { name, ..index })
            .map_err(|_| CrawlError::duplicate("index", full_name))
    }

    fn table_mut_or_err(&mut self, id: TableId) -> Result<&mut Table> {
        self.tables
            .get_mut(id.0)
            .ok_or_else(|| CrawlError::configuration(format!("Unknown table id {}", id.0)))
    }

    // Lookups -----------------------------------------------------------

    /// Finds a table by raw names; `None` when it does not exist.
    pub fn find_table(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        name: &str,
    ) -> Option<TableId> {
        let schema = self.schema_ref(catalog, schema);
        let name = self.identifiers.normalize(name)?;
        self.lookup_table(&schema, &name)
    }

    /// Finds a table by already-canonical names.
    pub fn lookup_table(&self, schema: &SchemaRef, name: &str) -> Option<TableId> {
        self.table_slots
            .get(&(schema.clone(), name.to_string()))
            .copied()
    }

    /// Finds a column by raw name under a table.
    pub fn find_column(&self, table: TableId, name: &str) -> Option<ColumnId> {
        let name = self.identifiers.normalize(name)?;
        let slot = self.table(table)?.columns.slot(&name)?;
        Some(ColumnId { table, slot })
    }

    /// Finds an index slot by raw name under a table.
    pub fn find_index(&self, table: TableId, name: &str) -> Option<usize> {
        let name = self.identifiers.normalize(name)?;
        self.table(table)?.indexes.slot(&name)
    }

    /// Table by handle.
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.0)
    }

    /// Mutable table by handle.
    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(id.0)
    }

    /// Column by handle.
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.table(id.table)?.columns.at(id.slot)
    }

    /// Mutable column by handle.
    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.table_mut(id.table)?.columns.at_mut(id.slot)
    }

    /// Constraint by handle.
    pub fn constraint(&self, id: ConstraintId) -> Option<&TableConstraint> {
        self.table(id.table)?.constraints.at(id.slot)
    }

    /// Mutable constraint by handle.
    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut TableConstraint> {
        self.table_mut(id.table)?.constraints.at_mut(id.slot)
    }

    /// All tables and views, in registration order.
    pub fn tables(&self) -> impl Iterator<Item = (TableId, &Table)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(slot, table)| (TableId(slot), table))
    }

    /// Number of tables and views.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Tables plus everything they own, for summaries.
    pub fn object_count(&self) -> usize {
        self.tables.iter().fold(self.tables.len(), |total, t| {
            [
                t.columns.len(),
                t.indexes.len(),
                t.triggers.len(),
                t.constraints.len(),
                t.privileges.len(),
            ]
            .into_iter()
            .fold(total, usize::saturating_add)
        })
    }
}
