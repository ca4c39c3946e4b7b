//! Three-phase table constraint assembly.
//!
//! 1. [`create_table_constraints`] find-or-creates constraints on existing
//!    tables and records each one in a [`ConstraintLookup`].
//! 2. [`attach_constraint_columns`] appends ordered constraint columns.
//! 3. [`attach_constraint_definitions`] appends long-form definition text
//!    such as check clauses.
//!
//! Phases 2 and 3 link rows through the lookup only, never through the
//! database, and run only when phase 1 recorded at least one constraint.
//! A row whose key drifts from the phase 1 key is dropped, and so is a
//! column row naming a table other than the constraint's owner.

use super::{
    FacetOutcome, KeyColumns, RowKey, RowRejection, ordinal, resolve_table, run_facet, table_mut,
};
use crate::attributes::{Attributed, Defined};
use crate::catalog::Catalog;
use crate::diagnostics::DiagnosticSink;
use crate::models::{ConstraintId, SchemaRef, TableConstraintColumn, TableConstraintType};
use crate::queries::{Facet, QueryTemplates};
use crate::source::{MetadataRow, MetadataSource};
use serde::Serialize;
use std::collections::HashMap;

const CONSTRAINT_KEY: KeyColumns = KeyColumns {
    catalog: &["CONSTRAINT_CATALOG"],
    schema: &["CONSTRAINT_SCHEMA"],
    table: &["TABLE_NAME"],
};

/// Lookup key shared by all three phases.
pub fn constraint_key(schema: &SchemaRef, constraint_name: &str) -> String {
    format!("{}.{}", schema.full_name(), constraint_name)
}

/// Constraints created by phase 1, keyed by [`constraint_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintLookup {
    entries: HashMap<String, ConstraintId>,
}

impl ConstraintLookup {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a constraint under its key.
    pub fn insert(&mut self, key: String, id: ConstraintId) {
        self.entries.insert(key, id);
    }

    /// Constraint recorded under `key`.
    pub fn get(&self, key: &str) -> Option<ConstraintId> {
        self.entries.get(key).copied()
    }

    /// Number of recorded constraints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether phase 1 recorded nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of all three phases. Phases 2 and 3 are `None` when phase 1
/// left the lookup empty and they were never started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintOutcome {
    /// Phase 1
    pub constraints: FacetOutcome,
    /// Phase 2
    pub columns: Option<FacetOutcome>,
    /// Phase 3
    pub definitions: Option<FacetOutcome>,
}

/// Runs the full constraint protocol.
pub async fn retrieve_table_constraints(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> ConstraintOutcome {
    let (constraints, lookup) = create_table_constraints(catalog, queries, source, sink).await;
    if lookup.is_empty() {
        tracing::debug!("No table constraints recorded; skipping constraint columns and definitions");
        return ConstraintOutcome {
            constraints,
            columns: None,
            definitions: None,
        };
    }

    let columns = attach_constraint_columns(catalog, &lookup, queries, source, sink).await;
    let definitions = attach_constraint_definitions(catalog, &lookup, queries, source, sink).await;
    ConstraintOutcome {
        constraints,
        columns: Some(columns),
        definitions: Some(definitions),
    }
}

/// Phase 1: find-or-creates constraints on existing tables.
///
/// The lookup key uses the owning table's schema, so phases 2 and 3 must
/// report the constraint under the same catalog and schema.
pub async fn create_table_constraints(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> (FacetOutcome, ConstraintLookup) {
    let mut lookup = ConstraintLookup::new();
    let outcome = run_facet(Facet::TableConstraints, queries, source, sink, |mut row| {
        let key = RowKey::read(&mut row, &CONSTRAINT_KEY);
        let name = constraint_name(catalog, &mut row, &key)?;
        let table = resolve_table(catalog, &key)?;

        let constraint_type = row.enumeration("CONSTRAINT_TYPE", TableConstraintType::Unknown);
        let deferrable = row.boolean("IS_DEFERRABLE");
        let initially_deferred = row.boolean("INITIALLY_DEFERRED");
        let attributes = row.attributes();

        let owner = table_mut(catalog, table, &key)?;
        let slot = owner.find_or_create_constraint(&name);
        let lookup_key = constraint_key(&owner.schema, &name);
        let constraint = owner
            .constraints
            .at_mut(slot)
            .ok_or_else(|| RowRejection::not_found("constraint", lookup_key.clone()))?;
        constraint.constraint_type = constraint_type;
        constraint.deferrable = deferrable;
        constraint.initially_deferred = initially_deferred;
        constraint.merge_attributes(attributes);

        lookup.insert(lookup_key, ConstraintId { table, slot });
        Ok(())
    })
    .await;
    (outcome, lookup)
}

/// Phase 2: appends constraint columns in row order.
///
/// The row's table must own the linked constraint. Constraint names are
/// only unique per table on some databases, so a later phase 1 row can
/// take over a shared key.
pub async fn attach_constraint_columns(
    catalog: &mut Catalog,
    lookup: &ConstraintLookup,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(Facet::TableConstraintColumns, queries, source, sink, |mut row| {
        let key = RowKey::read(&mut row, &CONSTRAINT_KEY);
        let id = linked_constraint(catalog, lookup, &mut row, &key)?;
        let table = resolve_table(catalog, &key)?;
        if id.table != table {
            return Err(RowRejection::Skipped {
                name: key.display(None),
                reason: "constraint belongs to another table".to_string(),
            });
        }

        let column_name = row.string("COLUMN_NAME");
        let column = column_name
            .as_deref()
            .and_then(|name| catalog.find_column(table, name))
            .ok_or_else(|| RowRejection::not_found("column", key.display(column_name.as_deref())))?;
        let column_name = catalog
            .column(column)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let ordinal_position = ordinal(&mut row, "ORDINAL_POSITION");

        catalog
            .constraint_mut(id)
            .ok_or_else(|| RowRejection::not_found("constraint", key.display(None)))?
            .columns
            .push(TableConstraintColumn {
                column,
                column_name,
                ordinal_position,
            });
        Ok(())
    })
    .await
}

/// Phase 3: appends definition text such as `CHECK_CLAUSE` and merges
/// attributes.
pub async fn attach_constraint_definitions(
    catalog: &mut Catalog,
    lookup: &ConstraintLookup,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(
        Facet::TableConstraintDefinitions,
        queries,
        source,
        sink,
        |mut row| {
            let key = RowKey::read(&mut row, &CONSTRAINT_KEY);
            let id = linked_constraint(catalog, lookup, &mut row, &key)?;
            let definition = row.text("CHECK_CLAUSE");
            let attributes = row.attributes();

            let constraint = catalog
                .constraint_mut(id)
                .ok_or_else(|| RowRejection::not_found("constraint", key.display(None)))?;
            constraint.append_definition(definition.as_deref());
            constraint.merge_attributes(attributes);
            Ok(())
        },
    )
    .await
}

fn constraint_name(
    catalog: &Catalog,
    row: &mut MetadataRow,
    key: &RowKey,
) -> Result<String, RowRejection> {
    row.string("CONSTRAINT_NAME")
        .and_then(|name| catalog.identifiers().normalize(&name))
        .ok_or_else(|| RowRejection::Skipped {
            name: key.display(None),
            reason: "constraint name is missing".to_string(),
        })
}

/// Resolves a phase 2 or 3 row to the phase 1 constraint with the same key.
fn linked_constraint(
    catalog: &Catalog,
    lookup: &ConstraintLookup,
    row: &mut MetadataRow,
    key: &RowKey,
) -> Result<ConstraintId, RowRejection> {
    let name = constraint_name(catalog, row, key)?;
    let schema = catalog.schema_ref(key.catalog.as_deref(), key.schema.as_deref());
    let lookup_key = constraint_key(&schema, &name);
    lookup
        .get(&lookup_key)
        .ok_or_else(|| RowRejection::not_found("constraint", lookup_key))
}
