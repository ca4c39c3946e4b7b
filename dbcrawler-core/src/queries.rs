//! Query template registry.
//!
//! Each metadata facet is backed by one optional SQL statement, usually a
//! SELECT over a vendor's INFORMATION_SCHEMA views. A facet without a
//! template is simply not supported by the target database, and the
//! matching retriever returns without issuing any query.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One category of extended metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    /// Vendor attributes for tables
    AdditionalTableAttributes,
    /// Vendor attributes for columns
    AdditionalColumnAttributes,
    /// Long-form table definitions
    TableDefinitions,
    /// View definitions, check options and updatability
    Views,
    /// Index definitions
    Indexes,
    /// Trigger definitions
    Triggers,
    /// Table constraints (phase 1 of constraint assembly)
    TableConstraints,
    /// Table constraint columns (phase 2)
    TableConstraintColumns,
    /// Table constraint definitions such as check clauses (phase 3)
    TableConstraintDefinitions,
    /// Table-level privileges
    TablePrivileges,
    /// Column-level privileges
    ColumnPrivileges,
}

impl Facet {
    /// Every facet, in declaration order.
    pub const ALL: [Facet; 11] = [
        Facet::AdditionalTableAttributes,
        Facet::AdditionalColumnAttributes,
        Facet::TableDefinitions,
        Facet::Views,
        Facet::Indexes,
        Facet::Triggers,
        Facet::TableConstraints,
        Facet::TableConstraintColumns,
        Facet::TableConstraintDefinitions,
        Facet::TablePrivileges,
        Facet::ColumnPrivileges,
    ];

    /// Stable snake_case name, as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Facet::AdditionalTableAttributes => "additional_table_attributes",
            Facet::AdditionalColumnAttributes => "additional_column_attributes",
            Facet::TableDefinitions => "table_definitions",
            Facet::Views => "views",
            Facet::Indexes => "indexes",
            Facet::Triggers => "triggers",
            Facet::TableConstraints => "table_constraints",
            Facet::TableConstraintColumns => "table_constraint_columns",
            Facet::TableConstraintDefinitions => "table_constraint_definitions",
            Facet::TablePrivileges => "table_privileges",
            Facet::ColumnPrivileges => "column_privileges",
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named, presence-flagged SQL text per facet.
///
/// # Example
/// ```rust
/// use dbcrawler_core::queries::{Facet, QueryTemplates};
///
/// let templates = QueryTemplates::new()
///     .with_query(Facet::Views, "SELECT * FROM INFORMATION_SCHEMA.VIEWS");
///
/// assert!(templates.has(Facet::Views));
/// assert!(!templates.has(Facet::Triggers));
/// assert_eq!(templates.sql(Facet::Triggers), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryTemplates {
    queries: BTreeMap<Facet, String>,
}

impl QueryTemplates {
    /// Creates an empty registry; every facet is absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers SQL text for a facet, replacing any earlier text.
    pub fn with_query(mut self, facet: Facet, sql: impl Into<String>) -> Self {
        self.set(facet, sql);
        self
    }

    /// Registers SQL text for a facet in place.
    pub fn set(&mut self, facet: Facet, sql: impl Into<String>) {
        self.queries.insert(facet, sql.into());
    }

    /// Whether a non-blank template is configured for the facet.
    pub fn has(&self, facet: Facet) -> bool {
        self.sql(facet).is_some()
    }

    /// The configured SQL text, if any. Blank text counts as absent.
    pub fn sql(&self, facet: Facet) -> Option<&str> {
        self.queries
            .get(&facet)
            .map(String::as_str)
            .filter(|sql| !sql.trim().is_empty())
    }

    /// Facets with a usable template, in declaration order.
    pub fn configured(&self) -> Vec<Facet> {
        Facet::ALL
            .into_iter()
            .filter(|facet| self.has(*facet))
            .collect()
    }

    /// Loads templates from a JSON object keyed by facet name.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid JSON, or
    /// if it names an unknown facet.
    pub fn from_json_file(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::error::CrawlError::io(format!("Failed to read {}", path.display()), e)
        })?;
        serde_json::from_str(&text).map_err(|e| {
            crate::error::CrawlError::serialization(
                format!("Invalid query templates in {}", path.display()),
                e,
            )
        })
    }
}
