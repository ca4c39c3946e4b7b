//! Crawl configuration.
//!
//! A single JSON document bundles identifier rules, per-facet switches and
//! the query template registry:
//!
//! ```json
//! {
//!   "identifiers": { "quote": "\"", "case": "upper" },
//!   "options": { "include_column_privileges": false },
//!   "queries": { "views": "SELECT * FROM INFORMATION_SCHEMA.VIEWS" }
//! }
//! ```
//!
//! Every section is optional.

use crate::Result;
use crate::error::CrawlError;
use crate::identifiers::IdentifierRules;
use crate::queries::{Facet, QueryTemplates};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which facets a crawl session runs.
///
/// A disabled facet is never queried even when a template exists for it.
/// The three constraint facets share one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentOptions {
    /// Whether to merge vendor attributes into tables
    pub include_table_attributes: bool,
    /// Whether to merge vendor attributes into columns
    pub include_column_attributes: bool,
    /// Whether to collect long-form table definitions
    pub include_table_definitions: bool,
    /// Whether to collect view definitions
    pub include_views: bool,
    /// Whether to collect index definitions
    pub include_indexes: bool,
    /// Whether to collect triggers
    pub include_triggers: bool,
    /// Whether to assemble table constraints
    pub include_constraints: bool,
    /// Whether to collect table privileges
    pub include_table_privileges: bool,
    /// Whether to collect column privileges
    pub include_column_privileges: bool,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            include_table_attributes: true,
            include_column_attributes: true,
            include_table_definitions: true,
            include_views: true,
            include_indexes: true,
            include_triggers: true,
            include_constraints: true,
            include_table_privileges: true,
            include_column_privileges: true,
        }
    }
}

impl EnrichmentOptions {
    /// Creates options with every facet enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the switch covering `facet` is on.
    pub fn includes(&self, facet: Facet) -> bool {
        match facet {
            Facet::AdditionalTableAttributes => self.include_table_attributes,
            Facet::AdditionalColumnAttributes => self.include_column_attributes,
            Facet::TableDefinitions => self.include_table_definitions,
            Facet::Views => self.include_views,
            Facet::Indexes => self.include_indexes,
            Facet::Triggers => self.include_triggers,
            Facet::TableConstraints
            | Facet::TableConstraintColumns
            | Facet::TableConstraintDefinitions => self.include_constraints,
            Facet::TablePrivileges => self.include_table_privileges,
            Facet::ColumnPrivileges => self.include_column_privileges,
        }
    }

    /// Builder method to enable/disable views collection.
    pub fn with_views(mut self, include: bool) -> Self {
        self.include_views = include;
        self
    }

    /// Builder method to enable/disable triggers collection.
    pub fn with_triggers(mut self, include: bool) -> Self {
        self.include_triggers = include;
        self
    }

    /// Builder method to enable/disable indexes collection.
    pub fn with_indexes(mut self, include: bool) -> Self {
        self.include_indexes = include;
        self
    }

    /// Builder method to enable/disable constraint assembly.
    pub fn with_constraints(mut self, include: bool) -> Self {
        self.include_constraints = include;
        self
    }

    /// Builder method to enable/disable both privilege facets.
    pub fn with_privileges(mut self, include: bool) -> Self {
        self.include_table_privileges = include;
        self.include_column_privileges = include;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    /// Returns error if every facet is disabled.
    pub fn validate(&self) -> Result<()> {
        if !Facet::ALL.iter().any(|facet| self.includes(*facet)) {
            return Err(CrawlError::configuration(
                "At least one metadata facet must be enabled",
            ));
        }
        Ok(())
    }
}

/// Everything a crawl session needs besides the catalog and the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Identifier normalization rules
    pub identifiers: IdentifierRules,
    /// Per-facet switches
    pub options: EnrichmentOptions,
    /// Query template registry
    pub queries: QueryTemplates,
}

impl CrawlConfig {
    /// Creates a configuration with default rules, every facet enabled and
    /// no templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set identifier rules.
    pub fn with_identifiers(mut self, identifiers: IdentifierRules) -> Self {
        self.identifiers = identifiers;
        self
    }

    /// Builder method to set facet switches.
    pub fn with_options(mut self, options: EnrichmentOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder method to set query templates.
    pub fn with_queries(mut self, queries: QueryTemplates) -> Self {
        self.queries = queries;
        self
    }

    /// Facets that will issue a query: enabled and templated.
    pub fn active_facets(&self) -> Vec<Facet> {
        self.queries
            .configured()
            .into_iter()
            .filter(|facet| self.options.includes(*facet))
            .collect()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if the options are invalid or the quote string could
    /// be confused with identifier text.
    pub fn validate(&self) -> Result<()> {
        self.options.validate()?;

        if self
            .identifiers
            .quote
            .chars()
            .any(|c| c.is_alphanumeric() || c.is_whitespace() || c == '_')
        {
            return Err(CrawlError::configuration(format!(
                "Identifier quote string {:?} must not contain letters, digits, underscores or whitespace",
                self.identifiers.quote
            )));
        }

        Ok(())
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid JSON, or fails
    /// validation.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CrawlError::io(format!("Failed to read {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            CrawlError::serialization(format!("Invalid crawl configuration in {}", path.display()), e)
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::IdentifierCase;

    #[test]
    fn test_defaults_enable_everything() {
        let options = EnrichmentOptions::default();
        assert!(Facet::ALL.iter().all(|facet| options.includes(*facet)));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_constraint_switch_covers_all_phases() {
        let options = EnrichmentOptions::new().with_constraints(false);
        assert!(!options.includes(Facet::TableConstraints));
        assert!(!options.includes(Facet::TableConstraintColumns));
        assert!(!options.includes(Facet::TableConstraintDefinitions));
        assert!(options.includes(Facet::Triggers));
    }

    #[test]
    fn test_all_disabled_is_invalid() {
        let options = EnrichmentOptions {
            include_table_attributes: false,
            include_column_attributes: false,
            include_table_definitions: false,
            include_views: false,
            include_indexes: false,
            include_triggers: false,
            include_constraints: false,
            include_table_privileges: false,
            include_column_privileges: false,
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CrawlConfig = serde_json::from_str(
            r#"{
                "identifiers": { "case": "upper" },
                "options": { "include_views": false },
                "queries": { "views": "SELECT 1", "triggers": "SELECT 2" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.identifiers.quote, "\"");
        assert_eq!(config.identifiers.case, IdentifierCase::Upper);
        assert!(config.options.include_triggers);
        assert_eq!(config.active_facets(), vec![Facet::Triggers]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_alphanumeric_quote_is_rejected() {
        let config = CrawlConfig::new().with_identifiers(IdentifierRules::new("q"));
        assert!(matches!(
            config.validate(),
            Err(CrawlError::Configuration { .. })
        ));

        let config = CrawlConfig::new().with_identifiers(IdentifierRules::new("`"));
        assert!(config.validate().is_ok());
    }
}
