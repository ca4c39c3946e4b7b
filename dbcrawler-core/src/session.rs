//! Crawl session orchestration.
//!
//! A [`CrawlSession`] owns the catalog for the whole enrichment run and
//! drives every retriever, one at a time, against a single metadata
//! source. Running consumes the session, so a catalog is never enriched
//! twice by the same session and definition text is never appended twice.

use crate::Result;
use crate::catalog::Catalog;
use crate::config::CrawlConfig;
use crate::diagnostics::{CrawlEvent, DiagnosticSink, FacetStats, FanoutSink};
use crate::queries::{Facet, QueryTemplates};
use crate::retrievers::{
    self, ConstraintOutcome, FacetOutcome, retrieve_additional_column_attributes,
    retrieve_additional_table_attributes, retrieve_column_privileges, retrieve_indexes,
    retrieve_table_definitions, retrieve_table_privileges, retrieve_triggers, retrieve_views,
};
use crate::source::MetadataSource;
use serde::Serialize;
use std::time::Instant;

/// Steps in the order a session runs them. [`Facet::TableConstraints`]
/// stands for all three constraint phases.
pub const CRAWL_ORDER: [Facet; 9] = [
    Facet::TableConstraints,
    Facet::Triggers,
    Facet::Views,
    Facet::TableDefinitions,
    Facet::Indexes,
    Facet::AdditionalTableAttributes,
    Facet::AdditionalColumnAttributes,
    Facet::TablePrivileges,
    Facet::ColumnPrivileges,
];

const CONSTRAINT_PHASES: [Facet; 3] = [
    Facet::TableConstraints,
    Facet::TableConstraintColumns,
    Facet::TableConstraintDefinitions,
];

/// Facets reported for one step.
fn step_facets(step: Facet) -> &'static [Facet] {
    match step {
        Facet::TableConstraints => &CONSTRAINT_PHASES,
        Facet::AdditionalTableAttributes => &[Facet::AdditionalTableAttributes],
        Facet::AdditionalColumnAttributes => &[Facet::AdditionalColumnAttributes],
        Facet::TableDefinitions => &[Facet::TableDefinitions],
        Facet::Views => &[Facet::Views],
        Facet::Indexes => &[Facet::Indexes],
        Facet::Triggers => &[Facet::Triggers],
        Facet::TablePrivileges => &[Facet::TablePrivileges],
        Facet::ColumnPrivileges => &[Facet::ColumnPrivileges],
        Facet::TableConstraintColumns | Facet::TableConstraintDefinitions => &[],
    }
}

/// How a facet ended, as shown in the crawl report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FacetStatus {
    /// Switched off in the enrichment options
    Disabled,
    /// No query template for the target database
    NotConfigured,
    /// Not started because an earlier phase produced nothing to link to
    Skipped { reason: String },
    /// Row stream consumed to the end
    Completed,
    /// Query failed; rows applied before the failure were kept
    Failed { error: String },
}

/// Report entry for one facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetReport {
    /// Facet this entry covers
    pub facet: Facet,
    /// How the facet ended
    #[serde(flatten)]
    pub status: FacetStatus,
    /// Row counters
    pub stats: FacetStats,
}

impl FacetReport {
    fn disabled(facet: Facet) -> Self {
        Self {
            facet,
            status: FacetStatus::Disabled,
            stats: FacetStats::default(),
        }
    }

    fn from_outcome(facet: Facet, outcome: FacetOutcome) -> Self {
        let stats = outcome.stats();
        let status = match outcome {
            FacetOutcome::NotConfigured => FacetStatus::NotConfigured,
            FacetOutcome::Completed { .. } => FacetStatus::Completed,
            FacetOutcome::Failed { error, .. } => FacetStatus::Failed { error },
        };
        Self {
            facet,
            status,
            stats,
        }
    }

    fn linked(facet: Facet, outcome: Option<FacetOutcome>) -> Self {
        match outcome {
            Some(outcome) => Self::from_outcome(facet, outcome),
            None => Self {
                facet,
                status: FacetStatus::Skipped {
                    reason: "no table constraints were found".to_string(),
                },
                stats: FacetStats::default(),
            },
        }
    }
}

/// Summary of one crawl session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// When the session started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Wall-clock duration of the whole crawl
    pub duration_ms: u64,
    /// Tables and views in the catalog
    pub table_count: usize,
    /// Tables plus every object they own
    pub object_count: usize,
    /// One entry per facet, in the order the facets ran
    pub facets: Vec<FacetReport>,
    /// Query failures, in the order they happened
    pub warnings: Vec<String>,
}

impl CrawlReport {
    /// Report entry for a facet.
    pub fn facet(&self, facet: Facet) -> Option<&FacetReport> {
        self.facets.iter().find(|report| report.facet == facet)
    }

    /// Status of a facet.
    pub fn status(&self, facet: Facet) -> Option<&FacetStatus> {
        self.facet(facet).map(|report| &report.status)
    }

    /// Facets whose query failed.
    pub fn failed_facets(&self) -> Vec<Facet> {
        self.facets
            .iter()
            .filter(|report| matches!(report.status, FacetStatus::Failed { .. }))
            .map(|report| report.facet)
            .collect()
    }

    /// Row counters summed over every facet.
    pub fn totals(&self) -> FacetStats {
        self.facets
            .iter()
            .fold(FacetStats::default(), |total, report| FacetStats {
                rows_seen: total.rows_seen.saturating_add(report.stats.rows_seen),
                rows_applied: total.rows_applied.saturating_add(report.stats.rows_applied),
                rows_skipped: total.rows_skipped.saturating_add(report.stats.rows_skipped),
            })
    }
}

/// Collects the text of warning events.
#[derive(Debug, Default)]
struct WarningLog {
    warnings: Vec<String>,
}

impl DiagnosticSink for WarningLog {
    fn emit(&mut self, event: CrawlEvent) {
        if event.is_warning() {
            self.warnings.push(event.to_string());
        }
    }
}

/// Single-use enrichment run over one catalog.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    catalog: Catalog,
    config: CrawlConfig,
}

impl CrawlSession {
    /// Creates a session that will enrich `catalog`.
    ///
    /// # Errors
    /// Returns error if the configuration does not validate.
    pub fn new(catalog: Catalog, config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { catalog, config })
    }

    /// Catalog as it stands before the run.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Runs every enabled facet in [`CRAWL_ORDER`] and hands the enriched
    /// catalog back.
    ///
    /// A failed facet never stops the crawl; it shows up as
    /// [`FacetStatus::Failed`] and a warning.
    pub async fn run(
        self,
        source: &mut dyn MetadataSource,
        sink: &mut dyn DiagnosticSink,
    ) -> (Catalog, CrawlReport) {
        let Self {
            mut catalog,
            config,
        } = self;
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        tracing::info!(
            "Starting metadata enrichment of {} tables",
            catalog.table_count()
        );

        let mut warnings = WarningLog::default();
        let mut facets = Vec::new();
        {
            let mut events = FanoutSink::new(sink, &mut warnings);
            for step in CRAWL_ORDER {
                if !config.options.includes(step) {
                    tracing::debug!("{} disabled by configuration", step);
                    facets.extend(step_facets(step).iter().copied().map(FacetReport::disabled));
                    continue;
                }
                let reports =
                    run_step(step, &mut catalog, &config.queries, source, &mut events).await;
                facets.extend(reports);
            }
        }

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = CrawlReport {
            started_at,
            duration_ms,
            table_count: catalog.table_count(),
            object_count: catalog.object_count(),
            facets,
            warnings: warnings.warnings,
        };
        tracing::info!(
            "Metadata enrichment finished in {}ms with {} warnings",
            report.duration_ms,
            report.warnings.len()
        );
        (catalog, report)
    }
}

async fn run_step(
    step: Facet,
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> Vec<FacetReport> {
    let outcome = match step {
        Facet::TableConstraints => {
            let ConstraintOutcome {
                constraints,
                columns,
                definitions,
            } = retrievers::retrieve_table_constraints(catalog, queries, source, sink).await;
            return vec![
                FacetReport::from_outcome(Facet::TableConstraints, constraints),
                FacetReport::linked(Facet::TableConstraintColumns, columns),
                FacetReport::linked(Facet::TableConstraintDefinitions, definitions),
            ];
        }
        Facet::Triggers => retrieve_triggers(catalog, queries, source, sink).await,
        Facet::Views => retrieve_views(catalog, queries, source, sink).await,
        Facet::TableDefinitions => retrieve_table_definitions(catalog, queries, source, sink).await,
        Facet::Indexes => retrieve_indexes(catalog, queries, source, sink).await,
        Facet::AdditionalTableAttributes => {
            retrieve_additional_table_attributes(catalog, queries, source, sink).await
        }
        Facet::AdditionalColumnAttributes => {
            retrieve_additional_column_attributes(catalog, queries, source, sink).await
        }
        Facet::TablePrivileges => retrieve_table_privileges(catalog, queries, source, sink).await,
        Facet::ColumnPrivileges => retrieve_column_privileges(catalog, queries, source, sink).await,
        // Constraint columns and definitions run inside the constraint step.
        Facet::TableConstraintColumns | Facet::TableConstraintDefinitions => return Vec::new(),
    };
    vec![FacetReport::from_outcome(step, outcome)]
}
