//! Structured crawl diagnostics.
//!
//! Retrievers never log directly. They emit [`CrawlEvent`]s into a
//! [`DiagnosticSink`] handed in by the session, so skipped rows and failed
//! facets can be asserted on in tests and summarised in the crawl report.

use crate::queries::Facet;
use serde::Serialize;

/// Row counters for one facet run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FacetStats {
    /// Rows delivered by the source
    pub rows_seen: u64,
    /// Rows that mutated the catalog
    pub rows_applied: u64,
    /// Rows dropped because an entity did not resolve or did not fit
    pub rows_skipped: u64,
}

impl FacetStats {
    pub(crate) fn seen(&mut self) {
        self.rows_seen = self.rows_seen.saturating_add(1);
    }

    pub(crate) fn applied(&mut self) {
        self.rows_applied = self.rows_applied.saturating_add(1);
    }

    pub(crate) fn skipped(&mut self) {
        self.rows_skipped = self.rows_skipped.saturating_add(1);
    }
}

/// Something a retriever observed while running.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// No query template is configured for the facet
    CapabilityAbsent { facet: Facet },
    /// A row's identity keys did not resolve to a catalog entity
    EntityNotFound {
        facet: Facet,
        kind: &'static str,
        name: String,
    },
    /// A row resolved but could not be applied
    RowSkipped {
        facet: Facet,
        name: String,
        reason: String,
    },
    /// The facet's query failed to execute or iterate
    QueryFailed { facet: Facet, error: String },
    /// The facet's row stream was consumed to the end
    FacetCompleted { facet: Facet, stats: FacetStats },
}

impl CrawlEvent {
    /// Facet the event belongs to.
    pub fn facet(&self) -> Facet {
        match self {
            Self::CapabilityAbsent { facet }
            | Self::EntityNotFound { facet, .. }
            | Self::RowSkipped { facet, .. }
            | Self::QueryFailed { facet, .. }
            | Self::FacetCompleted { facet, .. } => *facet,
        }
    }

    /// Whether the event is worth surfacing as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::QueryFailed { .. })
    }
}

impl std::fmt::Display for CrawlEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapabilityAbsent { facet } => write!(f, "{facet}: no query configured"),
            Self::EntityNotFound { facet, kind, name } => {
                write!(f, "{facet}: {kind} not found: {name}")
            }
            Self::RowSkipped {
                facet,
                name,
                reason,
            } => write!(f, "{facet}: skipped {name}: {reason}"),
            Self::QueryFailed { facet, error } => write!(f, "Could not retrieve {facet}: {error}"),
            Self::FacetCompleted { facet, stats } => write!(
                f,
                "{facet}: {} rows, {} applied, {} skipped",
                stats.rows_seen, stats.rows_applied, stats.rows_skipped
            ),
        }
    }
}

/// Receiver of crawl events.
pub trait DiagnosticSink {
    /// Handles one event.
    fn emit(&mut self, event: CrawlEvent);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn emit(&mut self, event: CrawlEvent) {
        (**self).emit(event);
    }
}

/// Forwards events to `tracing`: failures at WARN, completions at INFO,
/// everything else at DEBUG.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, event: CrawlEvent) {
        match event {
            CrawlEvent::CapabilityAbsent { facet } => {
                tracing::debug!("No query configured for {}; skipping", facet);
            }
            CrawlEvent::EntityNotFound { facet, kind, name } => {
                tracing::debug!("{}: {} not found: {}", facet, kind, name);
            }
            CrawlEvent::RowSkipped {
                facet,
                name,
                reason,
            } => {
                tracing::debug!("{}: skipping {}: {}", facet, name, reason);
            }
            CrawlEvent::QueryFailed { facet, error } => {
                tracing::warn!("Could not retrieve {}: {}", facet, error);
            }
            CrawlEvent::FacetCompleted { facet, stats } => {
                tracing::info!(
                    "Retrieved {}: {} rows, {} applied, {} skipped",
                    facet,
                    stats.rows_seen,
                    stats.rows_applied,
                    stats.rows_skipped
                );
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<CrawlEvent>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in emission order.
    pub fn events(&self) -> &[CrawlEvent] {
        &self.events
    }

    /// Events for one facet.
    pub fn for_facet(&self, facet: Facet) -> impl Iterator<Item = &CrawlEvent> {
        self.events.iter().filter(move |event| event.facet() == facet)
    }

    /// Number of unresolved rows reported for a facet.
    pub fn not_found(&self, facet: Facet) -> usize {
        self.for_facet(facet)
            .filter(|event| matches!(event, CrawlEvent::EntityNotFound { .. }))
            .count()
    }

    /// Consumes the recorder.
    pub fn into_events(self) -> Vec<CrawlEvent> {
        self.events
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&mut self, event: CrawlEvent) {
        self.events.push(event);
    }
}

/// Sends each event to two sinks.
#[derive(Debug, Clone, Default)]
pub struct FanoutSink<A, B> {
    /// Receives each event first
    pub first: A,
    /// Receives each event second
    pub second: B,
}

impl<A, B> FanoutSink<A, B> {
    /// Pairs two sinks.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for FanoutSink<A, B> {
    fn emit(&mut self, event: CrawlEvent) {
        self.first.emit(event.clone());
        self.second.emit(event);
    }
}
