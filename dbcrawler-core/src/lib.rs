//! Core catalog graph and metadata enrichment engine for dbcrawler.
//!
//! A base pass (see [`skeleton`]) registers schemas, tables, columns and
//! indexes. A [`CrawlSession`] then enriches that catalog from a database's
//! metadata views: view and table definitions, index definitions, triggers,
//! table constraints, privileges and vendor-specific attributes.
//!
//! # Guarantees
//! - Only the SELECT text supplied by the query template registry is run
//! - One cursor at a time on one connection; cursors are released on every
//!   exit path
//! - A facet whose query fails is reported and skipped; the crawl goes on
//! - Connection strings never appear in errors or logs
//!
//! # Architecture
//! - [`source::MetadataSource`] abstracts the connection (in-memory,
//!   SQLite, PostgreSQL)
//! - [`retrievers`] hold one enrichment step per metadata facet
//! - [`diagnostics::DiagnosticSink`] receives structured events instead of
//!   retrievers logging directly

pub mod attributes;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod identifiers;
pub mod logging;
pub mod models;
pub mod queries;
pub mod retrievers;
pub mod session;
pub mod skeleton;
pub mod source;

// Re-export commonly used types
pub use attributes::{AttributeBag, Attributed, Defined};
pub use catalog::Catalog;
pub use config::{CrawlConfig, EnrichmentOptions};
pub use diagnostics::{
    CrawlEvent, DiagnosticSink, FacetStats, FanoutSink, RecordingSink, TracingSink,
};
pub use error::{CrawlError, Result, redact_database_url};
pub use identifiers::{IdentifierCase, IdentifierRules};
pub use models::{
    ActionOrientationType, CheckOptionType, Column, ColumnId, ConditionTimingType, ConstraintId,
    EventManipulationType, Grant, Index, MetadataEnum, Privilege, Privileged, SchemaRef, Table,
    TableConstraint, TableConstraintColumn, TableConstraintType, TableId, Trigger,
};
pub use queries::{Facet, QueryTemplates};
pub use retrievers::FacetOutcome;
pub use session::{CRAWL_ORDER, CrawlReport, CrawlSession, FacetReport, FacetStatus};
pub use skeleton::CatalogSkeleton;
pub use source::{MemorySource, MetadataRow, MetadataSource, RowStream};
#[cfg(feature = "postgresql")]
pub use source::PgSource;
#[cfg(feature = "sqlite")]
pub use source::SqliteSource;
