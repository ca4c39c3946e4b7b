//! Command implementations.

use crate::output::CrawlOutput;
use crate::{CrawlArgs, validate_database_url};
use dbcrawler_core::{
    CatalogSkeleton, CrawlConfig, CrawlError, CrawlSession, Facet, MetadataSource, Result,
    TracingSink, redact_database_url,
};
use std::path::Path;
use tracing::{error, info};

/// Opens a metadata source for the URL's scheme.
///
/// # Errors
/// Returns error if the URL is malformed, its scheme is not compiled in,
/// or the connection cannot be established.
pub async fn connect_source(database_url: &str) -> Result<Box<dyn MetadataSource>> {
    if !validate_database_url(database_url) {
        return Err(CrawlError::configuration(format!(
            "Unsupported or malformed database URL: {}",
            redact_database_url(database_url)
        )));
    }

    let scheme = database_url
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .unwrap_or_default();
    match scheme.as_str() {
        #[cfg(feature = "postgresql")]
        "postgres" | "postgresql" => Ok(Box::new(
            dbcrawler_core::PgSource::connect(database_url).await?,
        )),
        #[cfg(feature = "sqlite")]
        "sqlite" | "file" => Ok(Box::new(
            dbcrawler_core::SqliteSource::connect(database_url).await?,
        )),
        other => Err(CrawlError::configuration(format!(
            "Support for {other} databases is not compiled in"
        ))),
    }
}

/// Loads the skeleton and configuration, enriches the catalog and returns
/// it with the crawl report.
///
/// Configuration problems fail before any connection is opened.
///
/// # Errors
/// Returns error if the inputs cannot be loaded or the connection fails.
/// Failures inside individual facets are reported, not returned.
pub async fn crawl(args: &CrawlArgs) -> Result<CrawlOutput> {
    let config = CrawlConfig::from_json_file(&args.config)?;
    let catalog =
        CatalogSkeleton::from_json_file(&args.skeleton)?.into_catalog(config.identifiers.clone())?;
    let session = CrawlSession::new(catalog, config)?;

    info!("Target: {}", redact_database_url(&args.database_url));
    let mut source = connect_source(&args.database_url).await.map_err(|e| {
        error!("Failed to open metadata source: {}", e);
        e
    })?;

    let (catalog, report) = session.run(source.as_mut(), &mut TracingSink).await;
    Ok(CrawlOutput { catalog, report })
}

/// Validates a configuration file and returns the facets it will query.
///
/// # Errors
/// Returns error if the file cannot be loaded or does not validate.
pub fn check_config(path: &Path) -> Result<Vec<Facet>> {
    let config = CrawlConfig::from_json_file(path)?;
    let active = config.active_facets();
    if active.is_empty() {
        tracing::warn!("{} enables no facet with a query template", path.display());
    }
    Ok(active)
}
