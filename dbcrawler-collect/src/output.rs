//! File output for crawl results.

use dbcrawler_core::{Catalog, CrawlError, CrawlReport, FacetStatus, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Everything a crawl produces, as written to disk.
#[derive(Debug, Serialize)]
pub struct CrawlOutput {
    /// The enriched catalog
    pub catalog: Catalog,
    /// What each facet did
    pub report: CrawlReport,
}

/// Saves the crawl output as pretty-printed JSON.
///
/// # Errors
/// Returns error if serialization or the write fails.
pub async fn save_output(output: &CrawlOutput, output_path: &Path) -> Result<()> {
    let json_data = serde_json::to_string_pretty(output)
        .map_err(|e| CrawlError::serialization("Crawl output serialization", e))?;

    tokio::fs::write(output_path, json_data)
        .await
        .map_err(|e| CrawlError::io(format!("Failed to write to {}", output_path.display()), e))?;
    Ok(())
}

/// One line per facet, plus totals.
pub fn render_summary(report: &CrawlReport) -> String {
    let mut summary = String::new();
    for facet in &report.facets {
        let status = match &facet.status {
            FacetStatus::Disabled => "disabled".to_string(),
            FacetStatus::NotConfigured => "not configured".to_string(),
            FacetStatus::Skipped { reason } => format!("skipped ({reason})"),
            FacetStatus::Completed => format!(
                "{} rows, {} applied, {} skipped",
                facet.stats.rows_seen, facet.stats.rows_applied, facet.stats.rows_skipped
            ),
            FacetStatus::Failed { error } => format!(
                "FAILED after {} rows: {error}",
                facet.stats.rows_seen
            ),
        };
        let _ = writeln!(summary, "{:<30} {status}", facet.facet.as_str());
    }

    let totals = report.totals();
    let _ = write!(
        summary,
        "{} tables, {} objects, {} rows applied in {}ms",
        report.table_count, report.object_count, totals.rows_applied, report.duration_ms
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbcrawler_core::{
        CrawlConfig, CrawlSession, Facet, MemorySource, QueryTemplates, RecordingSink,
    };

    async fn sample_output() -> CrawlOutput {
        let mut catalog = Catalog::default();
        catalog.add_table(None, Some("public"), "orders").unwrap();
        let config = CrawlConfig::new()
            .with_queries(QueryTemplates::new().with_query(Facet::Views, "VIEWS"));
        let session = CrawlSession::new(catalog, config).unwrap();
        let mut source = MemorySource::new().with_failure("VIEWS", "relation does not exist");

        let (catalog, report) = session.run(&mut source, &mut RecordingSink::new()).await;
        CrawlOutput { catalog, report }
    }

    #[tokio::test]
    async fn test_save_output_writes_catalog_and_report() {
        let output = sample_output().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        save_output(&output, &path).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["catalog"]["tables"][0]["name"], "orders");
        let views = written["report"]["facets"]
            .as_array()
            .unwrap()
            .iter()
            .find(|facet| facet["facet"] == "views")
            .unwrap();
        assert_eq!(views["status"], "failed");
    }

    #[tokio::test]
    async fn test_summary_names_failed_facets() {
        let output = sample_output().await;
        let summary = render_summary(&output.report);

        assert!(summary.contains("views"));
        assert!(summary.contains("FAILED after 0 rows"));
        assert!(summary.contains("1 tables"));
    }
}
