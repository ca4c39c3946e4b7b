//! Database metadata crawler.
//!
//! Enriches a base catalog skeleton with definitions, triggers,
//! constraints, privileges and vendor attributes read from a database's
//! metadata views.
//!
//! # Security Guarantees
//! - Only the configured SELECT statements are run
//! - No credentials stored or logged

use clap::Parser;
use dbcrawler_collect::{
    Cli, Command,
    crawl::{check_config, crawl},
    output::{render_summary, save_output},
};
use dbcrawler_core::{Result, logging::init_logging};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Crawl(args) => {
            info!("Starting metadata crawl...");
            let output = crawl(args).await?;
            for warning in &output.report.warnings {
                warn!("{}", warning);
            }
            save_output(&output, &args.output).await?;

            info!("✓ Metadata crawl completed");
            if !cli.global.quiet {
                println!("{}", render_summary(&output.report));
                println!("Catalog written to {}", args.output.display());
            }
            Ok(())
        }
        Command::CheckConfig(args) => {
            let facets = check_config(&args.config)?;
            if !cli.global.quiet {
                println!("{} is valid; {} facets will be queried:", args.config.display(), facets.len());
                for facet in facets {
                    println!("  {facet}");
                }
            }
            Ok(())
        }
    }
}
