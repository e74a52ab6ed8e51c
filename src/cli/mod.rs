//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::CrawlSettings;
use crate::crawler::CrawlEngine;
use crate::fetch::HttpFetcher;
use crate::sink::OutputSink;

#[derive(Parser)]
#[command(name = "listcrawl")]
#[command(about = "Resilient crawler for paginated business-listing directories")]
struct Cli {
    /// Path to the crawl configuration file (TOML or JSON).
    #[arg(short, long, global = true, default_value = "crawl.toml")]
    config: PathBuf,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crawl.
    Run {
        /// Additional seed list-page URLs, appended to the config.
        #[arg(long = "seed")]
        seeds: Vec<String>,
        /// Override the crawl-wide request budget.
        #[arg(long)]
        max_requests: Option<u64>,
    },
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

/// Peek at argv before clap runs so logging defaults can be picked
/// ahead of parsing.
pub fn is_verbose() -> bool {
    std::env::args().any(|a| a == "-v" || a == "--verbose")
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = CrawlSettings::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            seeds,
            max_requests,
        } => {
            settings.start_urls.extend(seeds);
            if let Some(budget) = max_requests {
                settings.max_requests_per_crawl = budget;
            }
            settings.validate()?;

            let sink = Arc::new(OutputSink::from_settings(&settings).await?);
            let fetcher = Arc::new(HttpFetcher::from_settings(&settings));
            let engine = Arc::new(CrawlEngine::new(settings, fetcher, sink));
            let stats = engine.stats();
            engine.run().await?;
            println!("Crawl complete: {}", stats.summary());
            Ok(())
        }
        Commands::CheckConfig => {
            settings.validate()?;
            info!("Configuration at {} is valid", cli.config.display());
            println!(
                "OK: {} seed(s), {} workers, budget {}",
                settings.start_urls.len(),
                settings.max_concurrency,
                settings.max_requests_per_crawl
            );
            Ok(())
        }
    }
}
