//! listcrawl - resilient crawler for paginated business-directory listings.
//!
//! Extracts structured company records from list/detail pages, rotating
//! sessions on block detection and persisting results idempotently.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if listcrawl::cli::is_verbose() {
        "listcrawl=info"
    } else {
        "listcrawl=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    listcrawl::cli::run().await
}
