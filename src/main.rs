//! # GDELT ETL
//!
//! Daily batch job that finds recent news articles on the GDELT DOC API,
//! scrapes each article's body text, sends the text to a classification
//! service, and stores the results in Postgres with duplicate suppression on
//! the article URL.
//!
//! ## Usage
//!
//! ```sh
//! DATABASE_URL=postgres://... BASE_URL=https://classifier.internal API_KEY=... gdelt_etl
//! ```
//!
//! ## Architecture
//!
//! 1. **Query**: build one GDELT query from fixed outlets, themes and language
//! 2. **Discovery**: fetch up to `maxrecords` candidate articles, newest first
//! 3. **Per article**: scrape → classify → insert-if-absent, one at a time;
//!    failures are isolated to the article
//! 4. **Commit**: the whole run is one transaction, committed at the end
//!
//! Exit status is non-zero when the run aborts (missing or unreachable
//! database, failed discovery, failed commit).

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod error;
mod models;
mod pipeline;
mod query;
mod scrapers;
mod store;
#[cfg(test)]
mod test_support;
mod utils;

use api::HttpClassifier;
use cli::Cli;
use error::PipelineError;
use pipeline::{PipelineRunner, RunContext};
use scrapers::article::HttpArticleScraper;
use scrapers::gdelt::GdeltClient;
use store::PgArticleStore;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("gdelt_etl starting up");

    // A missing .env file is normal in production.
    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "No .env file loaded");
    }

    let args = Cli::parse();
    debug!(?args.timespan, args.max_records, %args.tier, "Parsed CLI arguments");

    // Checked before any network activity.
    let Some(database_url) = args.database_url() else {
        error!("DATABASE_URL environment variable is not set");
        return Err(PipelineError::MissingDatabaseUrl.into());
    };

    let classifier = HttpClassifier::new(args.classify_endpoint(), args.api_key.clone())?;
    match classifier.endpoint() {
        Some(endpoint) => info!(%endpoint, "Classification endpoint configured"),
        None => warn!("No BASE_URL or CLASSIFY_URL; articles will be stored unclassified"),
    }

    let runner = PipelineRunner {
        discoverer: GdeltClient::new(args.discovery_url.clone()),
        scraper: HttpArticleScraper::new()?,
        classifier,
        store: PgArticleStore::new(database_url),
        query: args.search_query(),
        tier: args.tier.clone(),
    };

    let mut ctx = RunContext::new();
    let result = runner.run(&mut ctx).await;

    let elapsed = start_time.elapsed();
    match result {
        Ok(report) => {
            info!(
                started_at = %report.started_at,
                secs = elapsed.as_secs(),
                millis = elapsed.subsec_millis(),
                "Successfully processed {} articles, inserted {} new",
                report.processed,
                report.inserted
            );
            Ok(())
        }
        Err(e) => {
            let partial = ctx.report();
            error!(
                error = %e,
                state = %ctx.state(),
                processed = partial.processed,
                secs = elapsed.as_secs(),
                "Run aborted; nothing from this run was committed"
            );
            Err(e.into())
        }
    }
}
