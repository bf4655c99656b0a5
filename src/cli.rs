//! Command-line interface definitions for the GDELT ETL run.
//!
//! Every option can come from a flag or an environment variable. `main`
//! loads a `.env` file (if any) before parsing, so deployments that inject
//! `DATABASE_URL`, `BASE_URL` and `API_KEY` work unchanged.

use crate::api::{DEFAULT_TIER, resolve_endpoint};
use crate::query::{DEFAULT_DOMAINS, DEFAULT_LANGUAGE, DEFAULT_THEMES, SearchQuery, Timespan, build_query};
use crate::scrapers::gdelt::GDELT_DOC_URL;
use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Typical deployment: everything from the environment
/// DATABASE_URL=postgres://... BASE_URL=https://classifier.internal gdelt_etl
///
/// # Narrow the search to two outlets over the last six hours
/// gdelt_etl --domain apnews.com --domain cnn.com --timespan 6h
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Postgres connection string. Required; the run refuses to start without it.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Base URL of the classification service (`/v1/classify` is appended)
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Full classification endpoint; overrides `--base-url`
    #[arg(long, env = "CLASSIFY_URL")]
    pub classify_url: Option<String>,

    /// Bearer token for the classification service
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Classification tier used for every article in the run
    #[arg(long, env = "CLASSIFY_TIER", default_value = DEFAULT_TIER)]
    pub tier: String,

    /// GDELT DOC API endpoint
    #[arg(long, env = "GDELT_DOC_URL", default_value = GDELT_DOC_URL)]
    pub discovery_url: String,

    /// Look-back window, e.g. `1d`, `12h`, `30min`
    #[arg(long, default_value = "1d")]
    pub timespan: Timespan,

    /// Maximum number of articles to request
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=250))]
    pub max_records: u32,

    /// Source domain to search (repeatable); defaults to a fixed set of US outlets
    #[arg(long = "domain")]
    pub domains: Vec<String>,

    /// GKG theme to search (repeatable)
    #[arg(long = "theme")]
    pub themes: Vec<String>,

    /// Source language filter
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,
}

impl Cli {
    /// The run's search query.
    ///
    /// # Returns
    ///
    /// A [`SearchQuery`] over `--domain`/`--theme`, or the built-in outlet
    /// and theme lists when none were given.
    pub fn search_query(&self) -> SearchQuery {
        let domains = if self.domains.is_empty() {
            DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect()
        } else {
            self.domains.clone()
        };
        let themes = if self.themes.is_empty() {
            DEFAULT_THEMES.iter().map(|t| t.to_string()).collect()
        } else {
            self.themes.clone()
        };
        build_query(domains, themes, &self.language, self.timespan, self.max_records)
    }

    /// Classification URL: `--classify-url` if set, else `--base-url` plus
    /// `/v1/classify`.
    ///
    /// # Returns
    ///
    /// `None` when neither is configured; articles are then stored
    /// unclassified.
    pub fn classify_endpoint(&self) -> Option<String> {
        resolve_endpoint(self.base_url.as_deref(), self.classify_url.as_deref())
    }

    /// Connection string, treating an empty value as unset.
    ///
    /// # Returns
    ///
    /// `None` when `DATABASE_URL` is missing or blank, which is fatal to the
    /// run.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}
