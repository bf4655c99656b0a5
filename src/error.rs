//! Typed errors for every stage of the pipeline.
//!
//! Only [`PipelineError`] aborts a run. The per-stage errors are turned into
//! an [`ItemOutcome`](crate::pipeline::ItemOutcome) by the runner and never
//! escape the per-article boundary.

use thiserror::Error;

/// The article-search call failed; nothing can be processed without it.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Transport-level failure (DNS, connect, TLS, body read).
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with something other than 200.
    #[error("discovery API returned status {0}")]
    Status(u16),

    /// 200 with an empty body.
    #[error("discovery API returned an empty body")]
    EmptyBody,

    /// The body is not the expected JSON document.
    #[error("discovery API returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Why an article page could not be scraped. The article is skipped.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("page returned status {0}")]
    Status(u16),

    #[error("page request timed out")]
    Timeout,

    #[error("network fault: {0}")]
    Network(#[source] reqwest::Error),

    #[error("failed to read page body: {0}")]
    Body(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScrapeError::Timeout
        } else {
            ScrapeError::Network(e)
        }
    }
}

/// Why an article could not be classified. The article is still stored.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Neither a base URL nor a direct endpoint was configured.
    #[error("no classification endpoint configured")]
    NotConfigured,

    #[error("classification service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classification request timed out")]
    Timeout,

    #[error("classification request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("classification response is not a JSON object: {0}")]
    Decode(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ClassifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifyError::Timeout
        } else {
            ClassifyError::Network(e)
        }
    }
}

/// Errors from the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("database statement failed: {0}")]
    Query(#[source] sqlx::Error),

    /// The session's transaction was already committed or rolled back.
    #[error("store session already finished")]
    SessionFinished,
}

/// A fault while handling one article. Logged, the article is dropped, the
/// run continues.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode classification: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stage panicked while handling the article.
    #[error("article handler panicked: {0}")]
    Panicked(String),
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("DATABASE_URL environment variable is not set")]
    MissingDatabaseUrl,

    #[error("could not open the article store: {0}")]
    Connect(#[source] StoreError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),
}

/// A `--timespan` value GDELT would not understand.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimespanError {
    #[error("timespan is empty")]
    Empty,

    #[error("timespan amount must be a positive integer: {0:?}")]
    Amount(String),

    #[error("unknown timespan unit {0:?} (expected min, h, d, w or m)")]
    Unit(String),
}
