//! The daily run: connect → discover → scrape/classify/store each article →
//! commit.
//!
//! # State machine
//!
//! ```text
//! Idle → Connected → Discovering → Iterating → Committing → Closed
//!   └──────────┴───────────┴────────────┴───────────┴──→ Aborted
//! ```
//!
//! Per-article failures never leave the iteration loop. They become an
//! [`ItemOutcome`] and only move counters; a panic while handling one article
//! is caught and counted as a failure too. The run aborts only on connect,
//! discovery, or commit failures, and in the latter two cases the transaction
//! is rolled back so nothing from the run persists.

use crate::api::Classifier;
use crate::error::{ItemError, PipelineError, ScrapeError};
use crate::models::{ArticleRecord, ArticleRef};
use crate::query::SearchQuery;
use crate::scrapers::article::Scraper;
use crate::scrapers::gdelt::Discoverer;
use crate::store::{ArticleStore, StoreSession};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Connected,
    Discovering,
    Iterating,
    Committing,
    Closed,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Connected => "connected",
            RunState::Discovering => "discovering",
            RunState::Iterating => "iterating",
            RunState::Committing => "committing",
            RunState::Closed => "closed",
            RunState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Result of handling one [`ArticleRef`].
#[derive(Debug)]
pub enum ItemOutcome {
    /// New row written. `classified` is false when classification degraded.
    Inserted { classified: bool },
    /// A row with this URL already existed; nothing written.
    Duplicate { classified: bool },
    /// Scrape failed; nothing classified or written.
    Skipped(ScrapeError),
    /// Unexpected fault after scraping; the article is dropped.
    Failed(ItemError),
}

/// Counters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub candidates: usize,
    /// Articles that reached the store without error.
    pub processed: usize,
    /// Of `processed`, how many wrote a new row.
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Of `processed`, how many were stored without a classification.
    pub unclassified: usize,
}

/// Mutable state owned by one run: where the state machine is, and counters.
#[derive(Debug)]
pub struct RunContext {
    state: RunState,
    report: RunReport,
}

impl RunContext {
    /// Create a context in [`RunState::Idle`] with zeroed counters.
    ///
    /// # Returns
    ///
    /// A context whose `started_at` is the current UTC time. Pass it to
    /// [`PipelineRunner::run`]; it stays readable after an aborted run.
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            report: RunReport {
                started_at: Utc::now(),
                candidates: 0,
                processed: 0,
                inserted: 0,
                duplicates: 0,
                skipped: 0,
                failed: 0,
                unclassified: 0,
            },
        }
    }

    /// Where the run is, or stopped.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Counters so far; partial if the run aborted.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "Run state transition");
        self.state = next;
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        let report = &mut self.report;
        match outcome {
            ItemOutcome::Inserted { classified } => {
                report.processed += 1;
                report.inserted += 1;
                report.unclassified += usize::from(!classified);
            }
            ItemOutcome::Duplicate { classified } => {
                report.processed += 1;
                report.duplicates += 1;
                report.unclassified += usize::from(!classified);
            }
            ItemOutcome::Skipped(reason) => {
                debug!(%reason, "Counted as skipped");
                report.skipped += 1;
            }
            ItemOutcome::Failed(e) => {
                debug!(error = %e, "Counted as failed");
                report.failed += 1;
            }
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Wires the stages together. Generic over every collaborator so tests can
/// drive it with in-memory fakes.
pub struct PipelineRunner<D, S, C, St> {
    pub discoverer: D,
    pub scraper: S,
    pub classifier: C,
    pub store: St,
    pub query: SearchQuery,
    /// Fixed for the whole run.
    pub tier: String,
}

impl<D, S, C, St> PipelineRunner<D, S, C, St>
where
    D: Discoverer,
    S: Scraper,
    C: Classifier,
    St: ArticleStore,
{
    /// Execute one run. On success the transaction has been committed and
    /// the session closed.
    #[instrument(level = "info", skip_all, fields(tier = %self.tier))]
    pub async fn run(&self, ctx: &mut RunContext) -> Result<RunReport, PipelineError> {
        let mut session = match self.store.open().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Could not connect to the database");
                ctx.transition(RunState::Aborted);
                return Err(PipelineError::Connect(e));
            }
        };
        ctx.transition(RunState::Connected);

        ctx.transition(RunState::Discovering);
        let articles = match self.discoverer.discover(&self.query).await {
            Ok(articles) => articles,
            Err(e) => {
                error!(error = %e, "Discovery failed; aborting run");
                return Err(self.abort(ctx, session, PipelineError::Discovery(e)).await);
            }
        };

        ctx.report.candidates = articles.len();
        if articles.is_empty() {
            info!("No articles found matching criteria");
        } else {
            info!(count = articles.len(), "Found articles; processing and inserting");
        }

        ctx.transition(RunState::Iterating);
        for article in &articles {
            let outcome = match AssertUnwindSafe(self.process(&mut session, article))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(url = %article.url, panic = %message, "Article handler panicked");
                    ItemOutcome::Failed(ItemError::Panicked(message))
                }
            };
            ctx.record(&outcome);
        }
        debug!("Iteration done");

        ctx.transition(RunState::Committing);
        if let Err(e) = session.commit().await {
            error!(error = %e, "Commit failed; rolling back");
            return Err(self.abort(ctx, session, PipelineError::Commit(e)).await);
        }

        session.close().await;
        ctx.transition(RunState::Closed);

        let report = ctx.report.clone();
        info!(
            candidates = report.candidates,
            processed = report.processed,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            failed = report.failed,
            unclassified = report.unclassified,
            "Run complete"
        );
        Ok(report)
    }

    /// Roll back, close, and mark the run aborted. Returns `err` for the
    /// caller to propagate.
    async fn abort(
        &self,
        ctx: &mut RunContext,
        mut session: St::Session,
        err: PipelineError,
    ) -> PipelineError {
        if let Err(e) = session.rollback().await {
            error!(error = %e, "Rollback failed");
        }
        session.close().await;
        ctx.transition(RunState::Aborted);
        err
    }

    /// scrape → classify → insert for one article.
    async fn process(&self, session: &mut St::Session, article: &ArticleRef) -> ItemOutcome {
        info!(
            title = %truncate_for_log(&article.title, 70),
            url = %article.url,
            "Processing article"
        );

        let text = match self.scraper.scrape(&article.url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %article.url, error = %e, "Skipping article; scraping failed");
                return ItemOutcome::Skipped(e);
            }
        };

        let classification = match self.classifier.classify(&text, &self.tier).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(url = %article.url, error = %e, "Classification unavailable; storing without it");
                None
            }
        };
        let classified = classification.is_some();

        let stored = match ArticleRecord::new(article, text, classification.as_ref()) {
            Ok(record) => session.insert_if_absent(&record).await.map_err(ItemError::from),
            Err(e) => Err(ItemError::from(e)),
        };

        match stored {
            Ok(true) => {
                info!(source = %article.source_domain, "Inserted");
                ItemOutcome::Inserted { classified }
            }
            Ok(false) => {
                info!(source = %article.source_domain, "Skipped as duplicate");
                ItemOutcome::Duplicate { classified }
            }
            Err(e) => {
                error!(url = %article.url, error = %e, "Error processing article");
                ItemOutcome::Failed(e)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
