//! Article body scraper.
//!
//! Fetches a page and keeps the visible text of every `<p>` element, in
//! document order. Any fetch failure is reported as a [`ScrapeError`] and the
//! caller skips the article; a page without paragraphs yields an empty
//! string, which is still stored.

use crate::error::ScrapeError;
use crate::utils::normalize_whitespace;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode, header};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

/// Desktop browser identity; some outlets reject obvious bots outright.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));

/// Fetches article body text.
pub trait Scraper {
    /// Fetch `url` and return its paragraph text.
    ///
    /// # Returns
    ///
    /// The normalized paragraph text, possibly empty when the page has no
    /// `<p>` elements.
    ///
    /// # Errors
    ///
    /// A [`ScrapeError`] for a non-200 status, a timeout, or a network fault.
    /// The caller skips the article; the error never aborts the run.
    async fn scrape(&self, url: &str) -> Result<String, ScrapeError>;
}

/// [`Scraper`] backed by a reqwest client with a browser `User-Agent`.
#[derive(Debug, Clone)]
pub struct HttpArticleScraper {
    client: Client,
}

impl HttpArticleScraper {
    /// Create a scraper with the standard 10 second timeout.
    ///
    /// # Errors
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(SCRAPE_TIMEOUT)
    }

    /// Create a scraper whose requests give up after `timeout`.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Total time allowed per page, connect through body
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Scraper for HttpArticleScraper {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn scrape(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::Timeout
            } else {
                ScrapeError::Body(e)
            }
        })?;
        let text = extract_paragraph_text(&body);
        debug!(bytes = body.len(), text_len = text.len(), "Parsed article page");
        Ok(text)
    }
}

/// Text of all `<p>` elements joined by single spaces, whitespace-normalized.
///
/// # Arguments
///
/// * `html` - A full HTML document
///
/// # Returns
///
/// The paragraph text in document order, or `""` when there are no
/// paragraphs.
pub fn extract_paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let paragraphs = document
        .select(&PARAGRAPH)
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_whitespace(&paragraphs)
}
