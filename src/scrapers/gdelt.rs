//! Article discovery through the GDELT DOC 2.0 API.
//!
//! One `ArtList` request per run returns up to `maxrecords` articles sorted
//! newest first. A failed call aborts the run; an empty list does not.

use crate::error::DiscoveryError;
use crate::models::{ArtListItem, ArtListResponse, ArticleRef};
use crate::query::SearchQuery;
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

pub const GDELT_DOC_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

/// Source of candidate articles.
pub trait Discoverer {
    /// Run one search.
    ///
    /// # Returns
    ///
    /// Articles most recent first, at most `query.max_records` of them. An
    /// empty list means nothing matched and is not an error.
    ///
    /// # Errors
    ///
    /// A [`DiscoveryError`] when the request fails, the status is not 200,
    /// or the body is empty or not the expected JSON. The run aborts.
    async fn discover(&self, query: &SearchQuery) -> Result<Vec<ArticleRef>, DiscoveryError>;
}

/// HTTP client for the DOC API.
#[derive(Debug, Clone)]
pub struct GdeltClient {
    client: Client,
    endpoint: String,
}

impl GdeltClient {
    /// Create a client for the DOC API.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The DOC API URL, normally [`GDELT_DOC_URL`]
    ///
    /// No request timeout is set; the HTTP client's defaults apply.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Discoverer for GdeltClient {
    #[instrument(level = "info", skip_all, fields(endpoint = %self.endpoint))]
    async fn discover(&self, query: &SearchQuery) -> Result<Vec<ArticleRef>, DiscoveryError> {
        info!(query = %query.query_string(), "Querying GDELT DOC API");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query.to_params())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let articles = parse_artlist(&body, query.max_records as usize)?;
        info!(count = articles.len(), "Discovered articles");
        Ok(articles)
    }
}

/// Decode an `ArtList` body into at most `cap` article references.
///
/// GDELT reports query problems as plain text with status 200, which surfaces
/// here as [`DiscoveryError::Malformed`].
pub fn parse_artlist(body: &str, cap: usize) -> Result<Vec<ArticleRef>, DiscoveryError> {
    if body.trim().is_empty() {
        return Err(DiscoveryError::EmptyBody);
    }

    let response: ArtListResponse = serde_json::from_str(body).map_err(|e| {
        warn!(body = %truncate_for_log(body, 200), "Discovery body is not JSON");
        DiscoveryError::Malformed(e)
    })?;

    let mut articles = Vec::with_capacity(response.articles.len().min(cap));
    for item in response.articles {
        if articles.len() == cap {
            break;
        }
        debug!(url = ?item.url, seen = ?item.seendate, "Discovery item");
        match ArtListItem::into_article_ref(item) {
            Some(article) => articles.push(article),
            None => warn!("Dropping discovery item without url or title"),
        }
    }
    Ok(articles)
}
