//! Data models shared across the pipeline.
//!
//! - [`ArticleRef`]: a candidate article returned by discovery
//! - [`ClassificationResult`]: the classification service's JSON object
//! - [`ArticleRecord`]: the row written to the `articles` table
//! - [`ArtListResponse`] / [`ArtListItem`]: the GDELT `ArtList` wire format

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A candidate article found by discovery.
///
/// Lives for one iteration of the run; only its fields end up in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub title: String,
    /// Unique key of the stored record.
    pub url: String,
    pub source_domain: String,
}

/// Structured output of the classification service.
///
/// The contents are opaque to this crate; they are stored as JSON text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ClassificationResult(pub Map<String, Value>);

/// One row of the `articles` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub source_domain: String,
    pub title: String,
    pub url: String,
    pub scraped_text: String,
    /// Serialized classification, or `None` when classification failed.
    /// Stored as SQL `NULL`, never as the JSON text `null`.
    pub classification_json: Option<String>,
}

impl ArticleRecord {
    /// Build the row for `article`.
    ///
    /// # Arguments
    ///
    /// * `article` - The discovered article; supplies domain, title and URL
    /// * `scraped_text` - Paragraph text, possibly empty
    /// * `classification` - The service's result, or `None` when it failed
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the classification cannot be encoded.
    pub fn new(
        article: &ArticleRef,
        scraped_text: String,
        classification: Option<&ClassificationResult>,
    ) -> Result<Self, serde_json::Error> {
        let classification_json = classification.map(serde_json::to_string).transpose()?;
        Ok(Self {
            source_domain: article.source_domain.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            scraped_text,
            classification_json,
        })
    }
}

/// Body of a GDELT DOC `ArtList` response.
///
/// GDELT answers a query with no matches with `{}`, so `articles` defaults
/// to empty.
#[derive(Debug, Deserialize)]
pub struct ArtListResponse {
    #[serde(default)]
    pub articles: Vec<ArtListItem>,
}

/// One entry of an `ArtList` response. Only the fields this crate uses are
/// kept; all are optional on the wire.
#[derive(Debug, Deserialize)]
pub struct ArtListItem {
    pub url: Option<String>,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub seendate: Option<String>,
}

impl ArtListItem {
    /// Convert to an [`ArticleRef`].
    ///
    /// # Returns
    ///
    /// `None` for items without a URL or title, which are unusable. A
    /// missing domain falls back to the URL's host.
    pub fn into_article_ref(self) -> Option<ArticleRef> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        let title = self.title?;
        let source_domain = self
            .domain
            .filter(|d| !d.is_empty())
            .or_else(|| host_of(&url))
            .unwrap_or_default();
        Some(ArticleRef {
            title,
            url,
            source_domain,
        })
    }
}

/// Host of a URL without a leading `www.`.
fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}
