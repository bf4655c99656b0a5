//! Client for the text-classification service.
//!
//! The service is a black box: it takes `{"text", "tier"}` as JSON and
//! answers 200 with a JSON object. Classification is best-effort. Any failure
//! comes back as a [`ClassifyError`] and the runner stores the article with a
//! null classification.
//!
//! Each article gets exactly one request, with a 20 second timeout.

use crate::error::ClassifyError;
use crate::models::ClassificationResult;
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(20);

/// Path appended to the configured base URL.
pub const CLASSIFY_PATH: &str = "/v1/classify";

/// Tier used when none is configured.
pub const DEFAULT_TIER: &str = "fast";

/// Anything that can annotate article text.
pub trait Classifier {
    /// Classify `text` at the given service `tier`.
    ///
    /// # Returns
    ///
    /// The service's JSON object, kept as-is.
    ///
    /// # Errors
    ///
    /// A [`ClassifyError`] for a missing endpoint, a non-200 status, a
    /// timeout, a network fault, or a body that is not a JSON object. The
    /// article is then stored unclassified.
    async fn classify(&self, text: &str, tier: &str) -> Result<ClassificationResult, ClassifyError>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    tier: &'a str,
}

/// HTTP implementation of [`Classifier`].
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    /// `None` when the deployment has no classification service configured.
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl HttpClassifier {
    /// Create a classifier with the standard 20 second timeout.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full classification URL, see [`resolve_endpoint`]
    /// * `api_key` - Sent as a bearer token when present and non-empty
    ///
    /// # Errors
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(endpoint, api_key, CLASSIFY_TIMEOUT)
    }

    /// Like [`HttpClassifier::new`] with a custom per-request `timeout`.
    pub fn with_timeout(
        endpoint: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// The resolved endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

/// Resolve the endpoint: a direct URL wins, otherwise `<base>/v1/classify`.
pub fn resolve_endpoint(base_url: Option<&str>, direct_url: Option<&str>) -> Option<String> {
    if let Some(url) = direct_url.filter(|u| !u.is_empty()) {
        return Some(url.to_string());
    }
    base_url
        .filter(|b| !b.is_empty())
        .map(|b| format!("{}{}", b.trim_end_matches('/'), CLASSIFY_PATH))
}

impl Classifier for HttpClassifier {
    #[instrument(level = "info", skip_all, fields(%tier, text_len = text.len()))]
    async fn classify(&self, text: &str, tier: &str) -> Result<ClassificationResult, ClassifyError> {
        let endpoint = self.endpoint.as_deref().ok_or(ClassifyError::NotConfigured)?;

        let t0 = Instant::now();
        let mut request = self.client.post(endpoint).json(&ClassifyRequest { text, tier });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Classification rejected");
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let result = response
            .json::<ClassificationResult>()
            .await
            .map_err(|e| if e.is_timeout() { ClassifyError::Timeout } else { ClassifyError::Decode(e) })?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, ?result, "Classified article");
        Ok(result)
    }
}
