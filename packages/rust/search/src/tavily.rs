//! Tavily search API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use eventfeed_shared::{EventFeedError, RawHit, Result, SearchDepth};

use crate::{SearchOptions, SearchProvider};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("EventFeed/", env!("CARGO_PKG_VERSION"));

/// Longest error body echoed back in an error message.
const MAX_ERROR_BODY: usize = 300;

/// Tavily API request body.
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    max_results: u32,
}

/// Tavily API response body.
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// Individual search result from Tavily.
#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyResult> for RawHit {
    fn from(r: TavilyResult) -> Self {
        Self {
            link: r.url,
            title: r.title,
            snippet: r.content,
        }
    }
}

/// Client for `POST {base_url}/search`.
pub struct TavilyClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilyClient {
    /// Create a client against `base_url` (normally `https://api.tavily.com`).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| EventFeedError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    #[instrument(skip_all, fields(depth = options.search_depth.as_str()))]
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<RawHit>> {
        let url = format!("{}/search", self.base_url);
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: options.search_depth,
            max_results: options.max_results,
        };

        debug!(query, max_results = options.max_results, "sending search request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EventFeedError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(EventFeedError::Search(format!(
                "Tavily API error {status}: {body}"
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| EventFeedError::Search(format!("failed to parse Tavily response: {e}")))?;

        let hits: Vec<RawHit> = parsed.results.into_iter().map(RawHit::from).collect();
        debug!(hits = hits.len(), "search request complete");
        Ok(hits)
    }
}
