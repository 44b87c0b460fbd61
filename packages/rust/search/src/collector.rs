//! Concurrent per-source search fan-out.
//!
//! All sources are searched at once and the collector waits for every one
//! of them. A failing or slow source contributes an empty list; it never
//! aborts the batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use eventfeed_shared::{
    EventFeedError, RawHit, Result, RetryPolicy, SourceConfig, SourceLabel, with_retry,
};

use crate::{SearchOptions, SearchProvider};

/// Settings shared by every per-source call.
#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    pub max_results: u32,
    /// Upper bound on one source's search, retries included.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// What one source contributed to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub label: SourceLabel,
    pub hits: usize,
    /// Error message if the source was folded to an empty result.
    pub error: Option<String>,
}

/// All hits in source order, plus a per-source breakdown.
#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    pub hits: Vec<RawHit>,
    pub sources: Vec<SourceReport>,
}

impl CollectOutcome {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Domain-scoped query: `site:<domain> ( <keywords> )`.
pub fn site_query(domain: &str, keywords: &str) -> String {
    format!("site:{domain} ( {keywords} )")
}

/// Search every source concurrently and concatenate the hits in source order.
#[instrument(skip_all, fields(sources = sources.len()))]
pub async fn collect(
    provider: Arc<dyn SearchProvider>,
    sources: &[SourceConfig],
    keywords: &str,
    options: &CollectOptions,
) -> CollectOutcome {
    let handles: Vec<_> = sources
        .iter()
        .map(|source| {
            let provider = Arc::clone(&provider);
            let query = site_query(&source.domain, keywords);
            let search_options = SearchOptions {
                max_results: options.max_results,
                search_depth: source.search_depth,
            };
            let options = *options;
            let label = source.label;

            debug!(source = %label, %query, "dispatching search");

            let handle = tokio::spawn(async move {
                search_source(provider.as_ref(), label, &query, &search_options, &options).await
            });
            (label, handle)
        })
        .collect();

    let mut outcome = CollectOutcome::default();

    for (label, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(EventFeedError::Search(format!("search task aborted: {e}"))),
        };
        let (hits, report) = fold_source_result(label, result);
        outcome.hits.extend(hits);
        outcome.sources.push(report);
    }

    info!(
        hits = outcome.hits.len(),
        failed_sources = outcome.failed_sources(),
        "search collection complete"
    );

    outcome
}

/// One source's search with timeout and retry.
async fn search_source(
    provider: &dyn SearchProvider,
    label: SourceLabel,
    query: &str,
    search_options: &SearchOptions,
    options: &CollectOptions,
) -> Result<Vec<RawHit>> {
    let attempt = with_retry(options.retry, label.as_str(), move || {
        provider.search(query, search_options)
    });

    match tokio::time::timeout(options.timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(EventFeedError::Network(format!(
            "search for {label} timed out after {}s",
            options.timeout.as_secs_f64()
        ))),
    }
}

/// Fold a source's result into hits, logging and discarding any error.
fn fold_source_result(label: SourceLabel, result: Result<Vec<RawHit>>) -> (Vec<RawHit>, SourceReport) {
    match result {
        Ok(hits) => {
            info!(source = %label, hits = hits.len(), "source searched");
            let report = SourceReport {
                label,
                hits: hits.len(),
                error: None,
            };
            (hits, report)
        }
        Err(e) => {
            warn!(source = %label, error = %e, "source search failed, continuing without it");
            let report = SourceReport {
                label,
                hits: 0,
                error: Some(e.to_string()),
            };
            (Vec::new(), report)
        }
    }
}
