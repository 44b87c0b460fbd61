//! Web search collection for EventFeed.
//!
//! Every configured source site is searched once per run with a `site:`
//! scoped query. This crate provides:
//! - [`SearchProvider`]: the search capability seam
//! - [`TavilyClient`]: the hosted search API client
//! - [`collect`]: concurrent per-source fan-out with failure isolation
//! - [`dedupe_hits`]: merge hits across sources by link

mod collector;
mod dedup;
mod tavily;

use async_trait::async_trait;
use eventfeed_shared::{RawHit, Result, SearchDepth};

pub use collector::{CollectOptions, CollectOutcome, SourceReport, collect, site_query};
pub use dedup::dedupe_hits;
pub use tavily::TavilyClient;

/// Per-call options passed to a [`SearchProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Upper bound on returned hits.
    pub max_results: u32,
    pub search_depth: SearchDepth,
}

/// A web search capability.
///
/// Errors are opaque to callers: the collector treats any error as
/// "no results for this source".
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<RawHit>>;
}
