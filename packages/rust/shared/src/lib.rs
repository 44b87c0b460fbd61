//! Shared types, error model, and configuration for EventFeed.
//!
//! This crate is the foundation depended on by all other EventFeed crates.
//! It provides:
//! - [`EventFeedError`]: the unified error type
//! - Domain types ([`Event`], [`Session`], [`RawHit`], [`EventCollection`])
//! - Configuration ([`AppConfig`], [`SourceConfig`], config loading, API keys)
//! - [`with_retry`]: bounded retry for provider calls

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiKeys, AppConfig, LlmConfig, OutputConfig, PipelineConfig, RetryConfig, SearchConfig,
    ServerConfig, SourceConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, render_default_config, resolve_api_keys,
};
pub use error::{EventFeedError, Result};
pub use retry::{RetryPolicy, with_retry};
pub use types::{
    Category, Event, EventCollection, QueryPlan, RawHit, RunId, SearchDepth, Session, SessionDates,
    SourceLabel, UNKNOWN_LOCATION, parse_event_date,
};
