//! Pipeline orchestration and domain logic for EventFeed.
//!
//! This crate ties search collection, context assembly, structured
//! extraction, normalization and publishing into one refresh run
//! (see [`refresh_events`]).

pub mod context;
pub mod normalize;
pub mod pipeline;
pub mod planner;
pub mod publish;

pub use context::assemble_context;
pub use normalize::{apply_venue_fallback, canonical_title, consolidate, normalize, retain_in_window, sort_events};
pub use pipeline::{
    PipelineDeps, ProgressReporter, RunReport, SilentProgress, collect_events, refresh_events,
};
pub use planner::plan_queries;
pub use publish::{PublishReport, publish};
