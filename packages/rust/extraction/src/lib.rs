//! Structured event extraction with a hosted language model.
//!
//! The assembled search context is sent together with an instruction set and
//! a JSON schema derived from [`eventfeed_shared::Event`]; the reply is
//! deserialized into the typed contract and validated once at this boundary.
//!
//! - [`StructuredModel`]: the language-model capability seam
//! - [`OpenRouterClient`]: OpenAI-compatible chat completions client
//! - [`extract_events`]: prompt, call, parse, validate

mod extract;
mod openrouter;
mod prompt;
pub mod schema;

use async_trait::async_trait;
use eventfeed_shared::Result;

pub use extract::{Extraction, ExtractionResponse, ExtractionSettings, extract_events, parse_extraction};
pub use openrouter::OpenRouterClient;
pub use prompt::{system_prompt, user_prompt};

/// A request for schema-constrained output.
#[derive(Debug, Clone)]
pub struct StructuredPrompt {
    pub model: String,
    pub system: String,
    pub user: String,
    /// Name reported to the provider alongside the schema.
    pub schema_name: String,
    pub schema: serde_json::Value,
}

/// Raw model reply plus usage accounting.
#[derive(Debug, Clone, Default)]
pub struct StructuredCompletion {
    /// JSON text conforming (per the provider) to the requested schema.
    pub content: String,
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// A language model that can answer with JSON matching a schema.
///
/// Transport and provider failures are returned as errors; quota problems
/// should surface as [`eventfeed_shared::EventFeedError::QuotaExceeded`].
#[async_trait]
pub trait StructuredModel: Send + Sync {
    async fn complete_structured(&self, prompt: &StructuredPrompt) -> Result<StructuredCompletion>;
}
