//! Prompt, call, parse and validate.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use eventfeed_shared::{
    Event, EventFeedError, QueryPlan, Result, RetryPolicy, SourceConfig, with_retry,
};

use crate::prompt::{system_prompt, user_prompt};
use crate::schema::strict_schema;
use crate::{StructuredModel, StructuredPrompt};

/// Name the schema is registered under with the provider.
const SCHEMA_NAME: &str = "event_extraction";

/// Top-level shape the model must answer with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionResponse {
    pub events: Vec<Event>,
}

/// Per-run extraction settings.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionSettings<'a> {
    pub model: &'a str,
    pub sources: &'a [SourceConfig],
    pub retry: RetryPolicy,
}

/// Validated events plus token accounting.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub events: Vec<Event>,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Turn assembled search context into validated events.
///
/// An empty context returns no events without calling the model.
#[instrument(skip_all, fields(model = settings.model, context_chars = context.chars().count()))]
pub async fn extract_events(
    model: &dyn StructuredModel,
    settings: &ExtractionSettings<'_>,
    plan: &QueryPlan,
    context: &str,
) -> Result<Extraction> {
    if context.trim().is_empty() {
        info!("no search context, skipping extraction");
        return Ok(Extraction::default());
    }

    let schema = strict_schema::<ExtractionResponse>();
    debug!(schema = %schema, "extraction schema");

    let prompt = StructuredPrompt {
        model: settings.model.to_string(),
        system: system_prompt(plan, settings.sources),
        user: user_prompt(plan, context),
        schema_name: SCHEMA_NAME.to_string(),
        schema,
    };

    let prompt = &prompt;
    let completion = with_retry(settings.retry, "extraction", move || {
        model.complete_structured(prompt)
    })
    .await
    .map_err(EventFeedError::classify_provider)?;

    let events = parse_extraction(&completion.content)?;

    info!(
        events = events.len(),
        tokens_in = completion.tokens_in,
        tokens_out = completion.tokens_out,
        "extraction complete"
    );

    Ok(Extraction {
        events,
        tokens_in: completion.tokens_in,
        tokens_out: completion.tokens_out,
    })
}

/// Deserialize and validate a model reply.
///
/// Tolerates a Markdown code fence around the JSON. Any malformed or invalid
/// event fails the whole reply.
pub fn parse_extraction(content: &str) -> Result<Vec<Event>> {
    let json = strip_code_fence(content);

    let response: ExtractionResponse = serde_json::from_str(json)
        .map_err(|e| EventFeedError::Extraction(format!("model output does not match schema: {e}")))?;

    for (i, event) in response.events.iter().enumerate() {
        event
            .validate()
            .map_err(|e| EventFeedError::Extraction(format!("event #{}: {e}", i + 1)))?;
    }

    Ok(response.events)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
