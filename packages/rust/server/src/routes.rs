//! Request handlers.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use eventfeed_core::{SilentProgress, collect_events};
use eventfeed_shared::EventCollection;

use crate::AppState;
use crate::error::ApiError;

/// Body of `POST /api/events`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventsRequest {
    /// Free-form request text. Logged only; planning is date-driven.
    #[serde(default)]
    pub prompt: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run one pipeline and return its events without publishing.
pub async fn events(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EventsRequest>,
) -> Result<Json<EventCollection>, ApiError> {
    debug!(prompt = %request.prompt, "on-demand event request");

    let (collection, report) = collect_events(&state.deps, state.today(), &SilentProgress).await?;

    info!(
        run_id = %report.run_id,
        events = collection.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "on-demand run complete"
    );

    Ok(Json(collection))
}
