//! On-demand HTTP interface for EventFeed.
//!
//! `POST /api/events` runs one pipeline and answers with the events instead
//! of publishing them; `GET /health` reports liveness.

mod error;
mod routes;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::NaiveDate;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use eventfeed_core::PipelineDeps;
use eventfeed_shared::{EventFeedError, Result};

pub use error::{ApiError, ErrorResponse};
pub use routes::{EventsRequest, HealthResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub deps: PipelineDeps,
    /// Planning date override; `None` uses the local date per request.
    pub today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps, today: None }
    }

    /// Pin the planning date instead of reading the clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/events", post(routes::events))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| EventFeedError::Network(format!("failed to bind {addr}: {e}")))?;

    info!(addr, "event server listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| EventFeedError::Network(format!("server error: {e}")))
}
