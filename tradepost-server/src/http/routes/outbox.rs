//! Relay polling endpoint

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::outbox::Envelope;

const DEFAULT_DRAIN: usize = 100;
const MAX_DRAIN: usize = 1000;

#[derive(Deserialize)]
pub struct DrainParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct DrainResponse {
    pub events: Vec<Envelope>,
    /// Events still queued after this batch
    pub remaining: usize,
}

/// GET /outbox?limit= - take the oldest queued side effects
async fn drain(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DrainParams>,
) -> Json<DrainResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_DRAIN).clamp(1, MAX_DRAIN);
    let events = state.outbox.drain(limit);
    if !events.is_empty() {
        tracing::debug!(count = events.len(), "outbox drained");
    }
    Json(DrainResponse {
        events,
        remaining: state.outbox.len(),
    })
}

/// Outbox routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/outbox", get(drain))
}
