//! Lookup endpoint
//!
//! Accepts `{ cacheKey, title, artist }` and answers with the message
//! contract payload: `{ ok: true, data }` or `{ ok: false, error }`. Both are
//! returned with status 200; the payload carries the outcome.

use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use camkey_common::{LookupMessage, LookupResponse};

/// POST /lookup handler
pub async fn lookup(
    State(state): State<AppState>,
    Json(message): Json<LookupMessage>,
) -> Json<LookupResponse> {
    Json(state.queue.submit(message).await)
}

/// Build lookup routes
pub fn lookup_routes() -> Router<AppState> {
    Router::new().route("/lookup", post(lookup))
}
