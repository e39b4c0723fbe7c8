use axum::{middleware, routing::post, Router};

use crate::cancellable_stream::cancel_stream;
use crate::handlers::brandgen;
use crate::middleware::tracing::trace_requests;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/brandgen", post(brandgen))
        .route("/api/brandgen/{stream_id}/cancel", post(cancel_stream))
        .layer(middleware::from_fn(trace_requests))
        .with_state(state)
}
