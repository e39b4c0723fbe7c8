use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{field, Instrument, Span};
use uuid::Uuid;

/// Wrap each request in a span carrying its method, uri and a fresh request id.
///
/// `stream_id` starts empty; the brandgen handler fills it in through
/// [`record_stream_id`] once the provider has accepted the request, so every
/// later line about that relay can be matched to the cancel endpoint's id.
pub async fn trace_requests(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
        stream_id = field::Empty,
    );

    async move {
        let response = next.run(request).await;
        tracing::info!(status = %response.status(), "request completed");
        response
    }
    .instrument(span)
    .await
}

pub fn record_stream_id(stream_id: &str) {
    Span::current().record("stream_id", field::display(stream_id));
}
