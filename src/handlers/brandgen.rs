use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use http::{header, HeaderValue, StatusCode};
use log::{debug, info, warn};

use crate::{
    cancellable_stream::create_cancellable_relay_stream,
    middleware::tracing::record_stream_id,
    services::openai::{relay_completion, RelayError},
    state::AppState,
    types::{BrandgenBody, GenerationRequest, ValidationError},
};

pub const STREAM_ID_HEADER: &str = "x-stream-id";

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // The caller only learns that generation failed.
        StatusCode::BAD_GATEWAY.into_response()
    }
}

/// `POST /api/brandgen`: validate, open the provider stream, then pipe its
/// text back as a chunked plain-text body.
pub async fn brandgen(
    State(state): State<AppState>,
    body: Result<Json<BrandgenBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Rejected brandgen body: {rejection}");
            return ValidationError::MissingField.into_response();
        }
    };

    let request = match GenerationRequest::try_from(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid brandgen request: {e}");
            return e.into_response();
        }
    };

    info!("Generating brands with {} personality", request.tone());

    let upstream = match state.openai.open_completion_stream(&request.prompt()).await {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!("Brand generation failed before streaming: {e}");
            return e.into_response();
        }
    };

    let stream_id = uuid::Uuid::new_v4().to_string();
    record_stream_id(&stream_id);
    debug!("Relaying completion as stream {stream_id}");

    let stream = create_cancellable_relay_stream(
        state.streams.clone(),
        stream_id.clone(),
        |tx, token| async move { relay_completion(upstream, tx, token).await },
    );

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&stream_id) {
        headers.insert(STREAM_ID_HEADER, value);
    }
    response
}
