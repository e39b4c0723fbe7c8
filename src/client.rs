use futures::StreamExt;
use log::{debug, error, info};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::session::{GenerationSession, Utf8ChunkDecoder};
use crate::types::{GenerationRequest, Tone, ValidationError};

pub const GENERIC_FAILURE: &str = "Something went wrong";
const STREAM_ID_HEADER: &str = "x-stream-id";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", GENERIC_FAILURE)]
    Upstream(Option<StatusCode>),

    #[error("Stream interrupted: {0}")]
    StreamRead(String),
}

/// Talks to a running relay and keeps a [`GenerationSession`] up to date.
#[derive(Clone)]
pub struct BrandClient {
    http: Client,
    base_url: String,
}

impl BrandClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Run one generation. `on_update` sees the session after every change:
    /// start, each chunk, the end, or a failure.
    ///
    /// Validation happens before anything is sent. On failure the session is
    /// marked failed but keeps whatever text had already arrived.
    pub async fn generate<F>(
        &self,
        session: &mut GenerationSession,
        description: &str,
        tone: Tone,
        mut on_update: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&GenerationSession),
    {
        session.reset();

        let request = match GenerationRequest::new(description, tone) {
            Ok(request) => request,
            Err(e) => {
                session.fail(e.to_string());
                on_update(session);
                return Err(e.into());
            }
        };

        session.begin();
        on_update(session);

        let response = self
            .http
            .post(format!("{}/api/brandgen", self.base_url))
            .json(&request.to_body())
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                error!("Relay answered {}", response.status());
                session.fail(GENERIC_FAILURE);
                on_update(session);
                return Err(ClientError::Upstream(Some(response.status())));
            }
            Err(e) => {
                error!("Failed to reach relay: {e}");
                session.fail(GENERIC_FAILURE);
                on_update(session);
                return Err(ClientError::Upstream(None));
            }
        };

        let stream_id = response
            .headers()
            .get(STREAM_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        session.set_stream_id(stream_id);

        let mut stream = response.bytes_stream();
        let mut decoder = Utf8ChunkDecoder::new();

        while let Some(item) = stream.next().await {
            match item {
                Ok(bytes) => {
                    let chunk = decoder.decode(&bytes);
                    if chunk.is_empty() {
                        continue;
                    }
                    session.push_chunk(&chunk);
                    on_update(session);
                }
                Err(e) => {
                    error!("Stream read failed: {e}");
                    session.push_chunk(&decoder.finish());
                    session.fail(format!("Stream interrupted: {e}"));
                    on_update(session);
                    return Err(ClientError::StreamRead(e.to_string()));
                }
            }
        }

        session.push_chunk(&decoder.finish());
        session.finish();
        on_update(session);
        info!("Generation finished with {} records", session.records().len());
        Ok(())
    }

    /// Ask the relay to stop an in-flight stream. Returns `false` when the
    /// relay no longer knows the stream.
    pub async fn cancel(&self, stream_id: &str) -> Result<bool, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/brandgen/{stream_id}/cancel", self.base_url))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach relay: {e}");
                ClientError::Upstream(None)
            })?;

        debug!("Cancel for {stream_id} answered {}", response.status());
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::Upstream(Some(status))),
        }
    }
}
