use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use futures::stream::Stream;
use log::{error, info};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::services::openai::RelayError;

/// Response body of one relay. Dropping it (the client hung up) cancels the
/// task that feeds it.
pub struct RelayStream {
    receiver: mpsc::Receiver<Result<Bytes, RelayError>>,
    cancel_token: CancellationToken,
}

impl Stream for RelayStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel_token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// In-flight relays by stream id.
#[derive(Clone, Default)]
pub struct StreamRegistry {
    cancel_tokens: Arc<dashmap::DashMap<String, CancellationToken>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_stream(&self, id: String) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancel_tokens.insert(id, token.clone());
        token
    }

    /// Returns `false` when no stream with that id is running.
    pub fn cancel_stream(&self, id: &str) -> bool {
        match self.cancel_tokens.remove(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove_stream(&self, id: &str) {
        self.cancel_tokens.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cancel_tokens.contains_key(id)
    }
}

/// Spawn `process_fn` feeding a fresh channel and return the stream draining
/// it. The registry entry is dropped once `process_fn` returns.
pub fn create_cancellable_relay_stream<F, Fut>(
    registry: StreamRegistry,
    stream_id: String,
    process_fn: F,
) -> RelayStream
where
    F: FnOnce(mpsc::Sender<Result<Bytes, RelayError>>, CancellationToken) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), RelayError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(100);
    let cancel_token = registry.register_stream(stream_id.clone());

    let task_token = cancel_token.clone();

    tokio::spawn(async move {
        let result = process_fn(tx, task_token).await;
        if let Err(e) = result {
            error!("Error in relay stream {stream_id}: {e}");
        }
        registry.remove_stream(&stream_id);
    });

    RelayStream {
        receiver: rx,
        cancel_token,
    }
}

pub async fn cancel_stream(
    State(registry): State<StreamRegistry>,
    Path(stream_id): Path<String>,
) -> (StatusCode, &'static str) {
    if registry.cancel_stream(&stream_id) {
        info!("Cancelled stream: {stream_id}");
        (StatusCode::OK, "Stream cancelled")
    } else {
        (StatusCode::NOT_FOUND, "No such stream")
    }
}
