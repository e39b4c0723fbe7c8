use axum::body::Bytes;
use futures::StreamExt;
use log::{debug, error, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;

pub const MAX_TOKENS: u32 = 3400;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to reach the completion provider: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Completion provider returned {0}")]
    UpstreamStatus(StatusCode),

    #[error("Completion stream broke off: {0}")]
    StreamRead(String),
}

/// Request body for the provider's streaming completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub max_tokens: u32,
    pub stream: bool,
    pub n: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    Text(String),
    Done,
}

/// Turns the provider's server-sent event body into text deltas.
///
/// Network chunks do not line up with event lines, so incomplete lines are
/// kept until their newline arrives.
#[derive(Debug, Default)]
pub struct CompletionEventDecoder {
    buffer: Vec<u8>,
    seen_text: bool,
}

impl CompletionEventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<CompletionEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = self.decode_line(&line) {
                let done = event == CompletionEvent::Done;
                events.push(event);
                if done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }

    /// Decode a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<CompletionEvent> {
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<CompletionEvent> {
        let line = String::from_utf8_lossy(raw);
        let data = line.trim().strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            return Some(CompletionEvent::Done);
        }

        let parsed: Value = match serde_json::from_str(data) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping unparsable completion event: {e}");
                return None;
            }
        };
        let text = parsed["choices"][0]["text"].as_str()?;

        // The provider tends to open with bare newlines before any content.
        if !self.seen_text && text.trim_matches(|c: char| c == '\n' || c == '\r').is_empty() {
            return None;
        }
        if text.is_empty() {
            return None;
        }
        self.seen_text = true;
        Some(CompletionEvent::Text(text.to_string()))
    }
}

#[derive(Clone)]
pub struct OpenAIService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIService {
    pub fn new(config: &ProviderConfig) -> Self {
        OpenAIService {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }

    pub fn completion_payload(&self, prompt: &str) -> CompletionPayload {
        CompletionPayload {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: MAX_TOKENS,
            stream: true,
            n: 1,
        }
    }

    /// Send the completion request and return the response once its status
    /// is known to be a success. The body is left unread.
    pub async fn open_completion_stream(&self, prompt: &str) -> Result<Response, RelayError> {
        let url = format!("{}/completions", self.base_url);
        debug!("Sending completion request to {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.completion_payload(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Completion provider rejected request with status {status}");
            return Err(RelayError::UpstreamStatus(status));
        }
        Ok(response)
    }
}

/// Read the provider body and forward each text delta, in order, to `tx`.
///
/// Returns when the provider signals the end, the body ends, the receiver
/// goes away or `cancel_token` fires.
pub async fn relay_completion(
    response: Response,
    tx: mpsc::Sender<Result<Bytes, RelayError>>,
    cancel_token: CancellationToken,
) -> Result<(), RelayError> {
    let mut stream = response.bytes_stream();
    let mut decoder = CompletionEventDecoder::new();
    let mut forwarded = 0usize;

    loop {
        let item = tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Completion relay cancelled after {forwarded} chunks");
                return Ok(());
            }
            item = stream.next() => item,
        };

        let (events, body_ended) = match item {
            Some(Ok(bytes)) => (decoder.push(&bytes), false),
            Some(Err(e)) => {
                error!("Failed to read completion stream: {e}");
                let _ = tx.send(Err(RelayError::StreamRead(e.to_string()))).await;
                return Err(RelayError::StreamRead(e.to_string()));
            }
            None => (decoder.finish().into_iter().collect(), true),
        };

        for event in events {
            match event {
                CompletionEvent::Text(text) => {
                    if tx.send(Ok(Bytes::from(text))).await.is_err() {
                        debug!("Relay receiver dropped, stopping");
                        return Ok(());
                    }
                    forwarded += 1;
                }
                CompletionEvent::Done => {
                    debug!("Completion stream finished after {forwarded} chunks");
                    return Ok(());
                }
            }
        }

        if body_ended {
            debug!("Completion body ended without [DONE] after {forwarded} chunks");
            return Ok(());
        }
    }
}
