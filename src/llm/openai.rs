//! OpenAI-compatible streaming client.
//!
//! Talks to `/chat/completions` with `stream: true` and turns the
//! server-sent event body into [`TextDelta`]s as bytes arrive. Nothing is
//! buffered beyond the current partial line.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::LlmConfig;
use super::types::{ChatMessage, DeltaStream, LlmError, TextDelta};

const DONE_MARKER: &str = "[DONE]";

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .read_timeout(Duration::from_secs(config.timeouts.read_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Open a streaming completion. Resolves once response headers arrive.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ApiRequest`] on transport failure and
    /// [`LlmError::ApiResponse`] on a non-success status.
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<DeltaStream, LlmError> {
        let msgs: Vec<CcMessage<'_>> = messages.iter().map(CcMessage::from).collect();
        let body = CcRequest {
            model: &self.model,
            messages: &msgs,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        };
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| LlmError::ApiRequest(e.to_string()))?;
            return Err(LlmError::ApiResponse { status: status.as_u16(), body: text });
        }

        Ok(Box::pin(sse_deltas(response.bytes_stream())))
    }
}

// =============================================================================
// CHAT COMPLETIONS WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcRequest<'a> {
    model: &'a str,
    messages: &'a [CcMessage<'a>],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct CcMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for CcMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self { role: message.role.as_str(), content: &message.content }
    }
}

#[derive(Deserialize)]
struct CcChunk {
    #[serde(default)]
    choices: Vec<CcChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CcChoice {
    #[serde(default)]
    delta: CcDelta,
}

#[derive(Deserialize, Default)]
struct CcDelta {
    #[serde(default)]
    content: Option<String>,
}

// =============================================================================
// SSE DECODING
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Delta(TextDelta),
    Done,
}

/// Decode one SSE line. Blank lines, comments and non-`data` fields yield `None`.
fn parse_sse_line(line: &str) -> Result<Option<SseEvent>, LlmError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim_start();
    if payload == DONE_MARKER {
        return Ok(Some(SseEvent::Done));
    }

    let chunk: CcChunk = serde_json::from_str(payload).map_err(|e| LlmError::ApiParse(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(LlmError::ApiResponse { status: 500, body: error.to_string() });
    }
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();
    Ok(Some(SseEvent::Delta(TextDelta::text(text))))
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    buf: Vec<u8>,
    pending: VecDeque<Result<TextDelta, LlmError>>,
    finished: bool,
}

impl<S> SseState<S> {
    /// Drain complete lines out of `buf`. Stops at the first terminal event.
    fn drain_lines(&mut self) {
        while !self.finished {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                break;
            };
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            self.push_line(&String::from_utf8_lossy(&raw));
        }
    }

    fn push_line(&mut self, line: &str) {
        match parse_sse_line(line) {
            Ok(Some(SseEvent::Delta(delta))) => self.pending.push_back(Ok(delta)),
            Ok(Some(SseEvent::Done)) => {
                self.pending.push_back(Ok(TextDelta::end()));
                self.finished = true;
            }
            Ok(None) => {}
            Err(e) => {
                self.pending.push_back(Err(e));
                self.finished = true;
            }
        }
    }
}

/// Adapt a raw SSE byte stream into deltas, preserving upstream order 1:1.
pub(crate) fn sse_deltas<S, E>(bytes: S) -> impl Stream<Item = Result<TextDelta, LlmError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState { inner: Box::pin(bytes), buf: Vec::new(), pending: VecDeque::new(), finished: false };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.buf.extend_from_slice(&chunk);
                    state.drain_lines();
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(LlmError::ApiRequest(e.to_string())));
                    state.finished = true;
                }
                None => {
                    if !state.buf.is_empty() {
                        let rest = std::mem::take(&mut state.buf);
                        state.push_line(&String::from_utf8_lossy(&rest));
                    }
                    if !state.finished {
                        debug!("openai: stream closed without terminal marker");
                        state.pending.push_back(Ok(TextDelta::end()));
                        state.finished = true;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
