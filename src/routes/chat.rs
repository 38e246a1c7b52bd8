//! Chat completion routes.
//!
//! Both handlers read the body as raw bytes so malformed JSON is classified
//! by the gateway rather than rejected by an extractor. A body the extractor
//! still refuses (size cap, broken transfer) gets the same JSON envelope as
//! every other failure. A successful outcome is written as a chunked
//! `text/plain` body, one frame per delta.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use crate::error::{GatewayError, respond};
use crate::gateway::{CompletionGateway, Outcome};
use crate::rate_limit::client_identifier;
use crate::state::AppState;
use crate::validate::{MAX_MESSAGE_LENGTH, MAX_MESSAGES};

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Request body cap for the chat routes. Fits the largest valid conversation
/// even when every character is sent as a 12-byte surrogate-pair escape,
/// plus room for the JSON framing around each message.
pub const CHAT_BODY_LIMIT: usize = MAX_MESSAGES * MAX_MESSAGE_LENGTH * 12 + 64 * 1024;

/// `POST /api/chat`: stream a completion from the configured provider.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    stream_completion(&state.chat, &headers, body).await
}

/// `POST /api/chat/mock`: same pipeline, always answered by the simulator.
pub async fn chat_mock(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    stream_completion(&state.mock_chat, &headers, body).await
}

async fn stream_completion(
    gateway: &CompletionGateway,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return respond(&GatewayError::BodyRejected(rejection.body_text()), false).into_response();
        }
    };
    let client_id = client_identifier(headers);
    match gateway.handle(&body, &client_id).await {
        Outcome::Stream { body, quota } => {
            // An Err item aborts the chunked body; fragments already written stay delivered.
            let frames = body.map(|item| item.map(|delta| Bytes::from(delta.text)));
            (quota.headers(), [(CONTENT_TYPE, TEXT_PLAIN_UTF8)], Body::from_stream(frames)).into_response()
        }
        Outcome::Error(envelope) => envelope.into_response(),
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
