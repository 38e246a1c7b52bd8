//! Completion gateway: the chat request pipeline.
//!
//! DESIGN
//! ======
//! `handle` runs parse → validate → rate limit → transform → provider call,
//! short-circuiting to an [`ErrorEnvelope`] at the first failure. On success
//! the provider's deltas are relayed 1:1 as [`OutboundDelta`]s without
//! buffering. Once the first delta is out, an upstream failure can only end
//! the stream abnormally; the status line has already been sent.
//!
//! Exactly one limiter mutation happens per request that reaches the quota
//! check, and exactly one provider call per request that reaches step 5.
//! Nothing is retried.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::error::{ErrorEnvelope, GatewayError, respond};
use crate::llm::types::{CompletionProvider, DeltaStream, LlmError, TextDelta};
use crate::rate_limit::{Quota, RateLimiter};
use crate::{transform, validate};

// =============================================================================
// TYPES
// =============================================================================

/// One fragment written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDelta {
    pub text: String,
    pub end_of_stream: bool,
}

impl From<TextDelta> for OutboundDelta {
    fn from(delta: TextDelta) -> Self {
        Self { text: delta.text, end_of_stream: delta.is_final }
    }
}

pub type OutboundStream = Pin<Box<dyn Stream<Item = Result<OutboundDelta, LlmError>> + Send>>;

pub enum Outcome {
    Stream { body: OutboundStream, quota: Quota },
    Error(ErrorEnvelope),
}

// =============================================================================
// GATEWAY
// =============================================================================

pub struct CompletionGateway {
    limiter: RateLimiter,
    provider: Arc<dyn CompletionProvider>,
    dev_mode: bool,
}

impl CompletionGateway {
    #[must_use]
    pub fn new(limiter: RateLimiter, provider: Arc<dyn CompletionProvider>, dev_mode: bool) -> Self {
        Self { limiter, provider, dev_mode }
    }

    /// Run one chat request from raw body bytes. Never panics outward.
    pub async fn handle(&self, raw_body: &[u8], client_id: &str) -> Outcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("chat", %request_id, %client_id);

        let result = AssertUnwindSafe(self.run(raw_body, client_id, request_id))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|panic| Err(GatewayError::Internal(panic_message(panic.as_ref()))));

        span.in_scope(|| match result {
            Ok((body, quota)) => {
                info!(remaining = quota.remaining, "gateway: streaming response");
                Outcome::Stream { body, quota }
            }
            Err(err) => Outcome::Error(respond(&err, self.dev_mode)),
        })
    }

    async fn run(
        &self,
        raw_body: &[u8],
        client_id: &str,
        request_id: Uuid,
    ) -> Result<(OutboundStream, Quota), GatewayError> {
        let body: Value = serde_json::from_slice(raw_body).map_err(|e| GatewayError::BadRequest(e.to_string()))?;
        let conversation = validate::parse_request(&body)?;

        // No await between here and the limiter returning.
        let quota = self.limiter.check_limit(client_id)?;

        let conversation = transform::enhance(conversation);
        info!(messages = conversation.len(), "gateway: invoking provider");
        let upstream = self.provider.stream(&conversation).await?;

        Ok((relay(upstream, request_id), quota))
    }
}

/// Map provider deltas to outbound deltas, order and count preserved.
fn relay(upstream: DeltaStream, request_id: Uuid) -> OutboundStream {
    Box::pin(upstream.map(move |item| match item {
        Ok(delta) => Ok(OutboundDelta::from(delta)),
        Err(e) => {
            warn!(%request_id, error = %e, "gateway: upstream failed mid-stream");
            Err(e)
        }
    }))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in request pipeline".to_string()
    }
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
