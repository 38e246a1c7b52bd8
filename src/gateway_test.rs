use super::*;
use crate::error::ErrorKind;
use crate::llm::LlmClient;
use crate::llm::config::LlmConfig;
use crate::llm::simulated::REPLY_GREETING;
use crate::llm::types::{ChatMessage, Role};
use crate::rate_limit::RateLimitConfig;
use crate::transform::DOCUMENT_PREAMBLE;
use axum::http::StatusCode;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// =========================================================================
// Test doubles
// =========================================================================

enum Script {
    Deltas(Vec<&'static str>),
    FailStatus(u16),
    FailMidStream(&'static str),
    Panic,
}

struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    seen: Mutex<Vec<ChatMessage>>,
}

impl ScriptedProvider {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<DeltaStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = messages.to_vec();
        let items: Vec<Result<TextDelta, LlmError>> = match &self.script {
            Script::Deltas(parts) => parts
                .iter()
                .map(|p| Ok(TextDelta::text(*p)))
                .chain(std::iter::once(Ok(TextDelta::end())))
                .collect(),
            Script::FailStatus(status) => {
                return Err(LlmError::ApiResponse { status: *status, body: "upstream said no".into() });
            }
            Script::FailMidStream(first) => {
                vec![Ok(TextDelta::text(*first)), Err(LlmError::ApiRequest("connection reset".into()))]
            }
            Script::Panic => panic!("provider exploded"),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

fn gateway(provider: Arc<dyn CompletionProvider>, max_requests: u32) -> CompletionGateway {
    let limiter = RateLimiter::new(RateLimitConfig { max_requests, window_ms: 60_000 });
    CompletionGateway::new(limiter, provider, false)
}

fn chat_body(content: &str) -> Vec<u8> {
    serde_json::json!({ "messages": [{ "role": "user", "content": content }] })
        .to_string()
        .into_bytes()
}

fn expect_stream(outcome: Outcome) -> (OutboundStream, Quota) {
    match outcome {
        Outcome::Stream { body, quota } => (body, quota),
        Outcome::Error(env) => panic!("expected stream, got {env:?}"),
    }
}

fn expect_error(outcome: Outcome) -> ErrorEnvelope {
    match outcome {
        Outcome::Error(env) => env,
        Outcome::Stream { .. } => panic!("expected error envelope"),
    }
}

async fn drain(body: OutboundStream) -> Vec<Result<OutboundDelta, LlmError>> {
    body.collect().await
}

// =========================================================================
// End-to-end scenarios
// =========================================================================

#[tokio::test]
async fn greeting_streams_word_chunks_with_remaining_nine() {
    let mut config = LlmConfig::simulated();
    config.mock.word_delay_ms = 0;
    let provider = Arc::new(LlmClient::from_config(&config).unwrap());
    let gw = CompletionGateway::new(RateLimiter::default(), provider, false);
    let (body, quota) = expect_stream(gw.handle(&chat_body("Olá"), "203.0.113.7").await);
    assert_eq!(quota.limit, 10);
    assert_eq!(quota.remaining, 9);

    let deltas: Vec<OutboundDelta> = drain(body).await.into_iter().map(Result::unwrap).collect();
    let (last, words) = deltas.split_last().unwrap();
    assert!(last.end_of_stream);
    assert_eq!(words.len(), REPLY_GREETING.split(' ').count());
    assert_eq!(words.iter().map(|d| d.text.as_str()).collect::<String>(), REPLY_GREETING);
}

#[tokio::test]
async fn eleventh_request_is_rate_limited_without_provider_call() {
    let provider = ScriptedProvider::new(Script::Deltas(vec!["ok"]));
    let gw = gateway(provider.clone(), 10);

    for expected_remaining in (0..10).rev() {
        let (_, quota) = expect_stream(gw.handle(&chat_body("oi"), "10.0.0.1").await);
        assert_eq!(quota.remaining, expected_remaining);
    }
    let env = expect_error(gw.handle(&chat_body("oi"), "10.0.0.1").await);
    assert_eq!(env.kind, ErrorKind::RateLimited);
    assert_eq!(env.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(env.quota.map(|q| (q.limit, q.remaining)), Some((10, 0)));
    assert_eq!(provider.calls(), 10);
}

#[tokio::test]
async fn missing_messages_is_validation_error() {
    let provider = ScriptedProvider::new(Script::Deltas(vec!["ok"]));
    let gw = gateway(provider.clone(), 10);

    let env = expect_error(gw.handle(b"{}", "10.0.0.1").await);
    assert_eq!(env.kind, ErrorKind::ValidationError);
    assert_eq!(env.status, StatusCode::BAD_REQUEST);
    assert!(env.message.contains("messages"));
    assert_eq!(provider.calls(), 0);

    // Rejected before the quota check: the full quota is still available.
    let (_, quota) = expect_stream(gw.handle(&chat_body("oi"), "10.0.0.1").await);
    assert_eq!(quota.remaining, 9);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let provider = ScriptedProvider::new(Script::Deltas(vec![]));
    let gw = gateway(provider.clone(), 10);
    for raw in [&b"{not json"[..], b"", b"[1,"] {
        let env = expect_error(gw.handle(raw, "c").await);
        assert_eq!(env.kind, ErrorKind::BadRequest);
        assert_eq!(env.message, "Invalid JSON in request body");
    }
    assert_eq!(provider.calls(), 0);
}

// =========================================================================
// Pipeline behaviour
// =========================================================================

#[tokio::test]
async fn provider_receives_enhanced_conversation() {
    let provider = ScriptedProvider::new(Script::Deltas(vec!["ok"]));
    let gw = gateway(provider.clone(), 10);
    let body = serde_json::json!({ "messages": [
        { "role": "system", "content": "be brief" },
        { "role": "user", "content": "[Documento anexado: a.txt]\n\ntexto" },
    ] });
    let _ = expect_stream(gw.handle(body.to_string().as_bytes(), "c").await);

    let seen = provider.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ChatMessage::new(Role::System, "be brief"));
    assert!(seen[1].content.starts_with(DOCUMENT_PREAMBLE));
    assert!(seen[1].content.ends_with("[Documento anexado: a.txt]\n\ntexto"));
}

#[tokio::test]
async fn deltas_relayed_in_order_including_empty_ones() {
    let provider = ScriptedProvider::new(Script::Deltas(vec!["a", "", "b", "c"]));
    let gw = gateway(provider, 10);
    let (body, _) = expect_stream(gw.handle(&chat_body("oi"), "c").await);
    let out: Vec<OutboundDelta> = drain(body).await.into_iter().map(Result::unwrap).collect();
    let texts: Vec<&str> = out.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(texts, vec!["a", "", "b", "c", ""]);
    assert_eq!(out.iter().filter(|d| d.end_of_stream).count(), 1);
    assert!(out.last().unwrap().end_of_stream);
}

#[tokio::test]
async fn provider_failure_is_classified_and_counted_once() {
    let provider = ScriptedProvider::new(Script::FailStatus(401));
    let gw = gateway(provider.clone(), 2);

    let env = expect_error(gw.handle(&chat_body("oi"), "c").await);
    assert_eq!(env.kind, ErrorKind::ProviderError);
    assert_eq!(env.status, StatusCode::UNAUTHORIZED);
    assert!(!env.message.contains("upstream said no"));
    assert_eq!(provider.calls(), 1);

    // The failed request still consumed quota; no automatic retry happened.
    let env = expect_error(gw.handle(&chat_body("oi"), "c").await);
    assert_eq!(env.kind, ErrorKind::ProviderError);
    let env = expect_error(gw.handle(&chat_body("oi"), "c").await);
    assert_eq!(env.kind, ErrorKind::RateLimited);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn mid_stream_failure_terminates_after_flushed_fragments() {
    let provider = ScriptedProvider::new(Script::FailMidStream("parcial"));
    let gw = gateway(provider, 10);
    let (body, _) = expect_stream(gw.handle(&chat_body("oi"), "c").await);
    let out = drain(body).await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].as_ref().unwrap().text, "parcial");
    assert!(out[1].is_err());
}

#[tokio::test]
async fn panic_in_provider_becomes_internal_error() {
    let provider = ScriptedProvider::new(Script::Panic);
    let gw = gateway(provider, 10);
    let env = expect_error(gw.handle(&chat_body("oi"), "c").await);
    assert_eq!(env.kind, ErrorKind::InternalError);
    assert_eq!(env.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!env.message.contains("exploded"));
}

#[tokio::test]
async fn dev_mode_exposes_internal_detail() {
    let provider = ScriptedProvider::new(Script::Panic);
    let limiter = RateLimiter::default();
    let gw = CompletionGateway::new(limiter, provider, true);
    let env = expect_error(gw.handle(&chat_body("oi"), "c").await);
    assert!(env.message.contains("provider exploded"));
}

#[tokio::test]
async fn identifiers_have_independent_quotas() {
    let provider = ScriptedProvider::new(Script::Deltas(vec!["ok"]));
    let gw = gateway(provider, 1);
    let _ = expect_stream(gw.handle(&chat_body("oi"), "a").await);
    let _ = expect_error(gw.handle(&chat_body("oi"), "a").await);
    let (_, quota) = expect_stream(gw.handle(&chat_body("oi"), "b").await);
    assert_eq!(quota.remaining, 0);
}
