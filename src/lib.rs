//! Streaming chat-completion gateway.
//!
//! Accepts a conversation over HTTP, validates it, enforces a per-client
//! quota, rewrites document-bearing turns, and relays the provider's reply
//! as a chunked plain-text stream. See [`gateway::CompletionGateway`].

pub mod error;
pub mod gateway;
pub mod llm;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod transform;
pub mod validate;
