//! Conversation messages, stream deltas, and provider errors.
//!
//! Provider-neutral types shared by the live `OpenAI` client and the
//! simulator. Everything that flows between the gateway and a provider is
//! defined here.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by completion providers.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The provider credential is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the provider failed, or the stream broke mid-read.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// A provider stream chunk could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Closed set of conversation roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Assistant, Role::System];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == raw)
    }
}

/// A single turn in a conversation. Order within a conversation is turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), id: None }
    }
}

/// One incremental fragment of provider output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDelta {
    pub text: String,
    /// Set on the provider's terminal marker. Always the last item.
    pub is_final: bool,
}

impl TextDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_final: false }
    }

    #[must_use]
    pub fn end() -> Self {
        Self { text: String::new(), is_final: true }
    }
}

/// Lazy, single-pass sequence of deltas. Dropping it abandons the upstream read.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<TextDelta, LlmError>> + Send>>;

// =============================================================================
// COMPLETION PROVIDER TRAIT
// =============================================================================

/// Provider-neutral async trait for streaming completions. Enables mocking in tests.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a streaming completion for `messages`.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the provider rejects the request before any
    /// delta is produced. Failures after that surface as stream items.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<DeltaStream, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
