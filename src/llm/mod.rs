//! Completion provider capability for the chat gateway.
//!
//! DESIGN
//! ======
//! The gateway only sees [`CompletionProvider`]. `LlmClient` is the concrete
//! implementation chosen once at startup: either the live `OpenAI` streaming
//! client or the deterministic simulator, selected by [`LlmConfig`].

pub mod config;
pub mod openai;
pub mod simulated;
pub mod types;

use config::{LlmConfig, LlmProviderKind};
pub use types::CompletionProvider;
use types::{ChatMessage, DeltaStream, LlmError};

// =============================================================================
// CLIENT DISPATCH
// =============================================================================

/// Concrete completion provider that dispatches to `OpenAI` or the simulator.
pub struct LlmClient {
    inner: LlmProvider,
    model: String,
}

enum LlmProvider {
    OpenAi(openai::OpenAiClient),
    Simulated(simulated::SimulatedClient),
}

impl LlmClient {
    /// Build a client from environment variables. See [`LlmConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns an error if the live provider is selected but misconfigured.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env()?;
        Self::from_config(&config)
    }

    /// Build a client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let inner = match config.provider {
            LlmProviderKind::OpenAi => LlmProvider::OpenAi(openai::OpenAiClient::new(config)?),
            LlmProviderKind::Simulated => LlmProvider::Simulated(simulated::SimulatedClient::new(config.mock)),
        };
        Ok(Self { inner, model: config.model.clone() })
    }

    /// Return the configured model name (e.g. `"gpt-3.5-turbo"`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self.inner, LlmProvider::Simulated(_))
    }
}

#[async_trait::async_trait]
impl CompletionProvider for LlmClient {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<DeltaStream, LlmError> {
        match &self.inner {
            LlmProvider::OpenAi(c) => c.stream(messages).await,
            LlmProvider::Simulated(c) => c.stream(messages).await,
        }
    }
}
