//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! The chat route and the mock chat route share one limiter so a client's
//! quota covers both. The upload route counts against its own limiter with
//! the same configuration.

use std::sync::Arc;

use crate::gateway::CompletionGateway;
use crate::llm::CompletionProvider;
use crate::rate_limit::{RateLimitConfig, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    /// Pipeline bound to the configured provider.
    pub chat: Arc<CompletionGateway>,
    /// Same pipeline bound to the simulator.
    pub mock_chat: Arc<CompletionGateway>,
    pub upload_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        simulator: Arc<dyn CompletionProvider>,
        limits: RateLimitConfig,
        dev_mode: bool,
    ) -> Self {
        let chat_limiter = RateLimiter::new(limits);
        Self {
            chat: Arc::new(CompletionGateway::new(chat_limiter.clone(), provider, dev_mode)),
            mock_chat: Arc::new(CompletionGateway::new(chat_limiter, simulator, dev_mode)),
            upload_limiter: RateLimiter::new(limits),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
