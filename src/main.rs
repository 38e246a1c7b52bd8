use std::sync::Arc;

use chat_gateway::llm::LlmClient;
use chat_gateway::llm::config::LlmConfig;
use chat_gateway::rate_limit::RateLimitConfig;
use chat_gateway::{routes, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");
    let dev_mode = std::env::var("APP_ENV").is_ok_and(|v| v.trim().eq_ignore_ascii_case("development"));

    // Provider misconfiguration is fatal.
    let config = match LlmConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "LLM configuration invalid");
            std::process::exit(1);
        }
    };
    let llm = LlmClient::from_config(&config).expect("LLM client init failed");
    tracing::info!(model = llm.model(), simulated = llm.is_simulated(), "LLM client initialized");

    let simulator_config = LlmConfig { mock: config.mock, ..LlmConfig::simulated() };
    let simulator = LlmClient::from_config(&simulator_config).expect("simulator init failed");

    let limits = RateLimitConfig::from_env();
    tracing::info!(
        max_requests = limits.max_requests,
        window_ms = limits.window_ms,
        dev_mode,
        "rate limits configured"
    );

    let state = state::AppState::new(Arc::new(llm), Arc::new(simulator), limits, dev_mode);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "chat gateway listening");
    axum::serve(listener, app).await.expect("server failed");
}
