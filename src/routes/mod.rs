//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the chat endpoints, the document upload endpoint
//! and a health check. CORS is permissive and exposes the quota headers so
//! browser clients can read them.

pub mod chat;
pub mod documents;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rate_limit::{HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET]);

    Router::new()
        .route("/api/chat", post(chat::chat).layer(DefaultBodyLimit::max(chat::CHAT_BODY_LIMIT)))
        .route("/api/chat/mock", post(chat::chat_mock).layer(DefaultBodyLimit::max(chat::CHAT_BODY_LIMIT)))
        .route(
            "/api/documents/upload",
            post(documents::upload).layer(DefaultBodyLimit::max(documents::UPLOAD_BODY_LIMIT)),
        )
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
