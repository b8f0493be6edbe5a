//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::parse::ParseMode;
use crate::state::AppState;

pub mod http;

/// Model-backed endpoints and the parsing strategy each one applies.
pub const ENDPOINTS: &[(&str, ParseMode)] = &[
    ("/api/v1/gerar-questao", ParseMode::Structured),
    ("/api/v1/gerar-questionario", ParseMode::Structured),
    ("/api/v1/verificar-resposta", ParseMode::LabeledLine),
    ("/api/v1/corrigir-codigo", ParseMode::LabeledLine),
    ("/api/v1/dar-feedback", ParseMode::PlainText),
    ("/api/v1/classificar-nivel", ParseMode::LabeledLine),
];

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/gerar-questao", post(http::http_post_question))
        .route("/api/v1/gerar-questionario", post(http::http_post_quiz))
        .route("/api/v1/verificar-resposta", post(http::http_post_answer))
        .route("/api/v1/corrigir-codigo", post(http::http_post_code))
        .route("/api/v1/dar-feedback", post(http::http_post_feedback))
        .route("/api/v1/classificar-nivel", post(http::http_post_level))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
