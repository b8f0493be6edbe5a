//! Python Tutor Backend
//!
//! - Axum HTTP API that generates exercises, checks answers, reviews code and
//!   classifies learners by delegating to a hosted LLM
//! - Submitted code runs in a throwaway directory under a hard timeout
//!
//! Important env variables:
//!   PORT               : u16 (default 8000)
//!   OPENAI_API_KEY     : enables the model client if present
//!   OPENAI_BASE_URL    : default "https://api.openai.com/v1"
//!   OPENAI_MODEL       : default "gpt-4o-mini"
//!   MODEL_TIMEOUT_SECS : per-request model timeout (default 30)
//!   PYTHON_BIN         : interpreter for submissions (default "python3")
//!   RUN_TIMEOUT_SECS   : wall-clock limit per submission (default 5)
//!   TUTOR_CONFIG_PATH  : path to TOML config (prompt templates + runner limits)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod prompts;
mod model;
mod parse;
mod runner;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared, read-only application state (model client, runner, prompts).
  let state = Arc::new(AppState::from_env());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "tutor_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "tutor_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "tutor_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
