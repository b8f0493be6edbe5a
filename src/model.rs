//! Model client: one prompt in, raw completion text out.
//!
//! `TextModel` is the seam the rest of the crate depends on. `OpenAi` talks to
//! an OpenAI-compatible chat.completions endpoint; `Unconfigured` stands in
//! when no API key is present so the service can still start.
//!
//! Calls are instrumented and log model names, latencies, and response sizes
//! (not contents). We never log the API key.
//!
//! No retry and no streaming: each call is one stateless request whose
//! failure is surfaced as-is.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::{Result, TutorError};

#[async_trait]
pub trait TextModel: Send + Sync {
  /// Send a single prompt, get the completion text back.
  async fn complete(&self, prompt: &str) -> Result<String>;

  /// Human-readable identifier for logs and the health endpoint.
  fn name(&self) -> &str;
}

#[derive(Clone)]
pub struct OpenAi {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
}

impl OpenAi {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let timeout_secs = std::env::var("MODEL_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .filter(|s| *s > 0)
      .unwrap_or(30);

    match Self::new(api_key, base_url, model, Duration::from_secs(timeout_secs)) {
      Ok(oa) => Some(oa),
      Err(e) => {
        error!(target: "tutor_backend", error = %e, "Failed to build HTTP client for the model");
        None
      }
    }
  }

  /// The client-level timeout aborts the request outright once it expires.
  pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| TutorError::ModelError(e.to_string()))?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model, temperature: 0.7 })
  }
}

#[async_trait]
impl TextModel for OpenAi {
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(&self, prompt: &str) -> Result<String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      temperature: self.temperature,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "tutor-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| {
        error!(elapsed = ?start.elapsed(), error = %e, "Model request failed");
        TutorError::ModelError(if e.is_timeout() { "tempo limite da requisição ao modelo excedido".into() } else { e.to_string() })
      })?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "Model returned an error status");
      return Err(TutorError::ModelError(format!("HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| TutorError::ModelError(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Model usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default().trim().to_string();

    if text.is_empty() {
      return Err(TutorError::ModelError("resposta vazia do modelo".into()));
    }
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");
    Ok(text)
  }

  fn name(&self) -> &str {
    &self.model
  }
}

/// Placeholder used when no API key is configured.
pub struct Unconfigured;

#[async_trait]
impl TextModel for Unconfigured {
  async fn complete(&self, _prompt: &str) -> Result<String> {
    Err(TutorError::ModelUnavailable)
  }

  fn name(&self) -> &str {
    "unconfigured"
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_provider_error_message() {
    let body = r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[test]
  fn base_url_trailing_slash_is_trimmed() {
    let oa = OpenAi::new("k".into(), "http://localhost:9/v1/".into(), "m".into(), Duration::from_secs(1)).unwrap();
    assert_eq!(oa.base_url, "http://localhost:9/v1");
    assert_eq!(oa.name(), "m");
  }

  #[tokio::test]
  async fn unconfigured_model_is_unavailable() {
    assert!(matches!(Unconfigured.complete("oi").await, Err(TutorError::ModelUnavailable)));
  }

  #[tokio::test]
  async fn unreachable_endpoint_is_model_error() {
    // Port 9 (discard) is closed on CI machines; connection is refused quickly.
    let oa = OpenAi::new("k".into(), "http://127.0.0.1:9".into(), "m".into(), Duration::from_secs(2)).unwrap();
    assert!(matches!(oa.complete("oi").await, Err(TutorError::ModelError(_))));
  }
}
