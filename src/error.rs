//! Error kinds surfaced by the tutor operations and their HTTP rendering.
//!
//! Every failure is caught at the handler boundary and turned into
//! `{"erro": <message>}`; nothing here is allowed to take the process down.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::util::trunc_for_log;

pub type Result<T> = std::result::Result<T, TutorError>;

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
  /// Request rejected before any model call was made.
  #[error("Entrada inválida: {0}")]
  InputValidation(String),

  /// No model client is configured (missing API key).
  #[error("Modelo indisponível: nenhuma chave de API configurada")]
  ModelUnavailable,

  /// Transport failure, non-2xx status or empty completion from the model.
  #[error("Falha ao consultar o modelo: {0}")]
  ModelError(String),

  /// Model text was not valid JSON once fences/markup were removed.
  #[error("Resposta do modelo em formato inválido: {detail}")]
  MalformedModelOutput { detail: String, raw: String },

  /// Model text decoded but did not match the expected shape.
  #[error("Resposta do modelo fora do esquema esperado: {0}")]
  SchemaViolation(String),

  /// Submitted code exceeded the wall-clock budget and was killed.
  #[error("O código excedeu o tempo limite de {secs} segundos e foi interrompido. Verifique se há laços infinitos ou esperas por entrada.")]
  Timeout { secs: u64 },

  /// The submission could not be executed at all (spawn/IO failure).
  #[error("Falha ao executar o código: {0}")]
  ExecutionFailure(String),
}

impl TutorError {
  pub fn status(&self) -> StatusCode {
    match self {
      TutorError::InputValidation(_) => StatusCode::BAD_REQUEST,
      TutorError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      TutorError::ModelError(_)
      | TutorError::MalformedModelOutput { .. }
      | TutorError::SchemaViolation(_) => StatusCode::BAD_GATEWAY,
      TutorError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
      TutorError::ExecutionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for TutorError {
  fn into_response(self) -> Response {
    let status = self.status();
    match &self {
      TutorError::MalformedModelOutput { detail, raw } => {
        error!(target: "tutor_backend", %detail, raw = %trunc_for_log(raw, 400), "Model output could not be decoded");
      }
      TutorError::InputValidation(_) | TutorError::Timeout { .. } => {
        warn!(target: "tutor_backend", status = %status, error = %self, "Request failed");
      }
      _ => {
        error!(target: "tutor_backend", status = %status, error = %self, "Request failed");
      }
    }
    (status, Json(json!({ "erro": self.to_string() }))).into_response()
  }
}
