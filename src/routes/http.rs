//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented with input sizes; failures become `{"erro": ...}`.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{AnswerVerdict, CodeEvaluation, LevelClassification, MultipleChoiceQuestion, Question};
use crate::error::{Result, TutorError};
use crate::logic::*;
use crate::protocol::*;
use crate::routes::ENDPOINTS;
use crate::state::AppState;

/// Body decoding failures are reported like every other input error.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
  payload
    .map(|Json(b)| b)
    .map_err(|e| TutorError::InputValidation(e.body_text()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let endpoints = ENDPOINTS
    .iter()
    .map(|(path, parse_mode)| EndpointOut { path: *path, parse_mode: *parse_mode })
    .collect();
  Json(HealthOut { ok: true, model: state.model.name().to_string(), endpoints })
}

#[instrument(level = "info", skip_all, fields(parse_mode = "structured"))]
pub async fn http_post_question(
  State(state): State<Arc<AppState>>,
  payload: std::result::Result<Json<QuestionIn>, JsonRejection>,
) -> Result<Json<Question>> {
  let b = body(payload)?;
  let q = generate_question(&state, &b.nivel, &b.conteudo).await?;
  info!(target: "tutor_backend", nivel = %b.nivel, "HTTP question served");
  Ok(Json(q))
}

#[instrument(level = "info", skip_all, fields(parse_mode = "structured"))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  payload: std::result::Result<Json<QuizIn>, JsonRejection>,
) -> Result<Json<MultipleChoiceQuestion>> {
  // The quiz needs no input; a request without a JSON body gets the defaults.
  let b = match payload {
    Err(JsonRejection::MissingJsonContentType(_)) => QuizIn::default(),
    other => body(other)?,
  };
  let q = generate_multiple_choice(&state, &b.nivel, &b.conteudo).await?;
  info!(target: "tutor_backend", nivel = %b.nivel, "HTTP quiz served");
  Ok(Json(q))
}

#[instrument(level = "info", skip_all, fields(parse_mode = "labeledLine"))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  payload: std::result::Result<Json<AnswerIn>, JsonRejection>,
) -> Result<Json<AnswerVerdict>> {
  let b = body(payload)?;
  let verdict = check_answer(&state, &b.questao, &b.alternativas, &b.resposta).await?;
  info!(target: "tutor_backend", correct = verdict.is_correct, "HTTP answer checked");
  Ok(Json(verdict))
}

#[instrument(level = "info", skip_all, fields(parse_mode = "labeledLine"))]
pub async fn http_post_code(
  State(state): State<Arc<AppState>>,
  payload: std::result::Result<Json<CodeIn>, JsonRejection>,
) -> Result<Json<CodeEvaluation>> {
  let b = body(payload)?;
  let evaluation = evaluate_code(&state, &b.codigo).await?;
  info!(target: "tutor_backend", correct = evaluation.is_correct, "HTTP code evaluated");
  Ok(Json(evaluation))
}

#[instrument(level = "info", skip_all, fields(parse_mode = "plainText"))]
pub async fn http_post_feedback(
  State(state): State<Arc<AppState>>,
  payload: std::result::Result<Json<CodeIn>, JsonRejection>,
) -> Result<Json<FeedbackOut>> {
  let b = body(payload)?;
  let feedback = give_feedback(&state, &b.codigo).await?;
  Ok(Json(FeedbackOut { feedback }))
}

#[instrument(level = "info", skip_all, fields(parse_mode = "labeledLine"))]
pub async fn http_post_level(
  State(state): State<Arc<AppState>>,
  payload: std::result::Result<Json<LevelIn>, JsonRejection>,
) -> Result<Json<LevelClassification>> {
  let b = body(payload)?;
  let classification = classify_level(&state, &b.resposta1, &b.resposta2, &b.resposta3).await?;
  Ok(Json(classification))
}
