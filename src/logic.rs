//! Tutor operations shared by the HTTP handlers.
//!
//! Each operation validates its input, renders a prompt, makes exactly one
//! model call, and parses the reply with the strategy fixed for it:
//!   - questions and quizzes: structured (JSON + schema)
//!   - answer checks and level classification: labeled lines
//!   - code evaluation: labeled sections + sandboxed run
//!   - feedback: plain text

use tracing::{debug, info, instrument};

use crate::domain::{AnswerVerdict, Choice, CodeEvaluation, LevelClassification, MultipleChoiceQuestion, Question};
use crate::error::{Result, TutorError};
use crate::parse::{
  format_plain, model_flags_incorrect, parse_labeled_sections, parse_labeled_verdict, parse_level,
  parse_structured, CORRECTION_LABELS, IMPROVEMENT_LABELS, SUMMARY_LABELS,
};
use crate::prompts;
use crate::runner::ExecutionOutcome;
use crate::state::AppState;
use crate::util::trunc_for_log;

fn require(cond: bool, what: &str) -> Result<()> {
  if cond { Ok(()) } else { Err(TutorError::InputValidation(what.to_string())) }
}

fn non_blank(items: &[String]) -> bool {
  items.iter().any(|s| !s.trim().is_empty())
}

#[instrument(level = "info", skip(state, topics), fields(%difficulty, topics = topics.len()))]
pub async fn generate_question(state: &AppState, difficulty: &str, topics: &[String]) -> Result<Question> {
  require(non_blank(topics), "a lista de conteúdos não pode ser vazia")?;
  let prompt = prompts::question_prompt(&state.prompts, difficulty, topics);
  let raw = state.model.complete(&prompt).await?;
  debug!(target: "tutor_backend", raw = %trunc_for_log(&raw, 300), "Question reply");
  let q: Question = parse_structured(&raw)?;
  info!(target: "tutor_backend", title = %q.title, has_example = q.example.is_some(), "Question generated");
  Ok(q)
}

#[instrument(level = "info", skip(state, topics), fields(%difficulty, topics = topics.len()))]
pub async fn generate_multiple_choice(state: &AppState, difficulty: &str, topics: &[String]) -> Result<MultipleChoiceQuestion> {
  let prompt = prompts::multiple_choice_prompt(&state.prompts, difficulty, topics);
  let raw = state.model.complete(&prompt).await?;
  debug!(target: "tutor_backend", raw = %trunc_for_log(&raw, 300), "Quiz reply");
  let q: MultipleChoiceQuestion = parse_structured(&raw)?;
  info!(target: "tutor_backend", correct = %q.correct_answer, "Quiz question generated");
  Ok(q)
}

/// Expand a bare letter ("B") into the matching alternative ("B) 2") so the
/// model sees what was actually chosen.
fn describe_answer(alternatives: &[String], answer: &str) -> String {
  let Some(choice) = Choice::from_answer(answer) else {
    return answer.trim().to_string();
  };
  alternatives
    .iter()
    .find(|alt| Choice::from_answer(alt) == Some(choice))
    .map(|alt| alt.trim().to_string())
    .unwrap_or_else(|| answer.trim().to_string())
}

#[instrument(level = "info", skip(state, statement, alternatives, answer), fields(statement_len = statement.len(), alternatives = alternatives.len(), answer_len = answer.len()))]
pub async fn check_answer(state: &AppState, statement: &str, alternatives: &[String], answer: &str) -> Result<AnswerVerdict> {
  require(!statement.trim().is_empty(), "o enunciado da questão é obrigatório")?;
  require(non_blank(alternatives), "a lista de alternativas não pode ser vazia")?;
  require(!answer.trim().is_empty(), "a resposta é obrigatória")?;

  let chosen = describe_answer(alternatives, answer);
  let prompt = prompts::answer_check_prompt(&state.prompts, statement, alternatives, &chosen);
  let raw = state.model.complete(&prompt).await?;
  let verdict = parse_labeled_verdict(&raw);
  info!(target: "tutor_backend", correct = verdict.is_correct, has_message = !verdict.explanation.is_empty(), "Answer checked");
  Ok(verdict)
}

/// Review by the model and execution run side by side, then combined:
/// the submission is correct only if it exits with status 0 AND the model's
/// summary carries no negation token.
#[instrument(level = "info", skip(state, code), fields(code_len = code.len()))]
pub async fn evaluate_code(state: &AppState, code: &str) -> Result<CodeEvaluation> {
  require(!code.trim().is_empty(), "o código enviado está vazio")?;

  let prompt = prompts::code_review_prompt(&state.prompts, code);
  let (review, run) = tokio::join!(state.model.complete(&prompt), state.runner.run(code));
  let outcome = run?;
  let review = review?;

  let evaluation = combine(&review, &outcome);
  info!(target: "tutor_backend", exit_code = ?outcome.exit_code, elapsed = ?outcome.elapsed, correct = evaluation.is_correct, "Code evaluated");
  Ok(evaluation)
}

fn combine(review: &str, outcome: &ExecutionOutcome) -> CodeEvaluation {
  let sections = parse_labeled_sections(review, &[SUMMARY_LABELS, CORRECTION_LABELS, IMPROVEMENT_LABELS]);
  let mut parts = sections.into_iter();
  let summary = parts.next().unwrap_or_default();
  let model_correction = parts.next().unwrap_or_default();
  let improvements = parts.next().unwrap_or_default();

  // Unlabeled replies are kept whole as the summary.
  let summary = if summary.is_empty() { format_plain(review) } else { summary };

  let correction = if outcome.succeeded() {
    model_correction
  } else {
    let mut failure = outcome.stderr.trim().to_string();
    if failure.is_empty() {
      failure = match outcome.exit_code {
        Some(code) => format!("O programa terminou com código de saída {code}."),
        None => "O programa foi encerrado por um sinal.".to_string(),
      };
    }
    if model_correction.is_empty() { failure } else { format!("{failure}\n\n{model_correction}") }
  };

  CodeEvaluation {
    is_correct: outcome.succeeded() && !model_flags_incorrect(&summary),
    summary,
    correction,
    improvements,
    output: outcome.stdout.trim_end().to_string(),
  }
}

#[instrument(level = "info", skip(state, code), fields(code_len = code.len()))]
pub async fn give_feedback(state: &AppState, code: &str) -> Result<String> {
  require(!code.trim().is_empty(), "o código enviado está vazio")?;
  let prompt = prompts::feedback_prompt(&state.prompts, code);
  let raw = state.model.complete(&prompt).await?;
  Ok(format_plain(&raw))
}

#[instrument(level = "info", skip_all, fields(a1_len = knowledge.len(), a2_len = languages.len(), a3_len = goal.len()))]
pub async fn classify_level(state: &AppState, knowledge: &str, languages: &str, goal: &str) -> Result<LevelClassification> {
  require(
    [knowledge, languages, goal].iter().any(|s| !s.trim().is_empty()),
    "ao menos uma das respostas deve ser preenchida",
  )?;
  let prompt = prompts::level_prompt(&state.prompts, knowledge, languages, goal);
  let raw = state.model.complete(&prompt).await?;
  let classification = parse_level(&raw)?;
  info!(target: "tutor_backend", level = ?classification.level, "Level classified");
  Ok(classification)
}
