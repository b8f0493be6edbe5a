//! Prompt construction. Pure string rendering over `config::Prompts`.
//!
//! No validation happens here: empty or odd inputs are interpolated verbatim.
//! The output contracts (JSON keys, line labels) live in the templates and are
//! hints to the model only; the parsers validate independently.

use crate::config::Prompts;
use crate::util::fill_template;

/// Topic used when a quiz is requested without content.
pub const DEFAULT_QUIZ_TOPIC: &str = "algoritmos";

fn join_topics(topics: &[String]) -> String {
  topics
    .iter()
    .map(|t| t.trim())
    .filter(|t| !t.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn question_prompt(prompts: &Prompts, difficulty: &str, topics: &[String]) -> String {
  fill_template(
    &prompts.question_template,
    &[("nivel", difficulty), ("conteudo", &join_topics(topics))],
  )
}

pub fn multiple_choice_prompt(prompts: &Prompts, difficulty: &str, topics: &[String]) -> String {
  let joined = join_topics(topics);
  let content = if joined.is_empty() { DEFAULT_QUIZ_TOPIC } else { joined.as_str() };
  fill_template(
    &prompts.multiple_choice_template,
    &[("nivel", difficulty), ("conteudo", content)],
  )
}

pub fn answer_check_prompt(prompts: &Prompts, statement: &str, alternatives: &[String], answer: &str) -> String {
  let listed = alternatives
    .iter()
    .map(|a| format!("- {}", a.trim()))
    .collect::<Vec<_>>()
    .join("\n");
  fill_template(
    &prompts.answer_check_template,
    &[("questao", statement), ("alternativas", &listed), ("resposta", answer)],
  )
}

pub fn code_review_prompt(prompts: &Prompts, code: &str) -> String {
  fill_template(&prompts.code_review_template, &[("codigo", code)])
}

pub fn feedback_prompt(prompts: &Prompts, code: &str) -> String {
  fill_template(&prompts.feedback_template, &[("codigo", code)])
}

pub fn level_prompt(prompts: &Prompts, knowledge: &str, languages: &str, goal: &str) -> String {
  fill_template(
    &prompts.level_template,
    &[("resposta1", knowledge), ("resposta2", languages), ("resposta3", goal)],
  )
}
