//! Domain models: generated questions, verdicts, code evaluations and levels.
//!
//! These types double as the schema for structured model output: the model is
//! asked for exactly these JSON field names, and decoding goes straight into
//! them with unknown fields rejected. Wire names stay in Portuguese to match
//! the public API.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

/// Shape invariants checked after a successful decode.
pub trait Validate {
  fn validate(&self) -> Result<(), String>;
}

/// Open programming exercise.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Question {
  #[serde(rename = "titulo")]
  pub title: String,
  #[serde(rename = "enunciado")]
  pub instruction: String,
  #[serde(rename = "exemplo", default, skip_serializing_if = "Option::is_none")]
  pub example: Option<String>,
}

impl Validate for Question {
  fn validate(&self) -> Result<(), String> {
    if self.title.trim().is_empty() {
      return Err("campo 'titulo' vazio".into());
    }
    if self.instruction.trim().is_empty() {
      return Err("campo 'enunciado' vazio".into());
    }
    Ok(())
  }
}

/// Alternative identifier. Anything outside A–D fails to decode.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Choice {
  A,
  B,
  C,
  D,
}

impl Choice {
  /// Accepts "B", "b", "B)" or "B) 2". A letter followed by more letters
  /// ("Bool") is free text, not a choice.
  pub fn from_answer(s: &str) -> Option<Choice> {
    let mut chars = s.trim().chars();
    let first = chars.next()?;
    if let Some(next) = chars.next() {
      if !matches!(next, ')' | '.' | ':' | '-') && !next.is_whitespace() {
        return None;
      }
    }
    match first.to_ascii_uppercase() {
      'A' => Some(Choice::A),
      'B' => Some(Choice::B),
      'C' => Some(Choice::C),
      'D' => Some(Choice::D),
      _ => None,
    }
  }
}

impl fmt::Display for Choice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Choice::A => "A",
      Choice::B => "B",
      Choice::C => "C",
      Choice::D => "D",
    };
    f.write_str(s)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Alternative {
  pub id: Choice,
  #[serde(rename = "texto")]
  pub text: String,
  #[serde(rename = "justificativa")]
  pub rationale: String,
}

/// Objective question with exactly four alternatives.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MultipleChoiceQuestion {
  #[serde(rename = "enunciado")]
  pub prompt: String,
  #[serde(rename = "alternativas")]
  pub alternatives: Vec<Alternative>,
  #[serde(rename = "respostaCorreta")]
  pub correct_answer: Choice,
  #[serde(rename = "raciocinio")]
  pub reasoning: String,
}

impl Validate for MultipleChoiceQuestion {
  fn validate(&self) -> Result<(), String> {
    if self.prompt.trim().is_empty() {
      return Err("campo 'enunciado' vazio".into());
    }
    if self.alternatives.len() != 4 {
      return Err(format!("esperadas 4 alternativas, recebidas {}", self.alternatives.len()));
    }
    let mut seen = HashSet::new();
    for alt in &self.alternatives {
      if !seen.insert(alt.id) {
        return Err(format!("alternativa {} repetida", alt.id));
      }
      if alt.text.trim().is_empty() {
        return Err(format!("alternativa {} sem texto", alt.id));
      }
    }
    if !seen.contains(&self.correct_answer) {
      return Err(format!("respostaCorreta {} não corresponde a nenhuma alternativa", self.correct_answer));
    }
    Ok(())
  }
}

/// Judgement of a submitted multiple-choice answer.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct AnswerVerdict {
  #[serde(rename = "correto")]
  pub is_correct: bool,
  #[serde(rename = "mensagem")]
  pub explanation: String,
}

/// Combined model review + sandboxed run of submitted code.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct CodeEvaluation {
  #[serde(rename = "correto")]
  pub is_correct: bool,
  #[serde(rename = "resumo")]
  pub summary: String,
  #[serde(rename = "correcao")]
  pub correction: String,
  #[serde(rename = "melhorias")]
  pub improvements: String,
  /// Whatever the program printed before finishing.
  #[serde(rename = "saida")]
  pub output: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Level {
  #[serde(rename = "iniciante")]
  Beginner,
  #[serde(rename = "intermediario")]
  Intermediate,
  #[serde(rename = "avancado")]
  Advanced,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LevelClassification {
  #[serde(rename = "nivel")]
  pub level: Level,
  #[serde(rename = "justificativa")]
  pub justification: String,
}
