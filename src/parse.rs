//! Parsing of model text into typed values.
//!
//! Two strategies, never mixed within one endpoint:
//!
//! - **Structured**: the model was asked for pure JSON. Fences (and, if still
//!   needed, bold markers) are stripped, then the text is strictly decoded into
//!   a schema type and its invariants are checked. Anything else is an error.
//! - **Labeled-line**: the model was asked for lines such as `Correto: sim`.
//!   Lines are scanned for known labels; a missing label leaves the field at
//!   its default. This is a best-effort heuristic and breaks if the model
//!   stops using the labels; that limitation is accepted, not patched over.
//!
//! Every function here is total: arbitrary input yields a value or a
//! `TutorError`, never a panic.

use serde::{de::DeserializeOwned, Serialize};

use crate::domain::{AnswerVerdict, Level, LevelClassification, Validate};
use crate::error::{Result, TutorError};
use crate::util::fold;

/// Which parsing strategy an endpoint uses.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ParseMode {
  Structured,
  LabeledLine,
  PlainText,
}

const FENCE: &str = "```";

const CORRECT_LABELS: &[&str] = &["correto:"];
const EXPLANATION_LABELS: &[&str] = &["explicacao:"];
const AFFIRMATIVE_TOKENS: &[&str] = &["sim", "yes"];

pub const SUMMARY_LABELS: &[&str] = &["resumo:"];
pub const CORRECTION_LABELS: &[&str] = &["correcao:"];
pub const IMPROVEMENT_LABELS: &[&str] = &["melhorias:", "melhoria:"];

const LEVEL_LABELS: &[&str] = &["nivel:", "level:"];
const JUSTIFICATION_LABELS: &[&str] = &["justificativa:"];

const NEGATION_TOKENS: &[&str] = &[
  "incorreto",
  "incorreta",
  "incorrect",
  "errado",
  "errada",
  "nao esta correto",
  "nao esta correta",
  "nao funciona",
];

// --- Markup cleanup ---

fn strip_fences_once(s: &str) -> String {
  let mut out = s.trim();
  if let Some(rest) = out.strip_prefix(FENCE) {
    out = match rest.find('\n') {
      Some(nl) => &rest[nl + 1..],
      // Single-line "```json {...}```": drop the language tag only.
      None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
  }
  let out = out.trim_end();
  let out = out.strip_suffix(FENCE).unwrap_or(out);
  out.trim().to_string()
}

fn to_fixpoint(s: &str, step: impl Fn(&str) -> String) -> String {
  let mut cur = s.to_string();
  loop {
    let next = step(&cur);
    if next == cur {
      return cur;
    }
    cur = next;
  }
}

/// Remove a leading/trailing code fence (with optional language tag).
/// Inner fences are left alone.
pub fn strip_fences(text: &str) -> String {
  to_fixpoint(text, strip_fences_once)
}

fn unmark_line(line: &str) -> String {
  // Odd segments sit between backticks: inline code keeps `__init__` and `2**3`.
  line
    .split('`')
    .enumerate()
    .map(|(i, part)| if i % 2 == 0 { part.replace("**", "").replace("__", "") } else { part.to_string() })
    .collect::<Vec<_>>()
    .join("`")
}

fn unmark(text: &str) -> String {
  let mut in_code = false;
  text
    .split('\n')
    .map(|line| {
      if line.trim_start().starts_with(FENCE) {
        in_code = !in_code;
        line.to_string()
      } else if in_code {
        line.to_string()
      } else {
        unmark_line(line)
      }
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Remove code fences plus `**` bold and `__` emphasis markers. Idempotent.
///
/// Markers inside fenced blocks and inline code are kept, so a correction
/// containing `if __name__ == "__main__":` survives. An outer fence wrapping
/// the whole reply is a wrapper, not code, and is stripped first.
pub fn strip_markup(text: &str) -> String {
  to_fixpoint(text, |s| unmark(&strip_fences_once(s)))
}

// --- Structured mode ---

fn decode<T: DeserializeOwned>(text: &str) -> std::result::Result<T, serde_json::Error> {
  serde_json::from_str::<T>(text)
}

fn decode_error(e: serde_json::Error, raw: &str) -> TutorError {
  match e.classify() {
    serde_json::error::Category::Data => TutorError::SchemaViolation(e.to_string()),
    _ => TutorError::MalformedModelOutput { detail: e.to_string(), raw: raw.to_string() },
  }
}

/// Strict JSON decoding into `T`, followed by `T`'s invariants.
///
/// Bold markers are only removed when the fence-stripped text does not
/// decode, so `2**3` inside a code example survives.
pub fn parse_structured<T: DeserializeOwned + Validate>(raw: &str) -> Result<T> {
  let fenced = strip_fences(raw);
  let decoded = match decode::<T>(&fenced) {
    Err(e) if e.classify() != serde_json::error::Category::Data => {
      let cleaned = strip_markup(raw);
      if cleaned == fenced { Err(e) } else { decode::<T>(&cleaned) }
    }
    other => other,
  };
  let value = decoded.map_err(|e| decode_error(e, raw))?;
  value.validate().map_err(TutorError::SchemaViolation)?;
  Ok(value)
}

// --- Labeled-line mode ---

fn fold_char(c: char) -> char {
  fold(c.encode_utf8(&mut [0u8; 4])).chars().next().unwrap_or(c)
}

/// Byte offset just past `label` (already folded) if it occurs in `line` at a
/// word start. Matching ignores case and accents.
fn find_label(line: &str, label: &str) -> Option<usize> {
  let chars: Vec<(usize, char)> = line.char_indices().collect();
  let wanted: Vec<char> = label.chars().collect();
  for start in 0..chars.len() {
    if start > 0 && chars[start - 1].1.is_alphanumeric() {
      continue;
    }
    if chars.len() - start < wanted.len() {
      break;
    }
    let hit = wanted
      .iter()
      .zip(&chars[start..])
      .all(|(w, (_, c))| fold_char(*c) == *w);
    if hit {
      let end = start + wanted.len();
      return Some(chars.get(end).map(|(i, _)| *i).unwrap_or(line.len()));
    }
  }
  None
}

/// Text after the first of `labels` that opens `head`. A label in the middle
/// of a sentence ("está correto: 1 + 1 = 2") does not count.
fn after_leading_label<'a>(head: &'a str, labels: &[&str]) -> Option<&'a str> {
  labels
    .iter()
    .find_map(|l| find_label(head, l).filter(|_| head_starts_with_label(head, l)))
    .map(|i| &head[i..])
}

fn trim_bullet(line: &str) -> &str {
  let t = line.trim_start();
  for b in ["- ", "* ", "• "] {
    if let Some(rest) = t.strip_prefix(b) {
      return rest;
    }
  }
  t
}

fn has_token(text: &str, tokens: &[&str]) -> bool {
  fold(text)
    .split(|c: char| !c.is_alphanumeric())
    .any(|w| tokens.contains(&w))
}

/// Scan for lines opening with `Correto:` / `Explicação:`.
///
/// `Correto:` followed by an affirmative token sets the verdict; the text after
/// `Explicação:` on the same line becomes the message. Missing labels leave the
/// defaults (`false`, empty message).
pub fn parse_labeled_verdict(raw: &str) -> AnswerVerdict {
  let cleaned = strip_markup(raw);
  let mut verdict = AnswerVerdict::default();
  for line in cleaned.lines() {
    let line = trim_bullet(line);
    if let Some(rest) = after_leading_label(line, CORRECT_LABELS) {
      verdict.is_correct = has_token(rest, AFFIRMATIVE_TOKENS);
    } else if let Some(rest) = after_leading_label(line, EXPLANATION_LABELS) {
      verdict.explanation = rest.trim().to_string();
    }
  }
  verdict
}

/// Split text into sections introduced by labels at the start of a line.
///
/// Returns one string per entry of `sections`, in the same order. Lines before
/// the first label are dropped; lines after a label belong to it until the next
/// label. Missing sections come back empty.
pub fn parse_labeled_sections(raw: &str, sections: &[&[&str]]) -> Vec<String> {
  let cleaned = strip_markup(raw);
  let mut out = vec![String::new(); sections.len()];
  let mut current: Option<usize> = None;

  for line in cleaned.lines() {
    let head = trim_bullet(line);
    let opened = sections
      .iter()
      .enumerate()
      .find_map(|(idx, labels)| after_leading_label(head, labels).map(|rest| (idx, rest)));
    match (opened, current) {
      (Some((idx, rest)), _) => {
        current = Some(idx);
        let rest = rest.trim();
        if !rest.is_empty() {
          push_line(&mut out[idx], rest);
        }
      }
      (None, Some(idx)) => push_line(&mut out[idx], line),
      (None, None) => {}
    }
  }
  out.iter().map(|s| s.trim().to_string()).collect()
}

fn head_starts_with_label(head: &str, label: &str) -> bool {
  find_label(head, label).is_some()
    && head
      .chars()
      .zip(label.chars())
      .all(|(c, l)| fold_char(c) == l)
}

fn push_line(section: &mut String, line: &str) {
  if !section.is_empty() {
    section.push('\n');
  }
  section.push_str(line);
}

/// Map free text onto the closed level set, using the first level word found.
pub fn level_from_text(text: &str) -> Option<Level> {
  let folded = fold(text);
  let folded = folded.as_str();
  let candidates: [(&[&str], Level); 3] = [
    (&["iniciante", "beginner", "basico"], Level::Beginner),
    (&["intermediario", "intermediate"], Level::Intermediate),
    (&["avancado", "advanced"], Level::Advanced),
  ];
  candidates
    .iter()
    .flat_map(|(words, level)| words.iter().filter_map(move |w| folded.find(*w).map(|pos| (pos, *level))))
    .min_by_key(|(pos, _)| *pos)
    .map(|(_, level)| level)
}

/// Two-line level answer: `Nível: ...` then `Justificativa: ...`.
///
/// Without a `Nível:` label the first non-empty line is read as the level.
/// Without a `Justificativa:` label whatever follows the level line is the
/// justification. An unrecognised level is a schema violation; the categories
/// are closed.
pub fn parse_level(raw: &str) -> Result<LevelClassification> {
  let sections = parse_labeled_sections(raw, &[LEVEL_LABELS, JUSTIFICATION_LABELS]);
  let cleaned = strip_markup(raw);

  let (level_text, remainder) = if sections[0].is_empty() {
    let mut lines = cleaned.lines().map(str::trim).skip_while(|l| l.is_empty());
    let first = lines.next().unwrap_or_default().to_string();
    (first, lines.collect::<Vec<_>>().join("\n"))
  } else {
    let mut lines = sections[0].lines();
    let first_line = lines.next().unwrap_or_default().to_string();
    (first_line, lines.collect::<Vec<_>>().join("\n"))
  };

  let level = level_from_text(&level_text)
    .ok_or_else(|| TutorError::SchemaViolation(format!("nível não reconhecido: '{}'", level_text.trim())))?;

  let justification = if !sections[1].is_empty() {
    sections[1].clone()
  } else {
    remainder.trim().to_string()
  };

  Ok(LevelClassification { level, justification })
}

/// Negation-token heuristic over the model's own opinion of a submission.
///
/// Tokens match whole words, and a token right after "nada" / "nada de"
/// ("não há nada de errado") is a dismissal, not a flag. Other double
/// negatives ("nenhum trecho está errado") still read as incorrect.
pub fn model_flags_incorrect(text: &str) -> bool {
  let folded = fold(text);
  let words: Vec<&str> = folded.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
  NEGATION_TOKENS.iter().any(|token| {
    let phrase: Vec<&str> = token.split_whitespace().collect();
    words
      .windows(phrase.len())
      .enumerate()
      .any(|(i, window)| window == phrase.as_slice() && !dismissed(&words[..i]))
  })
}

fn dismissed(before: &[&str]) -> bool {
  matches!(before, [.., "nada"] | [.., "nada", "de"])
}

// --- Plain text ---

fn unbold_line(line: &str) -> String {
  let parts: Vec<&str> = line.split("**").collect();
  if parts.len() < 3 {
    return line.to_string();
  }
  let mut out = String::new();
  // Markers past the last complete pair stay literal.
  let paired = 2 * ((parts.len() - 1) / 2);
  for (i, part) in parts.iter().enumerate() {
    if i > paired {
      out.push_str("**");
    }
    out.push_str(part);
    if i % 2 == 1 && i < paired {
      out.push(':');
    }
  }
  out
}

/// Free-text cleanup for display: `**x**` becomes `x:` and blank lines go.
pub fn format_plain(text: &str) -> String {
  text
    .lines()
    .map(unbold_line)
    .filter(|l| !l.is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Choice, MultipleChoiceQuestion, Question};

  const MCQ_JSON: &str = r#"{
    "enunciado": "Qual a saída de print(len([1, 2]))?",
    "alternativas": [
      {"id": "A", "texto": "1", "justificativa": "conta errado"},
      {"id": "B", "texto": "2", "justificativa": "dois elementos"},
      {"id": "C", "texto": "3", "justificativa": "não"},
      {"id": "D", "texto": "Erro", "justificativa": "código válido"}
    ],
    "respostaCorreta": "B",
    "raciocinio": "len conta os elementos"
  }"#;

  #[test]
  fn strip_markup_removes_fences_and_bold() {
    let raw = "```json\n{\"a\": \"**x**\"}\n```";
    assert_eq!(strip_markup(raw), "{\"a\": \"x\"}");
    assert_eq!(strip_fences("```\nplain\n```"), "plain");
    assert_eq!(strip_fences("```json {\"a\":1}```"), "{\"a\":1}");
  }

  #[test]
  fn strip_markup_removes_underscore_emphasis_outside_code() {
    assert_eq!(strip_markup("__Resumo__ ok"), "Resumo ok");
    assert_eq!(strip_markup("use `__init__` e `2**3`"), "use `__init__` e `2**3`");
    let raw = "Correção:\n```python\nif __name__ == \"__main__\":\n    print(2**3)\n```\nfim";
    assert_eq!(strip_markup(raw), raw);
  }

  #[test]
  fn strip_markup_is_idempotent() {
    let samples = [
      "```json\n{}\n```",
      "```\n```\nfoo\n```\n```",
      "*_*x****y***",
      "`**``x",
      "  **Resumo:** ok  ",
      "__a__ `__b__` ```\n__c__\n``` **d**",
      "x\n```\n__y__",
      "",
      "```",
    ];
    for s in samples {
      let once = strip_markup(s);
      assert_eq!(strip_markup(&once), once, "input {:?}", s);
      let once = strip_fences(s);
      assert_eq!(strip_fences(&once), once, "input {:?}", s);
    }
  }

  #[test]
  fn structured_mcq_satisfies_invariants() {
    let q: MultipleChoiceQuestion = parse_structured(&format!("```json\n{}\n```", MCQ_JSON)).unwrap();
    assert_eq!(q.alternatives.len(), 4);
    assert_eq!(q.correct_answer, Choice::B);
    assert!(q.alternatives.iter().any(|a| a.id == q.correct_answer));
  }

  #[test]
  fn structured_keeps_power_operator_in_strings() {
    let raw = r#"{"titulo": "Potência", "enunciado": "Calcule 2**3", "exemplo": "print(2**3) -> 8"}"#;
    let q: Question = parse_structured(raw).unwrap();
    assert_eq!(q.instruction, "Calcule 2**3");
  }

  #[test]
  fn structured_retries_without_bold_markers() {
    let raw = "**{\"titulo\": \"T\", \"enunciado\": \"E\"}**";
    let q: Question = parse_structured(raw).unwrap();
    assert_eq!(q.title, "T");
    assert_eq!(q.example, None);
  }

  #[test]
  fn non_json_is_malformed() {
    for raw in ["Claro! Aqui está a questão.", "", "```json\n{\"titulo\": \n```", "[1, 2"] {
      match parse_structured::<Question>(raw) {
        Err(TutorError::MalformedModelOutput { raw: kept, .. }) => assert_eq!(kept, raw),
        other => panic!("expected malformed for {:?}, got {:?}", raw, other),
      }
    }
  }

  #[test]
  fn wrong_shape_is_schema_violation() {
    let three = MCQ_JSON.replace(r#",
      {"id": "D", "texto": "Erro", "justificativa": "código válido"}"#, "");
    assert!(matches!(
      parse_structured::<MultipleChoiceQuestion>(&three),
      Err(TutorError::SchemaViolation(_))
    ));

    let bad_id = MCQ_JSON.replace(r#""id": "D""#, r#""id": "E""#);
    assert!(matches!(
      parse_structured::<MultipleChoiceQuestion>(&bad_id),
      Err(TutorError::SchemaViolation(_))
    ));

    let extra = r#"{"titulo": "T", "enunciado": "E", "dificuldade": "alta"}"#;
    assert!(matches!(parse_structured::<Question>(extra), Err(TutorError::SchemaViolation(_))));

    let missing = r#"{"titulo": "T"}"#;
    assert!(matches!(parse_structured::<Question>(missing), Err(TutorError::SchemaViolation(_))));

    let answer_absent = MCQ_JSON.replace(r#""respostaCorreta": "B""#, r#""respostaCorreta": "Z""#);
    assert!(matches!(
      parse_structured::<MultipleChoiceQuestion>(&answer_absent),
      Err(TutorError::SchemaViolation(_))
    ));
  }

  #[test]
  fn labeled_verdict_reads_bulleted_lines() {
    let v = parse_labeled_verdict("- Correto: sim\n- Explicação: certo");
    assert_eq!(v, AnswerVerdict { is_correct: true, explanation: "certo".into() });
  }

  #[test]
  fn labeled_verdict_handles_bold_and_case() {
    let v = parse_labeled_verdict("**CORRETO:** Não\n**Explicacao:** reveja a precedência");
    assert!(!v.is_correct);
    assert_eq!(v.explanation, "reveja a precedência");
  }

  #[test]
  fn labeled_verdict_without_labels_defaults() {
    let v = parse_labeled_verdict("A resposta parece boa, sim.");
    assert_eq!(v, AnswerVerdict::default());
    assert_eq!(parse_labeled_verdict(""), AnswerVerdict::default());
  }

  #[test]
  fn label_words_inside_the_explanation_are_not_labels() {
    let v = parse_labeled_verdict("Correto: sim\nExplicação: Seu raciocínio está correto: 1 + 1 = 2.");
    assert!(v.is_correct);
    assert_eq!(v.explanation, "Seu raciocínio está correto: 1 + 1 = 2.");
  }

  #[test]
  fn incorrect_label_is_not_mistaken_for_correct() {
    let v = parse_labeled_verdict("Incorreto: sim\nExplicação: x");
    assert!(!v.is_correct);
    assert_eq!(v.explanation, "x");
  }

  #[test]
  fn sections_collect_multiline_bodies() {
    let raw = "Resumo: O código está incorreto.\nCorreção:\n```python\nprint(1 / 1)\n```\n- Melhorias: use nomes claros\n  e funções";
    let s = parse_labeled_sections(raw, &[SUMMARY_LABELS, CORRECTION_LABELS, IMPROVEMENT_LABELS]);
    assert_eq!(s[0], "O código está incorreto.");
    assert!(s[1].contains("print(1 / 1)"));
    assert_eq!(s[2], "use nomes claros\n  e funções");
  }

  #[test]
  fn sections_missing_are_empty() {
    let s = parse_labeled_sections("texto livre", &[SUMMARY_LABELS, CORRECTION_LABELS]);
    assert_eq!(s, vec![String::new(), String::new()]);
  }

  #[test]
  fn level_two_line_shape() {
    let c = parse_level("Nível: Intermediário\nJustificativa: Você já programa em Java.").unwrap();
    assert_eq!(c.level, Level::Intermediate);
    assert_eq!(c.justification, "Você já programa em Java.");
  }

  #[test]
  fn level_label_without_justification_label_keeps_following_text() {
    let c = parse_level("Nível: iniciante\nVocê está começando agora, continue praticando!").unwrap();
    assert_eq!(c.level, Level::Beginner);
    assert_eq!(c.justification, "Você está começando agora, continue praticando!");
  }

  #[test]
  fn level_without_labels_uses_first_line() {
    let c = parse_level("\n**Avançado**\nVocê já domina estruturas de dados.").unwrap();
    assert_eq!(c.level, Level::Advanced);
    assert_eq!(c.justification, "Você já domina estruturas de dados.");
  }

  #[test]
  fn level_first_mention_wins() {
    assert_eq!(level_from_text("iniciante, quase intermediário"), Some(Level::Beginner));
  }

  #[test]
  fn unknown_level_is_schema_violation() {
    assert!(matches!(parse_level("Nível: expert"), Err(TutorError::SchemaViolation(_))));
    assert!(matches!(parse_level(""), Err(TutorError::SchemaViolation(_))));
  }

  #[test]
  fn negation_heuristic() {
    assert!(model_flags_incorrect("O código está INCORRETO"));
    assert!(model_flags_incorrect("Não está correto ainda"));
    assert!(!model_flags_incorrect("O código está correto."));
  }

  #[test]
  fn negation_heuristic_ignores_dismissals_and_partial_words() {
    assert!(!model_flags_incorrect("Não há nada de errado com o código."));
    assert!(!model_flags_incorrect("Nada errado aqui."));
    assert!(!model_flags_incorrect("Use nomes descritivos, como incorretoCount."));
    assert!(model_flags_incorrect("O resultado está errado."));
  }

  #[test]
  fn format_plain_rewrites_bold_labels() {
    let out = format_plain("**Questão**\n\n\nFaça um laço.\n**Dica** use range");
    assert_eq!(out, "Questão:\nFaça um laço.\nDica: use range");
    assert_eq!(format_plain("2**3"), "2**3");
    assert_eq!(format_plain("**a** e **b"), "a: e **b");
  }
}
