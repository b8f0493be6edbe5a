//! Loading tutor configuration (prompt templates + runner limits) from TOML.
//!
//! Everything has a default; the file at TUTOR_CONFIG_PATH only overrides.
//! Runner limits can also be set through PYTHON_BIN / RUN_TIMEOUT_SECS, which
//! win over the file.

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TutorConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub runner: RunnerConfig,
}

/// Limits applied to every submitted program.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
  pub interpreter: String,
  pub timeout_secs: u64,
  pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
  fn default() -> Self {
    Self {
      interpreter: "python3".into(),
      timeout_secs: 5,
      max_output_bytes: 64 * 1024,
    }
  }
}

/// Prompt templates. Each one embeds the output contract its parser expects,
/// so changing the wording here must keep the labels / JSON keys intact.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_template: String,
  pub multiple_choice_template: String,
  pub answer_check_template: String,
  pub code_review_template: String,
  pub feedback_template: String,
  pub level_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_template: "Crie uma questão de programação em Python para um iniciante no nível {nivel}, com o conteúdo de {conteudo}.\n\
Responda APENAS com JSON puro, sem Markdown e sem blocos de código, exatamente com estas chaves:\n\
{\"titulo\": string, \"enunciado\": string, \"exemplo\": string}\n\
O campo \"exemplo\" deve mostrar uma entrada e a saída esperada.".into(),
      multiple_choice_template: "Crie uma questão objetiva sobre {conteudo} para um estudante de Python no nível {nivel}.\n\
A questão deve ter exatamente 4 alternativas, identificadas por A, B, C e D, e apenas uma correta.\n\
Responda APENAS com JSON puro, sem Markdown e sem blocos de código, exatamente neste formato:\n\
{\"enunciado\": string, \"alternativas\": [{\"id\": \"A\", \"texto\": string, \"justificativa\": string}, ...], \"respostaCorreta\": \"A\"|\"B\"|\"C\"|\"D\", \"raciocinio\": string}".into(),
      answer_check_template: "Verifique se a resposta à questão abaixo está correta.\n\
Questão: {questao}\n\
Alternativas:\n{alternativas}\n\
Resposta do estudante: {resposta}\n\
Se a resposta estiver errada, explique o erro SEM revelar a alternativa correta.\n\
Responda exatamente em duas linhas:\n\
Correto: sim ou não\n\
Explicação: <sua explicação>".into(),
      code_review_template: "Corrija este código em Python e explique os erros.\n\
Responda exatamente em três seções, cada uma iniciada pelo rótulo indicado:\n\
Resumo: diga se o código está correto ou incorreto e por quê\n\
Correção: o código corrigido e a explicação dos erros\n\
Melhorias: sugestões de estilo e boas práticas\n\
Código:\n{codigo}".into(),
      feedback_template: "Analise este código em Python e sugira melhorias:\n{codigo}".into(),
      level_template: "Classifique o nível de programação do estudante como iniciante, intermediário ou avançado baseado nas seguintes informações:\n\
- Nível de conhecimento: '{resposta1}'\n\
- Linguagem de programação com a qual já teve contato: '{resposta2}'\n\
- Objetivo ao aprender programação: '{resposta3}'\n\
Responda como se estivesse falando com esse estudante, exatamente em duas linhas:\n\
Nível: iniciante, intermediário ou avançado\n\
Justificativa: <uma breve justificativa>".into(),
    }
  }
}

impl TutorConfig {
  /// File (if any) first, then environment overrides for the runner.
  pub fn load() -> Self {
    let mut cfg = load_tutor_config_from_env().unwrap_or_default();

    if let Ok(bin) = std::env::var("PYTHON_BIN") {
      if !bin.trim().is_empty() {
        cfg.runner.interpreter = bin;
      }
    }
    if let Ok(raw) = std::env::var("RUN_TIMEOUT_SECS") {
      match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => cfg.runner.timeout_secs = secs,
        _ => warn!(target: "tutor_backend", value = %raw, "Ignoring invalid RUN_TIMEOUT_SECS"),
      }
    }
    cfg
  }
}

/// Attempt to load `TutorConfig` from TUTOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_tutor_config_from_env() -> Option<TutorConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "tutor_backend", %path, "Loaded tutor config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tutor_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tutor_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_config(s: &str) -> Result<TutorConfig, toml::de::Error> {
  toml::from_str::<TutorConfig>(s)
}
