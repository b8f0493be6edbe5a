//! HTTP request/response DTOs (serde ready).
//! Domain values are returned as-is; only the inputs and a few wrappers live here.

use serde::{Deserialize, Serialize};

use crate::parse::ParseMode;

#[derive(Debug, Deserialize)]
pub struct QuestionIn {
    pub nivel: String,
    #[serde(default)]
    pub conteudo: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuizIn {
    #[serde(default = "default_quiz_level")]
    pub nivel: String,
    #[serde(default)]
    pub conteudo: Vec<String>,
}

fn default_quiz_level() -> String {
    "iniciante".into()
}

impl Default for QuizIn {
    fn default() -> Self {
        Self { nivel: default_quiz_level(), conteudo: Vec::new() }
    }
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub questao: String,
    #[serde(default)]
    pub alternativas: Vec<String>,
    pub resposta: String,
}

#[derive(Deserialize)]
pub struct CodeIn {
    pub codigo: String,
}

#[derive(Serialize)]
pub struct FeedbackOut {
    pub feedback: String,
}

#[derive(Deserialize)]
pub struct LevelIn {
    #[serde(default)]
    pub resposta1: String,
    #[serde(default)]
    pub resposta2: String,
    #[serde(default)]
    pub resposta3: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointOut {
    pub path: &'static str,
    pub parse_mode: ParseMode,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub model: String,
    pub endpoints: Vec<EndpointOut>,
}
