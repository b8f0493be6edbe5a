//! Application state: model client, code runner and prompt templates.
//!
//! Built once at startup and shared read-only across requests; there is no
//! per-request mutable state.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::{Prompts, TutorConfig};
use crate::model::{OpenAi, TextModel, Unconfigured};
use crate::runner::CodeRunner;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn TextModel>,
    pub runner: CodeRunner,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load config, init the model client and the runner.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = TutorConfig::load();

        let model: Arc<dyn TextModel> = match OpenAi::from_env() {
            Some(oa) => {
                info!(target: "tutor_backend", base_url = %oa.base_url, model = %oa.model, "Model client enabled.");
                Arc::new(oa)
            }
            None => {
                warn!(target: "tutor_backend", "OPENAI_API_KEY not set; model-backed endpoints will answer 503.");
                Arc::new(Unconfigured)
            }
        };

        let runner = CodeRunner::new(&cfg.runner);
        info!(target: "tutor_backend", interpreter = %runner.interpreter(), timeout_secs = runner.timeout().as_secs(), "Code runner configured.");

        Self::new(model, runner, cfg.prompts)
    }

    pub fn new(model: Arc<dyn TextModel>, runner: CodeRunner, prompts: Prompts) -> Self {
        Self { model, runner, prompts }
    }
}
