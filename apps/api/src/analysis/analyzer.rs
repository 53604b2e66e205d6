use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AnalysisLimits;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{ChatBackend, LlmError};

use super::json_extract::{parse_first_json_object, JsonExtractError};
use super::prompts::build_analysis_prompt;
use super::result::AnalysisResult;

/// User-facing message when every candidate model failed.
pub const EXHAUSTED_MESSAGE: &str = "All LLMs failed. Please retry.";

/// Why one candidate model did not produce a result.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Json(#[from] JsonExtractError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelAttempt {
    pub model: String,
    pub error: String,
}

/// Terminal analyzer outcomes the caller must surface.
#[derive(Debug, Error)]
pub enum AnalysisFailure {
    #[error("OPENROUTER_API_KEY not set.")]
    Configuration,

    #[error("All LLMs failed. Please retry.")]
    Exhausted { attempts: Vec<ModelAttempt> },
}

/// Runs the analysis prompt against a prioritized model list.
#[derive(Clone)]
pub struct LlmAnalyzer {
    backend: Arc<dyn ChatBackend>,
    models: Vec<String>,
    limits: AnalysisLimits,
}

impl LlmAnalyzer {
    pub fn new(backend: Arc<dyn ChatBackend>, models: Vec<String>, limits: AnalysisLimits) -> Self {
        Self {
            backend,
            models,
            limits,
        }
    }

    /// Tries each model once, in order, and returns the first parsed result.
    ///
    /// A missing credential fails before any request. Per-model failures are
    /// logged and recorded; if none succeeds the attempts come back in
    /// [`AnalysisFailure::Exhausted`].
    pub async fn analyze(
        &self,
        resume_text: &str,
        job_text: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisFailure> {
        if !self.backend.is_configured() {
            warn!("LLM analysis requested without an API key");
            return Err(AnalysisFailure::Configuration);
        }

        let prompt = build_analysis_prompt(resume_text, job_text, &self.limits);
        let mut attempts = Vec::with_capacity(self.models.len());

        for model in &self.models {
            match self.attempt(model, &prompt).await {
                Ok(result) => {
                    info!("LLM analysis produced by {model}");
                    return Ok(result);
                }
                Err(e) => {
                    warn!("{model} failed: {e}");
                    attempts.push(ModelAttempt {
                        model: model.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(AnalysisFailure::Exhausted { attempts })
    }

    async fn attempt(&self, model: &str, prompt: &str) -> Result<AnalysisResult, AttemptError> {
        let raw = self.backend.complete(model, JSON_ONLY_SYSTEM, prompt).await?;
        let object = parse_first_json_object(&raw)?;
        Ok(AnalysisResult::from_object(&object, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LogCapture, Reply, ScriptedBackend};

    const GOOD: &str = r#"Here you go: {"job_match_score": 70, "ats_compatibility_score": 60,
        "clarity_score": 80, "technical_skills": ["Rust"], "top_tips": ["Add numbers"]}"#;

    fn analyzer(backend: Arc<ScriptedBackend>, models: &[&str]) -> LlmAnalyzer {
        LlmAnalyzer::new(
            backend,
            models.iter().map(|m| m.to_string()).collect(),
            AnalysisLimits::default(),
        )
    }

    #[tokio::test]
    async fn test_falls_back_to_third_model() {
        let (logs, _guard) = LogCapture::install();
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Fail,
            Reply::Text("no json here".to_string()),
            Reply::Text(GOOD.to_string()),
        ]));
        let result = analyzer(Arc::clone(&backend), &["m1", "m2", "m3"])
            .analyze("resume", None)
            .await
            .unwrap();

        assert_eq!(result.model_used, "m3");
        assert_eq!(result.job_match_score, 70);
        assert_eq!(result.technical_skills, vec!["Rust"]);
        assert_eq!(backend.calls(), vec!["m1", "m2", "m3"]);

        let failures: Vec<_> = logs
            .lines()
            .into_iter()
            .filter(|l| l.contains("WARN") && l.contains(" failed: "))
            .collect();
        assert_eq!(failures.len(), 2, "{failures:?}");
        assert!(failures[0].contains("m1 failed: API error (status 500)"));
        assert!(failures[1].contains("m2 failed: "));
        assert!(failures.iter().all(|l| !l.contains("m3 failed")));
    }

    #[tokio::test]
    async fn test_first_success_stops_iteration() {
        let backend = Arc::new(ScriptedBackend::new(vec![Reply::Text(GOOD.to_string())]));
        let result = analyzer(Arc::clone(&backend), &["m1", "m2"])
            .analyze("resume", Some("job"))
            .await
            .unwrap();
        assert_eq!(result.model_used, "m1");
        assert_eq!(backend.calls(), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_all_models_fail_is_exhausted() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Reply::Fail,
            Reply::Text("{broken".to_string()),
        ]));
        let err = analyzer(Arc::clone(&backend), &["m1", "m2"])
            .analyze("resume", None)
            .await
            .unwrap_err();

        match err {
            AnalysisFailure::Exhausted { attempts } => {
                let models: Vec<_> = attempts.iter().map(|a| a.model.as_str()).collect();
                assert_eq!(models, vec!["m1", "m2"]);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(
            AnalysisFailure::Exhausted { attempts: vec![] }.to_string(),
            "All LLMs failed. Please retry."
        );
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_calls() {
        let backend = Arc::new(ScriptedBackend::unconfigured());
        let err = analyzer(Arc::clone(&backend), &["m1", "m2"])
            .analyze("resume", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisFailure::Configuration));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_carries_job_description() {
        let backend = Arc::new(ScriptedBackend::new(vec![Reply::Text(GOOD.to_string())]));
        analyzer(Arc::clone(&backend), &["m1"])
            .analyze("resume text", Some("Staff Rust Engineer"))
            .await
            .unwrap();
        let prompts = backend.prompts();
        assert!(prompts[0].contains("resume text"));
        assert!(prompts[0].contains("Staff Rust Engineer"));
    }
}
