use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::inference::ModelSource;

pub const DEFAULT_LLM_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODELS: &[&str] = &["mistralai/mistral-7b-instruct", "nousresearch/hermes-2-pro"];
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_NER_MODEL: &str = "dslim/bert-base-NER";

/// Application configuration loaded from environment variables.
///
/// Only malformed values fail startup. A missing `OPENROUTER_API_KEY` is carried
/// as `None` so that every non-LLM stage keeps working; the analyzer reports it.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub limits: AnalysisLimits,
    pub embedding_model: ModelSource,
    pub ner_model: ModelSource,
    /// Where Word uploads are materialized. `None` means the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
}

/// Settings for the chat-completion endpoint and the candidate model list.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    /// Tried in order; the first model whose response parses wins.
    pub models: Vec<String>,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_LLM_API_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(60),
            temperature: 0.1,
            max_tokens: 1500,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("models", &self.models)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Truncation limits applied while building prompts and the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    pub max_resume_prompt_chars: usize,
    pub max_job_prompt_chars: usize,
    pub max_top_tips: usize,
    pub preview_chars: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            max_resume_prompt_chars: 3800,
            max_job_prompt_chars: 1000,
            max_top_tips: 5,
            preview_chars: 900,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            limits: AnalysisLimits::default(),
            embedding_model: ModelSource::Hub(DEFAULT_EMBEDDING_MODEL.to_string()),
            ner_model: ModelSource::Hub(DEFAULT_NER_MODEL.to_string()),
            scratch_dir: None,
            port: 8080,
            rust_log: "info".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let llm_defaults = defaults.llm;
        let limit_defaults = defaults.limits;

        let models = match optional_env("LLM_MODELS") {
            Some(raw) => parse_model_list(&raw),
            None => llm_defaults.models.clone(),
        };
        if models.is_empty() {
            anyhow::bail!("LLM_MODELS must name at least one model");
        }

        Ok(Config {
            llm: LlmConfig {
                api_key: optional_env("OPENROUTER_API_KEY"),
                api_url: optional_env("LLM_API_URL").unwrap_or(llm_defaults.api_url),
                models,
                timeout: Duration::from_secs(parse_env(
                    "LLM_TIMEOUT_SECS",
                    llm_defaults.timeout.as_secs(),
                )?),
                temperature: parse_env("LLM_TEMPERATURE", llm_defaults.temperature)?,
                max_tokens: parse_env("LLM_MAX_TOKENS", llm_defaults.max_tokens)?,
            },
            limits: AnalysisLimits {
                max_resume_prompt_chars: parse_env(
                    "MAX_RESUME_PROMPT_CHARS",
                    limit_defaults.max_resume_prompt_chars,
                )?,
                max_job_prompt_chars: parse_env(
                    "MAX_JOB_PROMPT_CHARS",
                    limit_defaults.max_job_prompt_chars,
                )?,
                max_top_tips: parse_env("MAX_TOP_TIPS", limit_defaults.max_top_tips)?,
                preview_chars: parse_env("PREVIEW_CHARS", limit_defaults.preview_chars)?,
            },
            embedding_model: ModelSource::parse(
                &optional_env("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            ),
            ner_model: ModelSource::parse(
                &optional_env("NER_MODEL").unwrap_or_else(|| DEFAULT_NER_MODEL.into()),
            ),
            scratch_dir: optional_env("SCRATCH_DIR").map(PathBuf::from),
            port: parse_env("PORT", defaults.port)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }
}

/// Splits a comma-separated model list, dropping blanks.
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Reads a variable, treating unset and blank values the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list_trims_and_drops_blanks() {
        let models = parse_model_list(" a/one , ,b/two,");
        assert_eq!(models, vec!["a/one".to_string(), "b/two".to_string()]);
    }

    #[test]
    fn test_default_limits_match_documented_constants() {
        let limits = AnalysisLimits::default();
        assert_eq!(limits.max_resume_prompt_chars, 3800);
        assert_eq!(limits.max_job_prompt_chars, 1000);
        assert_eq!(limits.max_top_tips, 5);
        assert_eq!(limits.preview_chars, 900);
    }

    #[test]
    fn test_llm_defaults() {
        let llm = LlmConfig::default();
        assert!(llm.api_key.is_none());
        assert_eq!(llm.models.len(), 2);
        assert_eq!(llm.timeout, Duration::from_secs(60));
        assert_eq!(llm.max_tokens, 1500);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let llm = LlmConfig {
            api_key: Some("sk-secret".to_string()),
            ..LlmConfig::default()
        };
        let rendered = format!("{llm:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
