//! LLM-backed resume assessment.
//!
//! Builds a bounded prompt, walks the configured model list until one
//! answers with a parseable JSON object, and maps that object onto an
//! [`AnalysisResult`] with safe defaults.

pub mod analyzer;
pub mod json_extract;
pub mod prompts;
pub mod result;

pub use analyzer::{AnalysisFailure, LlmAnalyzer, ModelAttempt, EXHAUSTED_MESSAGE};
pub use json_extract::{parse_first_json_object, JsonExtractError};
pub use result::AnalysisResult;
