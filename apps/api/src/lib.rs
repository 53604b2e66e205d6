pub mod analysis;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod inference;
pub mod llm_client;
pub mod pipeline;
pub mod routes;
pub mod scoring;
pub mod skills;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{parse_first_json_object, AnalysisFailure, AnalysisResult, LlmAnalyzer};
pub use config::{AnalysisLimits, Config};
pub use extraction::{extract_text, normalize, TextExtractor};
pub use pipeline::{AnalysisRequest, Pipeline, PipelineError, ResumeReport};
pub use scoring::{aggregate, clarity_score, SemanticMatcher};
pub use skills::SkillExtractor;
