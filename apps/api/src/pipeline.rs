//! Report assembly.
//!
//! [`Pipeline`] is the composition root: it owns the extractor, the lazily
//! loaded models and the LLM analyzer, and runs one upload through every
//! stage. Model-bound stages run on the blocking pool.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::{AnalysisFailure, AnalysisResult, LlmAnalyzer};
use crate::config::{AnalysisLimits, Config};
use crate::extraction::{normalize, TextExtractor};
use crate::inference::{
    BertEmbedder, BertEntityRecognizer, Embedder, EntityRecognizer, LazyModel,
};
use crate::llm_client::LlmClient;
use crate::scoring::clarity::score_signals;
use crate::scoring::{compute_overall, ClarityBand, ClaritySignals, ScoringWeights, SemanticMatcher};
use crate::skills::SkillExtractor;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisFailure),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// One upload to analyze.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub bytes: Bytes,
    pub file_name: String,
    pub job_description: Option<String>,
    pub enable_ai: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClarityReport {
    pub score: u8,
    pub band: ClarityBand,
    pub label: &'static str,
    pub signals: ClaritySignals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub job_match: u8,
    pub ats: u8,
    /// The model's clarity score when it reported one, else the heuristic.
    pub clarity: u8,
    pub overall: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub file_name: String,
    pub normalized_text: String,
    pub preview: String,
    pub clarity: ClarityReport,
    pub skills: Vec<String>,
    /// Present only when a job description was supplied and the model ran.
    pub semantic_match: Option<u8>,
    pub analysis: Option<AnalysisResult>,
    pub scores: Option<ScoreBreakdown>,
    pub top_tips: Vec<String>,
    /// Degraded stages, in the order they happened.
    pub warnings: Vec<String>,
}

pub struct Pipeline {
    extractor: TextExtractor,
    analyzer: LlmAnalyzer,
    matcher: SemanticMatcher,
    skills: SkillExtractor,
    limits: AnalysisLimits,
    weights: ScoringWeights,
}

impl Pipeline {
    pub fn new(
        extractor: TextExtractor,
        analyzer: LlmAnalyzer,
        matcher: SemanticMatcher,
        skills: SkillExtractor,
        limits: AnalysisLimits,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            matcher,
            skills,
            limits,
            weights: ScoringWeights::default(),
        }
    }

    /// Production wiring. Models are not loaded here; each loads on first use.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = LlmClient::new(&config.llm)?;
        let analyzer = LlmAnalyzer::new(
            Arc::new(client),
            config.llm.models.clone(),
            config.limits,
        );

        let embedding_source = config.embedding_model.clone();
        let embedder: LazyModel<dyn Embedder> = LazyModel::new("embedding", move || {
            Ok(Arc::new(BertEmbedder::load(&embedding_source)?) as Arc<dyn Embedder>)
        });

        let ner_source = config.ner_model.clone();
        let recognizer: LazyModel<dyn EntityRecognizer> = LazyModel::new("ner", move || {
            Ok(Arc::new(BertEntityRecognizer::load(&ner_source)?) as Arc<dyn EntityRecognizer>)
        });

        info!(
            "Pipeline configured: models={:?}, embedding={}, ner={}",
            config.llm.models, config.embedding_model, config.ner_model
        );

        Ok(Self::new(
            TextExtractor::new(config.scratch_dir.clone()),
            analyzer,
            SemanticMatcher::new(Arc::new(embedder)),
            SkillExtractor::new(Arc::new(recognizer)),
            config.limits,
        ))
    }

    pub async fn run(&self, request: AnalysisRequest) -> Result<ResumeReport, PipelineError> {
        let report_id = Uuid::new_v4();
        let span = info_span!("analysis", %report_id, file = %request.file_name);
        self.run_stages(report_id, request).instrument(span).await
    }

    async fn run_stages(
        &self,
        report_id: Uuid,
        request: AnalysisRequest,
    ) -> Result<ResumeReport, PipelineError> {
        let mut warnings = Vec::new();

        let extractor = self.extractor.clone();
        let bytes = request.bytes.clone();
        let file_name = request.file_name.clone();
        let raw = run_blocking(move || extractor.extract_text(&bytes, &file_name)).await?;
        if raw.trim().is_empty() {
            warnings.push("No text could be extracted from the document".to_string());
        }

        let text = normalize(&raw);
        let signals = ClaritySignals::of(&text);
        let heuristic_clarity = score_signals(signals);
        let band = ClarityBand::for_score(heuristic_clarity);
        debug!(?signals, heuristic_clarity, "Clarity scored");

        let skill_extractor = self.skills.clone();
        let skill_text = text.clone();
        let skills = run_blocking(move || skill_extractor.extract(&skill_text)).await?;

        let job = request
            .job_description
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty());

        let semantic_match = match job {
            Some(job) => {
                let matcher = self.matcher.clone();
                let resume_text = text.clone();
                let job_text = job.to_string();
                match run_blocking(move || matcher.score(&resume_text, &job_text)).await? {
                    Ok(score) => Some(score),
                    Err(e) => {
                        warn!("Semantic match unavailable: {e}");
                        warnings.push(format!("Semantic match unavailable: {e}"));
                        None
                    }
                }
            }
            None => None,
        };

        let (analysis, scores, top_tips) = if request.enable_ai {
            let result = self.analyzer.analyze(&text, job).await?;
            let scores = self.breakdown(&result, heuristic_clarity);
            let tips = result
                .top_tips
                .iter()
                .take(self.limits.max_top_tips)
                .cloned()
                .collect();
            (Some(result), Some(scores), tips)
        } else {
            debug!("AI analysis disabled for this request");
            (None, None, Vec::new())
        };

        info!(
            clarity = heuristic_clarity,
            skills = skills.len(),
            overall = scores.map(|s| s.overall),
            "Report assembled"
        );

        Ok(ResumeReport {
            report_id,
            generated_at: Utc::now(),
            file_name: request.file_name,
            preview: preview(&text, self.limits.preview_chars),
            normalized_text: text,
            clarity: ClarityReport {
                score: heuristic_clarity,
                band,
                label: band.label(),
                signals,
            },
            skills,
            semantic_match,
            analysis,
            scores,
            top_tips,
            warnings,
        })
    }

    fn breakdown(&self, result: &AnalysisResult, heuristic_clarity: u8) -> ScoreBreakdown {
        let clarity = result.effective_clarity(heuristic_clarity);
        ScoreBreakdown {
            job_match: result.job_match_score,
            ats: result.ats_compatibility_score,
            clarity,
            overall: compute_overall(
                result.job_match_score,
                result.ats_compatibility_score,
                clarity,
                &self.weights,
            ),
        }
    }
}

/// First `max` characters, with "..." appended when anything was cut.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

async fn run_blocking<F, T>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))
}
