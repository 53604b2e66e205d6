use std::sync::Arc;

use crate::inference::{Embedder, InferenceError, LazyModel};

/// Resume/job-description similarity on a 0–100 scale.
#[derive(Debug, Clone)]
pub struct SemanticMatcher {
    embedder: Arc<LazyModel<dyn Embedder>>,
}

impl SemanticMatcher {
    pub fn new(embedder: Arc<LazyModel<dyn Embedder>>) -> Self {
        Self { embedder }
    }

    /// Cosine similarity of the two embeddings, clamped to [0, 1] and scaled
    /// to a rounded percentage.
    ///
    /// Returns 0 without touching the model when either text is blank. Model
    /// load and inference failures are returned to the caller.
    pub fn score(&self, resume_text: &str, job_text: &str) -> Result<u8, InferenceError> {
        if resume_text.trim().is_empty() || job_text.trim().is_empty() {
            return Ok(0);
        }

        let model = self.embedder.get()?;
        let resume = model.embed(resume_text)?;
        let job = model.embed(job_text)?;
        Ok(similarity_to_score(cosine_similarity(&resume, &job)))
    }
}

/// 0.0 for mismatched dimensions or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn similarity_to_score(similarity: f32) -> u8 {
    if similarity.is_nan() {
        return 0;
    }
    (similarity.clamp(0.0, 1.0) * 100.0).round() as u8
}
