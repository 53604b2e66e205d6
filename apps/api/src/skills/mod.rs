//! Skill extraction: entity spans from the NER model merged with a fixed
//! keyword list.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::inference::{EntityRecognizer, InferenceError, LazyModel};

/// Skills matched as case-insensitive substrings of the resume text.
pub const BASE_SKILLS: [&str; 15] = [
    "python",
    "pandas",
    "numpy",
    "sql",
    "power bi",
    "excel",
    "machine learning",
    "deep learning",
    "pytorch",
    "tensorflow",
    "docker",
    "kubernetes",
    "aws",
    "react",
    "flask",
];

/// Entity spans this short are mostly word-piece noise.
const MIN_SPAN_CHARS: usize = 3;

#[derive(Debug, Clone)]
pub struct SkillExtractor {
    recognizer: Arc<LazyModel<dyn EntityRecognizer>>,
    keywords: Vec<String>,
}

impl SkillExtractor {
    pub fn new(recognizer: Arc<LazyModel<dyn EntityRecognizer>>) -> Self {
        Self::with_keywords(recognizer, BASE_SKILLS)
    }

    pub fn with_keywords<I, S>(recognizer: Arc<LazyModel<dyn EntityRecognizer>>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recognizer,
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        }
    }

    /// Sorted, de-duplicated, lower-cased skills found in `text`.
    ///
    /// Keyword matching only runs after the entity model succeeds. A model
    /// failure yields an empty list.
    pub fn extract(&self, text: &str) -> Vec<String> {
        match self.try_extract(text) {
            Ok(skills) => skills.into_iter().collect(),
            Err(e) => {
                warn!("Skill extraction failed, returning no skills: {e}");
                Vec::new()
            }
        }
    }

    fn try_extract(&self, text: &str) -> Result<BTreeSet<String>, InferenceError> {
        let recognizer = self.recognizer.get()?;
        let spans = recognizer.recognize(text)?;
        debug!("NER returned {} spans", spans.len());

        let mut found: BTreeSet<String> = spans
            .iter()
            .filter(|span| span.text.chars().count() >= MIN_SPAN_CHARS)
            .map(|span| span.text.trim().to_lowercase())
            .filter(|skill| !skill.is_empty())
            .collect();

        let lowered = text.to_lowercase();
        found.extend(
            self.keywords
                .iter()
                .filter(|kw| lowered.contains(kw.as_str()))
                .cloned(),
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingRecognizer, FixedRecognizer};

    fn extractor(recognizer: impl EntityRecognizer + 'static) -> SkillExtractor {
        SkillExtractor::new(Arc::new(LazyModel::ready(
            "test-ner",
            Arc::new(recognizer) as Arc<dyn EntityRecognizer>,
        )))
    }

    #[test]
    fn test_merges_entities_and_keywords_sorted() {
        let ex = extractor(FixedRecognizer::new(&["Acme Corp", "Berlin", "  Rust "]));
        let skills = ex.extract("Built Docker images and SQL reports at Acme Corp");
        assert_eq!(skills, vec!["acme corp", "berlin", "docker", "rust", "sql"]);
    }

    #[test]
    fn test_short_spans_dropped() {
        let ex = extractor(FixedRecognizer::new(&["Go", "C", "AWS"]));
        assert_eq!(ex.extract("nothing to match here"), vec!["aws"]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let ex = extractor(FixedRecognizer::new(&["Python", "python", "PYTHON"]));
        assert_eq!(ex.extract("python and Python"), vec!["python"]);
    }

    #[test]
    fn test_keyword_order_does_not_matter() {
        let text = "Machine Learning with PyTorch, pandas and numpy on AWS";
        let forward = extractor(FixedRecognizer::new(&[])).extract(text);

        let mut reversed_keywords = BASE_SKILLS.to_vec();
        reversed_keywords.reverse();
        let reversed = SkillExtractor::with_keywords(
            Arc::new(LazyModel::ready(
                "test-ner",
                Arc::new(FixedRecognizer::new(&[])) as Arc<dyn EntityRecognizer>,
            )),
            reversed_keywords,
        )
        .extract(text);

        assert_eq!(forward, reversed);
        assert_eq!(
            forward,
            vec!["aws", "machine learning", "numpy", "pandas", "pytorch"]
        );
        assert_eq!(forward, extractor(FixedRecognizer::new(&[])).extract(text));
    }

    #[test]
    fn test_recognizer_failure_returns_empty() {
        let ex = extractor(FailingRecognizer);
        assert!(ex.extract("python docker kubernetes").is_empty());
    }

    #[test]
    fn test_model_load_failure_returns_empty() {
        let ex = SkillExtractor::new(Arc::new(LazyModel::new("missing", || {
            anyhow::bail!("no weights")
        })));
        assert!(ex.extract("python").is_empty());
    }
}
