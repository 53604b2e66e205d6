//! Token classification with BIO span aggregation.

use anyhow::{anyhow, Context, Result};
use candle_core::{Module, D};
use candle_nn::{linear, Linear};

use super::bert::LoadedBert;
use super::{EntityRecognizer, EntitySpan, ModelSource};

const OUTSIDE: &str = "O";

/// Per-token prediction, with byte offsets into the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPrediction {
    pub label: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

/// BERT with a token-classification head (`classifier.weight`/`classifier.bias`).
pub struct BertEntityRecognizer {
    bert: LoadedBert,
    classifier: Linear,
    labels: Vec<String>,
    cls_id: u32,
    sep_id: u32,
}

impl BertEntityRecognizer {
    pub fn load(source: &ModelSource) -> Result<Self> {
        Self::new(LoadedBert::load(source)?)
            .with_context(|| format!("{source} is not a token-classification checkpoint"))
    }

    fn new(bert: LoadedBert) -> Result<Self> {
        let labels = bert.config.labels()?;
        if labels.is_empty() {
            return Err(anyhow!("config.json has no id2label mapping"));
        }

        let classifier = linear(bert.config.hidden_size, labels.len(), bert.vb.pp("classifier"))
            .context("Checkpoint has no token-classification head")?;

        let special = |token: &str| {
            bert.tokenizer
                .token_to_id(token)
                .ok_or_else(|| anyhow!("Tokenizer has no {token} token"))
        };
        let cls_id = special("[CLS]")?;
        let sep_id = special("[SEP]")?;

        Ok(Self {
            bert,
            classifier,
            labels,
            cls_id,
            sep_id,
        })
    }

    /// Classifies every word piece. Long inputs are split into windows that
    /// each fit the position table.
    fn predict(&self, text: &str) -> Result<Vec<TokenPrediction>> {
        let encoding = self
            .bert
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenization failed: {e}"))?;
        let ids = encoding.get_ids();
        let offsets = encoding.get_offsets();
        let window = self.bert.max_tokens().saturating_sub(2).max(1);

        let mut predictions = Vec::with_capacity(ids.len());
        for (chunk, chunk_offsets) in ids.chunks(window).zip(offsets.chunks(window)) {
            let mut input = Vec::with_capacity(chunk.len() + 2);
            input.push(self.cls_id);
            input.extend_from_slice(chunk);
            input.push(self.sep_id);

            let hidden = self.bert.hidden_states(&input)?;
            let logits = self.classifier.forward(&hidden)?.squeeze(0)?;
            let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
            let rows: Vec<Vec<f32>> = probs.to_vec2()?;

            // Rows 0 and n-1 belong to [CLS] and [SEP].
            for (row, &(start, end)) in rows[1..rows.len() - 1].iter().zip(chunk_offsets) {
                let (best, score) = argmax(row);
                predictions.push(TokenPrediction {
                    label: self.labels[best].clone(),
                    score,
                    start,
                    end,
                });
            }
        }
        Ok(predictions)
    }
}

impl EntityRecognizer for BertEntityRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let predictions = self.predict(text)?;
        Ok(aggregate_simple(text, &predictions))
    }
}

fn argmax(row: &[f32]) -> (usize, f32) {
    row.iter()
        .copied()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best })
}

/// Splits `B-ORG` into (`B`, `ORG`). Unprefixed labels behave like `I-`.
fn split_tag(label: &str) -> (Option<char>, &str) {
    match label.split_once('-') {
        Some((prefix, entity)) if prefix == "B" || prefix == "I" => (prefix.chars().next(), entity),
        _ => (None, label),
    }
}

/// Groups consecutive tokens into entity spans.
///
/// A `B-` tag always opens a new span. An `I-` tag extends the open span when
/// the entity type matches and opens a new one otherwise. `O` closes the open
/// span. Span scores are the mean of their token scores.
pub fn aggregate_simple(text: &str, predictions: &[TokenPrediction]) -> Vec<EntitySpan> {
    struct Open<'a> {
        entity: &'a str,
        start: usize,
        end: usize,
        score_sum: f32,
        tokens: usize,
    }

    fn close(text: &str, open: Open<'_>, spans: &mut Vec<EntitySpan>) {
        if let Some(slice) = text.get(open.start..open.end) {
            spans.push(EntitySpan {
                text: slice.to_string(),
                label: open.entity.to_string(),
                start: open.start,
                end: open.end,
                score: open.score_sum / open.tokens as f32,
            });
        }
    }

    let mut spans = Vec::new();
    let mut current: Option<Open<'_>> = None;

    for p in predictions {
        if p.label == OUTSIDE {
            if let Some(open) = current.take() {
                close(text, open, &mut spans);
            }
            continue;
        }

        let (prefix, entity) = split_tag(&p.label);
        let extends =
            matches!(&current, Some(open) if prefix != Some('B') && open.entity == entity);

        if extends {
            if let Some(open) = current.as_mut() {
                open.end = p.end;
                open.score_sum += p.score;
                open.tokens += 1;
            }
        } else {
            if let Some(open) = current.take() {
                close(text, open, &mut spans);
            }
            current = Some(Open {
                entity,
                start: p.start,
                end: p.end,
                score_sum: p.score,
                tokens: 1,
            });
        }
    }
    if let Some(open) = current {
        close(text, open, &mut spans);
    }
    spans
}
