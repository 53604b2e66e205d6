use anyhow::{anyhow, Result};

use super::bert::LoadedBert;
use super::{Embedder, ModelSource};

/// sentence-transformers models are trained on at most 256 word pieces.
const MAX_SEQUENCE_TOKENS: usize = 256;

/// Mean-pooled, L2-normalized sentence embeddings from a BERT checkpoint.
pub struct BertEmbedder {
    bert: LoadedBert,
    max_tokens: usize,
}

impl BertEmbedder {
    pub fn load(source: &ModelSource) -> Result<Self> {
        Ok(Self::new(LoadedBert::load(source)?))
    }

    fn new(bert: LoadedBert) -> Self {
        let max_tokens = MAX_SEQUENCE_TOKENS.min(bert.max_tokens());
        Self { bert, max_tokens }
    }

    /// Word pieces fed to the encoder, special tokens included.
    fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .bert
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {e}"))?;
        Ok(truncate_keeping_last(encoding.get_ids(), self.max_tokens))
    }
}

impl Embedder for BertEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let ids = self.token_ids(text)?;

        let hidden = self.bert.hidden_states(&ids)?;
        let pooled: Vec<f32> = hidden.mean(1)?.squeeze(0)?.to_vec1()?;
        Ok(l2_normalize(pooled))
    }
}

/// Cuts `ids` to `max` entries while keeping the final (separator) token.
fn truncate_keeping_last(ids: &[u32], max: usize) -> Vec<u32> {
    if ids.len() <= max || max == 0 {
        return ids.to_vec();
    }
    let mut kept = ids[..max - 1].to_vec();
    kept.push(ids[ids.len() - 1]);
    kept
}

pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
