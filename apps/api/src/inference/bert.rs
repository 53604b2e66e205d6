//! BERT encoder on Candle, shared by the embedder and the entity recognizer.
//!
//! Only the inference path is implemented: no dropout, one sequence per call.
//! Padding and truncation are switched off on the tokenizer when it loads, so
//! every row the encoder sees is a real token and no attention mask is needed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{layer_norm, linear, Activation, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::info;

use super::ModelSource;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Subset of a Hugging Face `config.json` needed for BERT inference.
#[derive(Debug, Clone, Deserialize)]
pub struct BertConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_hidden_act")]
    pub hidden_act: String,
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    /// Token-classification labels, keyed by the stringified class index.
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
}

fn default_hidden_act() -> String {
    "gelu".to_string()
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl BertConfig {
    fn activation(&self) -> Activation {
        match self.hidden_act.as_str() {
            "relu" => Activation::Relu,
            "gelu_new" | "gelu_pytorch_tanh" => Activation::NewGelu,
            _ => Activation::Gelu,
        }
    }

    /// Labels ordered by class index. Fails on gaps or non-numeric keys.
    pub fn labels(&self) -> Result<Vec<String>> {
        let mut indexed = self
            .id2label
            .iter()
            .map(|(k, v)| {
                k.parse::<usize>()
                    .map(|i| (i, v.clone()))
                    .with_context(|| format!("id2label key '{k}' is not an index"))
            })
            .collect::<Result<Vec<_>>>()?;
        indexed.sort_by_key(|(i, _)| *i);

        for (expected, (i, _)) in indexed.iter().enumerate() {
            if *i != expected {
                return Err(anyhow!("id2label is missing class {expected}"));
            }
        }
        Ok(indexed.into_iter().map(|(_, label)| label).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model files
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelSource {
    /// Locates (and for hub sources downloads) the three files a BERT model needs.
    pub fn resolve(&self) -> Result<ModelFiles> {
        match self {
            ModelSource::Local(dir) => {
                let files = ModelFiles {
                    config: dir.join(CONFIG_FILE),
                    tokenizer: dir.join(TOKENIZER_FILE),
                    weights: dir.join(WEIGHTS_FILE),
                };
                for path in [&files.config, &files.tokenizer, &files.weights] {
                    if !path.exists() {
                        return Err(anyhow!("Model file not found at {}", path.display()));
                    }
                }
                Ok(files)
            }
            ModelSource::Hub(repo_id) => {
                use hf_hub::api::sync::Api;

                info!("Fetching {repo_id} from the Hugging Face Hub");
                let api = Api::new().context("Failed to initialize Hugging Face Hub client")?;
                let repo = api.model(repo_id.clone());
                let fetch = |name: &str| {
                    repo.get(name)
                        .with_context(|| format!("Failed to fetch {name} from {repo_id}"))
                };
                Ok(ModelFiles {
                    config: fetch(CONFIG_FILE)?,
                    tokenizer: fetch(TOKENIZER_FILE)?,
                    weights: fetch(WEIGHTS_FILE)?,
                })
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Encoder layers
// ────────────────────────────────────────────────────────────────────────────

struct Embeddings {
    word: candle_nn::Embedding,
    position: candle_nn::Embedding,
    token_type: candle_nn::Embedding,
    layer_norm: LayerNorm,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        Ok(Self {
            word: candle_nn::embedding(config.vocab_size, config.hidden_size, vb.pp("word_embeddings"))?,
            position: candle_nn::embedding(
                config.max_position_embeddings,
                config.hidden_size,
                vb.pp("position_embeddings"),
            )?,
            token_type: candle_nn::embedding(
                config.type_vocab_size,
                config.hidden_size,
                vb.pp("token_type_embeddings"),
            )?,
            layer_norm: layer_norm(config.hidden_size, config.layer_norm_eps, vb.pp("LayerNorm"))?,
        })
    }

    /// `input_ids`: `[1, seq]` → `[1, seq, hidden]`.
    fn forward(&self, input_ids: &Tensor) -> candle_core::Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?.unsqueeze(0)?;
        let token_types = input_ids.zeros_like()?;

        let embeddings = self
            .word
            .forward(input_ids)?
            .broadcast_add(&self.position.forward(&positions)?)?
            .broadcast_add(&self.token_type.forward(&token_types)?)?;
        self.layer_norm.forward(&embeddings)
    }
}

struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    heads: usize,
    head_size: usize,
}

impl SelfAttention {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let head_size = config.hidden_size / config.num_attention_heads;
        let all_heads = head_size * config.num_attention_heads;
        Ok(Self {
            query: linear(config.hidden_size, all_heads, vb.pp("query"))?,
            key: linear(config.hidden_size, all_heads, vb.pp("key"))?,
            value: linear(config.hidden_size, all_heads, vb.pp("value"))?,
            heads: config.num_attention_heads,
            head_size,
        })
    }

    /// `[b, seq, hidden]` → `[b, heads, seq, head_size]`
    fn split_heads(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (b, seq, _) = x.dims3()?;
        x.reshape((b, seq, self.heads, self.head_size))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(&self, hidden: &Tensor) -> candle_core::Result<Tensor> {
        let q = self.split_heads(&self.query.forward(hidden)?)?;
        let k = self.split_heads(&self.key.forward(hidden)?)?;
        let v = self.split_heads(&self.value.forward(hidden)?)?;

        let scores = (q.matmul(&k.t()?.contiguous()?)? / (self.head_size as f64).sqrt())?;
        let probs = candle_nn::ops::softmax_last_dim(&scores)?;
        let context = probs.matmul(&v)?;

        let (b, _, seq, _) = context.dims4()?;
        context
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, seq, self.heads * self.head_size))
    }
}

struct Layer {
    attention: SelfAttention,
    attention_out: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    activation: Activation,
    output: Linear,
    output_norm: LayerNorm,
}

impl Layer {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let h = config.hidden_size;
        let eps = config.layer_norm_eps;
        Ok(Self {
            attention: SelfAttention::load(vb.pp("attention.self"), config)?,
            attention_out: linear(h, h, vb.pp("attention.output.dense"))?,
            attention_norm: layer_norm(h, eps, vb.pp("attention.output.LayerNorm"))?,
            intermediate: linear(h, config.intermediate_size, vb.pp("intermediate.dense"))?,
            activation: config.activation(),
            output: linear(config.intermediate_size, h, vb.pp("output.dense"))?,
            output_norm: layer_norm(h, eps, vb.pp("output.LayerNorm"))?,
        })
    }

    fn forward(&self, hidden: &Tensor) -> candle_core::Result<Tensor> {
        let attended = self.attention_out.forward(&self.attention.forward(hidden)?)?;
        let hidden = self.attention_norm.forward(&(attended + hidden)?)?;

        let expanded = self.activation.forward(&self.intermediate.forward(&hidden)?)?;
        let projected = self.output.forward(&expanded)?;
        self.output_norm.forward(&(projected + &hidden)?)
    }
}

/// Embeddings plus the transformer stack; produces the last hidden state.
pub struct BertEncoder {
    embeddings: Embeddings,
    layers: Vec<Layer>,
}

impl BertEncoder {
    /// Accepts both bare encoder checkpoints (sentence-transformers) and
    /// task checkpoints that nest the encoder under `bert.`.
    pub fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let vb = if vb.contains_tensor("embeddings.word_embeddings.weight") {
            vb
        } else {
            vb.pp("bert")
        };

        let embeddings = Embeddings::load(vb.pp("embeddings"), config)?;
        let layer_vb = vb.pp("encoder.layer");
        let layers = (0..config.num_hidden_layers)
            .map(|i| Layer::load(layer_vb.pp(i), config))
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(Self { embeddings, layers })
    }

    /// `input_ids`: `[1, seq]` (u32) → `[1, seq, hidden]`.
    pub fn forward(&self, input_ids: &Tensor) -> candle_core::Result<Tensor> {
        let mut hidden = self.embeddings.forward(input_ids)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }
        Ok(hidden)
    }
}

/// Everything needed to run a BERT checkpoint.
pub struct LoadedBert {
    pub config: BertConfig,
    pub tokenizer: Tokenizer,
    pub encoder: BertEncoder,
    /// Root of the checkpoint, for task heads that live next to the encoder.
    pub vb: VarBuilder<'static>,
    pub device: Device,
}

impl LoadedBert {
    pub fn load(source: &ModelSource) -> Result<Self> {
        let files = source.resolve()?;
        let device = Device::Cpu;

        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&files.config)
                .with_context(|| format!("Failed to read {}", files.config.display()))?,
        )
        .context("Failed to parse config.json")?;

        info!(
            "BERT config: {} layers, {} hidden, {} heads",
            config.num_hidden_layers, config.hidden_size, config.num_attention_heads
        );

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer: {e}"))?;

        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, &device)? };

        let bert = Self::from_parts(config, tokenizer, vb, device)?;
        info!("Loaded model from {source}");
        Ok(bert)
    }

    pub fn from_parts(
        config: BertConfig,
        tokenizer: Tokenizer,
        vb: VarBuilder<'static>,
        device: Device,
    ) -> Result<Self> {
        let tokenizer = unpadded(tokenizer)?;
        let encoder = BertEncoder::load(vb.clone(), &config)?;
        Ok(Self {
            config,
            tokenizer,
            encoder,
            vb,
            device,
        })
    }

    /// Longest token sequence the position table allows.
    pub fn max_tokens(&self) -> usize {
        self.config.max_position_embeddings
    }

    /// Runs the encoder over one token sequence.
    pub fn hidden_states(&self, ids: &[u32]) -> Result<Tensor> {
        let input = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        Ok(self.encoder.forward(&input)?)
    }
}

/// Clears the padding and truncation settings shipped in `tokenizer.json`.
///
/// sentence-transformers exports pad every input to a fixed length. Callers
/// do their own windowing against the position table.
fn unpadded(mut tokenizer: Tokenizer) -> Result<Tokenizer> {
    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(None)
        .map_err(|e| anyhow!("Failed to reset tokenizer truncation: {e}"))?;
    Ok(tokenizer)
}
