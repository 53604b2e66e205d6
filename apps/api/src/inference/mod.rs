//! Local model inference: sentence embeddings and named-entity recognition.
//!
//! Models are expensive to load, so each one sits behind a [`LazyModel`]: it is
//! built on first use, at most once per process, and shared by reference
//! afterwards. The pipeline's composition root owns the cells and hands them
//! to the components that need them, which keeps test doubles a one-liner.
//!
//! All inference here is CPU-bound and synchronous. Async callers must go
//! through `tokio::task::spawn_blocking`.

pub mod bert;
pub mod embedding;
pub mod ner;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub use embedding::BertEmbedder;
pub use ner::BertEntityRecognizer;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to load {model} model: {message}")]
    ModelLoad { model: String, message: String },

    #[error("Inference failed: {0}")]
    Inference(#[from] anyhow::Error),
}

/// Turns text into a fixed-dimension dense vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// A labelled span of the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySpan {
    pub text: String,
    pub label: String,
    /// Byte offsets into the source text.
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

/// Named-entity recognition with span aggregation.
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> anyhow::Result<Vec<EntitySpan>>;
}

type Loader<T> = Box<dyn Fn() -> anyhow::Result<Arc<T>> + Send + Sync>;

/// A model built on first access and reused afterwards.
///
/// Concurrent first callers block on the same initialization. A failed load
/// is not cached: the error goes back to the caller and the next call tries
/// again.
pub struct LazyModel<T: ?Sized> {
    name: String,
    cell: OnceCell<Arc<T>>,
    loader: Loader<T>,
}

impl<T: ?Sized + Send + Sync> LazyModel<T> {
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
            loader: Box::new(loader),
        }
    }

    /// A cell that is already initialized.
    pub fn ready(name: impl Into<String>, model: Arc<T>) -> Self
    where
        T: 'static,
    {
        let cell = OnceCell::new();
        let _ = cell.set(Arc::clone(&model));
        Self {
            name: name.into(),
            cell,
            loader: Box::new(move || Ok(Arc::clone(&model))),
        }
    }

    pub fn get(&self) -> Result<Arc<T>, InferenceError> {
        self.cell
            .get_or_try_init(|| {
                info!("Loading {} model", self.name);
                (self.loader)()
            })
            .map(Arc::clone)
            .map_err(|e| InferenceError::ModelLoad {
                model: self.name.clone(),
                message: format!("{e:#}"),
            })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: ?Sized> fmt::Debug for LazyModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModel")
            .field("name", &self.name)
            .field("loaded", &self.cell.get().is_some())
            .finish()
    }
}

/// Where model files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    Local(PathBuf),
    /// Hugging Face Hub repository id, fetched into the hub cache on first use.
    Hub(String),
}

impl ModelSource {
    /// An existing directory is a local source; anything else is a hub id.
    pub fn parse(raw: &str) -> Self {
        let path = Path::new(raw);
        if path.is_dir() {
            ModelSource::Local(path.to_path_buf())
        } else {
            ModelSource::Hub(raw.to_string())
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Local(path) => write!(f, "{}", path.display()),
            ModelSource::Hub(repo) => write!(f, "hf://{repo}"),
        }
    }
}
