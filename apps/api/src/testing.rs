//! Test doubles for the model and network seams.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tracing::subscriber::DefaultGuard;

use crate::inference::{Embedder, EntityRecognizer, EntitySpan};
use crate::llm_client::{ChatBackend, LlmError};

const BAG_DIMENSIONS: usize = 4096;

/// Embeds text as a hashed bag of lower-cased words.
pub struct BagOfWordsEmbedder;

impl Embedder for BagOfWordsEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0; BAG_DIMENSIONS];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() as usize) % BAG_DIMENSIONS] += 1.0;
        }
        Ok(v)
    }
}

/// Counts calls and returns a constant vector.
#[derive(Default)]
pub struct CountingEmbedder {
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0, 0.0, 0.0])
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding backend unavailable")
    }
}

/// Returns the same spans for every input.
pub struct FixedRecognizer {
    spans: Vec<EntitySpan>,
}

impl FixedRecognizer {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            spans: texts
                .iter()
                .map(|t| EntitySpan {
                    text: t.to_string(),
                    label: "MISC".to_string(),
                    start: 0,
                    end: t.len(),
                    score: 0.9,
                })
                .collect(),
        }
    }
}

impl EntityRecognizer for FixedRecognizer {
    fn recognize(&self, _text: &str) -> anyhow::Result<Vec<EntitySpan>> {
        Ok(self.spans.clone())
    }
}

pub struct FailingRecognizer;

impl EntityRecognizer for FailingRecognizer {
    fn recognize(&self, _text: &str) -> anyhow::Result<Vec<EntitySpan>> {
        anyhow::bail!("ner pipeline crashed")
    }
}

/// One scripted chat completion.
pub enum Reply {
    Text(String),
    /// An HTTP 500 from the endpoint.
    Fail,
}

/// Answers calls from a script, in order, and records what was asked.
/// Once the script runs out every call fails.
pub struct ScriptedBackend {
    configured: bool,
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            configured: true,
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(Vec::new())
        }
    }

    /// Models called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, model: &str, _system: &str, prompt: &str) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.prompts.lock().unwrap().push(prompt.to_string());

        match self.script.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) | None => Err(LlmError::Api {
                status: 500,
                message: format!("{model} is unavailable"),
            }),
        }
    }
}

/// Collects formatted log lines written on the current thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Installs a WARN-and-above subscriber for as long as the guard lives.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        (capture, tracing::subscriber::set_default(subscriber))
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buf.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
