use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the lazily loaded models; shared so they load once per process.
    pub pipeline: Arc<Pipeline>,
    pub config: Config,
}
