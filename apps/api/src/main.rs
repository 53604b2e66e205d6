use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skillsight::config::Config;
use skillsight::pipeline::Pipeline;
use skillsight::routes::build_router;
use skillsight::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SkillSight API v{}", env!("CARGO_PKG_VERSION"));

    if config.llm.api_key.is_none() {
        warn!("OPENROUTER_API_KEY is not set; AI analysis requests will be rejected");
    }

    // Models load lazily on the first request that needs them
    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    info!("LLM candidates: {}", config.llm.models.join(", "));

    let state = AppState {
        pipeline,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
