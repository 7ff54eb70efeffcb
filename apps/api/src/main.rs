mod config;
mod errors;
mod interview;
mod llm_client;
mod models;
mod routes;
mod state;
mod taxonomy;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::interview::checkpoint::InMemoryCheckpointStore;
use crate::interview::engine::InterviewEngine;
use crate::llm_client::{LlmClient, LlmSettings};
use crate::routes::build_router;
use crate::state::{AppState, SessionLocks};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing production credential)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interviewer API v{}", env!("CARGO_PKG_VERSION"));

    // Taxonomy: degrade to an empty domain list rather than refusing to start
    let taxonomy = Arc::new(taxonomy::load_or_empty(&config.taxonomy_path));

    // Initialize LLM gateway
    if config.api_key().is_none() {
        warn!(
            "{} is not set; language model calls will fail until it is provided",
            config.model_provider.api_key_var()
        );
    }
    let llm = LlmClient::new(LlmSettings::from_config(&config))?;
    info!(
        "LLM client initialized (provider: {:?}, model: {}, timeout: {}s, retries: {}, caching: {})",
        llm.settings().provider,
        llm.settings().model,
        llm.settings().timeout.as_secs(),
        llm.settings().max_retries,
        llm.settings().enable_caching
    );

    let limits = config.limits();
    info!(
        "Interview limits: max_topics={}, max_questions_per_topic={}",
        limits.max_topics, limits.max_questions_per_topic
    );

    let engine = InterviewEngine::new(
        Arc::new(llm),
        Arc::new(InMemoryCheckpointStore::new()),
        taxonomy.clone(),
        limits,
    );

    // Build app state
    let state = AppState {
        engine: Arc::new(engine),
        taxonomy,
        session_locks: Arc::new(SessionLocks::default()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
