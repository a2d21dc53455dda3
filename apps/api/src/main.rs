mod config;
mod context;
mod errors;
mod feedback;
mod ingest;
mod llm_client;
mod models;
mod routes;
mod scoring;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::context::ContextStore;
use crate::feedback::FeedbackLog;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::scoring::client::ScoringClient;
use crate::scoring::pacer::RequestPacer;
use crate::scoring::sink::IncrementalSink;
use crate::scoring::weights::ScoringWeights;
use crate::scoring::ScoringOrchestrator;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Deal Flow API v{}", env!("CARGO_PKG_VERSION"));

    // Scoring weights: a broken file keeps the server up but fails the weights endpoint
    let (weights, weights_error) = match ScoringWeights::load(&config.scoring_config_path) {
        Ok(weights) => {
            if weights.is_empty() {
                warn!("Scoring config defines no categories; every final score will be 0");
            }
            info!(
                "Scoring weights loaded from {}: {} dimensions",
                config.scoring_config_path.display(),
                weights.dimensions().count()
            );
            (weights, None)
        }
        Err(e) => {
            error!("Failed to load scoring weights: {e}");
            (ScoringWeights::default(), Some(e.to_string()))
        }
    };

    // Portfolio context
    let context = ContextStore::load(&config.context_paths());
    if !context.is_ready() {
        warn!("Scoring context incomplete; analysis endpoints will return 503");
    }

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_api_url.clone(),
        config.llm_timeout,
    )?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let orchestrator = ScoringOrchestrator::new(
        ScoringClient::new(Arc::new(llm), config.llm_timeout),
        Arc::new(weights),
        RequestPacer::new(config.inter_row_delay),
        config.identity_column.clone(),
    );
    info!(
        "Scoring orchestrator ready (identity column: '{}', pacing: {:?})",
        config.identity_column, config.inter_row_delay
    );

    let sink = config.incremental_output_path.as_ref().map(|path| {
        info!("Incremental output enabled at {}", path.display());
        IncrementalSink::new(path)
    });

    let historical_sink = IncrementalSink::new(&config.historical_output_path);
    let feedback =
        FeedbackLog::new(&config.feedback_log_path).with_timestamps(config.feedback_timestamp);
    info!("Feedback log at {}", feedback.path().display());

    // Build app state
    let state = AppState {
        context: Arc::new(context),
        orchestrator: Arc::new(orchestrator),
        weights_error,
        sink,
        historical_sink,
        feedback,
    };

    // Build router
    let app = build_router(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `*` allows any origin; otherwise only the listed origins.
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("ALLOWED_ORIGINS has an invalid origin '{o}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}
