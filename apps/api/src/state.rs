use std::sync::Arc;

use crate::context::ContextStore;
use crate::feedback::FeedbackLog;
use crate::scoring::sink::IncrementalSink;
use crate::scoring::ScoringOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Portfolio tables and thesis, loaded once at startup.
    pub context: Arc<ContextStore>,
    pub orchestrator: Arc<ScoringOrchestrator>,
    /// Set when the weights file failed to load; the orchestrator then runs with no dimensions.
    pub weights_error: Option<String>,
    /// Resumable batch output. `None` when INCREMENTAL_OUTPUT_PATH is unset.
    pub sink: Option<IncrementalSink>,
    /// Output of historical scoring runs, always resumable.
    pub historical_sink: IncrementalSink,
    pub feedback: FeedbackLog,
}
