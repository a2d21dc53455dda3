use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service version and whether scoring inputs are loaded.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let context_ready = state.context.is_ready();
    let weights_loaded = state.weights_error.is_none();
    Json(json!({
        "status": if context_ready && weights_loaded { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "service": "dealflow-api",
        "context_ready": context_ready,
        "weights_loaded": weights_loaded
    }))
}
