use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

const SERVICE_NAME: &str = "thinkbridge-rs";

/// Liveness probe.
pub fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}

/// Liveness plus the active feature toggles.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let features = &state.config.features;
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "reasoning_display": features.show_reasoning,
        "thinking_mode": features.enable_thinking_mode,
    }))
}
