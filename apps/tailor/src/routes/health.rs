use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::llm_client::DEFAULT_MODEL;
use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and configured model.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "tailor",
        "model": state.config.model.as_deref().unwrap_or(DEFAULT_MODEL),
        "steps": state
            .pipeline
            .step_kinds()
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
    }))
}
