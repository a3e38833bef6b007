//! Diagnostic log endpoints for the debug panel.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /v1/diag
pub async fn list_entries(State(state): State<Arc<AppState>>) -> Json<Value> {
    let entries = state.diag.entries();
    Json(json!({
        "count": entries.len(),
        "entries": entries,
    }))
}

/// DELETE /v1/diag
pub async fn clear_entries(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.diag.clear();
    Json(json!({"cleared": true}))
}
