//! Match cache maintenance

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::AppState;

/// DELETE /api/cache
///
/// Drops every cached marker query. Never needed for correctness; relieves
/// storage pressure and helps when debugging stale previews.
pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let removed = state.orchestrator.cache().clear_all();
    info!(removed, "Marker cache cleared");
    Json(json!({ "removed": removed }))
}
