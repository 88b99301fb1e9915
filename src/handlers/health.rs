use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::SyncState;

pub async fn health_handler(State(state): State<Arc<SyncState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "worker": state.worker }))
}
