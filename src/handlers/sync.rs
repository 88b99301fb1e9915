use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::kv;
use crate::models::{LatestSyncPointer, SyncTrigger};
use crate::state::SyncState;
use crate::sync::LATEST_KEY;

// POST /sync: runs the orchestrator and reports the aggregate. Units failing is
// still a 200 with the counts in the body; only a run-level failure is a 500.
pub async fn sync_handler(State(state): State<Arc<SyncState>>, body: Bytes) -> Response {
    let trigger = SyncTrigger::from_body(&body);
    match state.orchestrator.run(&trigger).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => {
            error!("sync run failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Sync failed", "message": err.to_string() })),
            )
                .into_response()
        }
    }
}

// GET /sync/status: the latest pointer, if any run has completed.
pub async fn sync_status_handler(State(state): State<Arc<SyncState>>) -> Response {
    match kv::get_json::<LatestSyncPointer>(state.kv.as_ref(), LATEST_KEY).await {
        Ok(Some(pointer)) => Json(pointer).into_response(),
        Ok(None) => Json(json!({ "message": "No syncs yet" })).into_response(),
        Err(err) => {
            error!("reading latest sync pointer failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "message": err.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn not_found_handler() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}
