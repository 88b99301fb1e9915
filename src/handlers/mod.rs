mod health;
mod metrics;
mod sync;
mod throttle;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use sync::{not_found_handler, sync_handler, sync_status_handler};
pub use throttle::{client_identity, proxy_handler};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::{GateState, SyncState};

// Everything not matched by an explicit route goes through the proxy.
pub fn gate_router(state: Arc<GateState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(proxy_handler)
        .with_state(state)
}

pub fn sync_router(state: Arc<SyncState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/sync", post(sync_handler))
        .route("/sync/status", get(sync_status_handler))
        .fallback(not_found_handler)
        .with_state(state)
}
