use std::sync::Arc;

use crate::kv::KvStore;
use crate::rate_limit::ThrottleGate;
use crate::sync::SyncOrchestrator;

// Shared state for the throttle gate binary.
pub struct GateState {
    pub client: reqwest::Client,
    pub origin: String,
    pub protected_prefix: String,
    pub gate: ThrottleGate,
}

// Shared state for the sync worker binary.
pub struct SyncState {
    pub kv: Arc<dyn KvStore>,
    pub orchestrator: SyncOrchestrator,
    pub worker: String,
}
