use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Trigger body for POST /sync. The webhook contract is lenient: an absent or
// unparseable body means a full sync.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncTrigger {
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

impl SyncTrigger {
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

// What a run will attempt. Full stays symbolic until the orchestrator resolves
// it against the artifact source at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMode {
    Full,
    Files(Vec<String>),
}

impl From<&SyncTrigger> for SyncMode {
    fn from(trigger: &SyncTrigger) -> Self {
        match &trigger.files {
            Some(files) if !files.is_empty() => SyncMode::Files(files.clone()),
            _ => SyncMode::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncUnitError {
    pub file: String,
    pub error: String,
}

// Aggregated outcome of one sync run. Persisted under sync:<syncId> and
// immutable once the run completes; later runs write new records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub sync_id: String,
    pub timestamp: DateTime<Utc>,
    pub files_processed: u32,
    pub files_failed: u32,
    pub errors: Vec<SyncUnitError>,
    pub duration_ms: u64,
}

// Advisory singleton naming the most recently completed run. Overwritten at the
// end of every successful run, last writer wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestSyncPointer {
    pub sync_id: String,
    pub timestamp: DateTime<Utc>,
}
