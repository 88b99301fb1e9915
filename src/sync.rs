use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::artifacts::ArtifactSource;
use crate::error::{StoreError, SyncError};
use crate::kv::{self, KvStore};
use crate::metrics::{SYNC_RUNS_TOTAL, SYNC_UNIT_FAILURES_TOTAL};
use crate::models::{LatestSyncPointer, SyncMode, SyncResult, SyncTrigger, SyncUnitError};
use crate::object_store::ObjectStore;
use crate::retry::{retry_with_backoff, BackoffPolicy};

pub const RESULT_KEY_PREFIX: &str = "sync:";
pub const LATEST_KEY: &str = "sync:latest";

pub struct SyncOrchestrator {
    kv: Arc<dyn KvStore>,
    store: Arc<dyn ObjectStore>,
    source: Arc<dyn ArtifactSource>,
    retry_attempts: u32,
    backoff: BackoffPolicy,
    result_ttl: Duration,
    pointer_ttl: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        kv: Arc<dyn KvStore>,
        store: Arc<dyn ObjectStore>,
        source: Arc<dyn ArtifactSource>,
        retry_attempts: u32,
        backoff: BackoffPolicy,
        result_ttl: Duration,
        pointer_ttl: Duration,
    ) -> Self {
        Self {
            kv,
            store,
            source,
            retry_attempts,
            backoff,
            result_ttl,
            pointer_ttl,
        }
    }

    // Attempts every unit, then persists the aggregate record and the latest
    // pointer. A unit failing terminally lands in the result and the run keeps
    // going; only failures of the run itself (manifest resolution, the two kv
    // writes) come back as Err. The two kv writes are independent: a pointer
    // failure after the record write leaves the record queryable by id.
    pub async fn run(&self, trigger: &SyncTrigger) -> Result<SyncResult, SyncError> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let sync_id = format!("sync-{}", timestamp.timestamp_millis());

        let files = match SyncMode::from(trigger) {
            SyncMode::Files(files) => files,
            SyncMode::Full => self.source.manifest().await.map_err(SyncError::Manifest)?,
        };

        let mut result = SyncResult {
            sync_id: sync_id.clone(),
            timestamp,
            files_processed: 0,
            files_failed: 0,
            errors: Vec::new(),
            duration_ms: 0,
        };

        for file in &files {
            match self.upload_artifact(&sync_id, file).await {
                Ok(()) => result.files_processed += 1,
                Err(err) => record_failure(&mut result, file, err),
            }
        }

        // the metadata object is a unit like any other; its body is the result so far
        match self.upload_metadata(&sync_id, timestamp, &result).await {
            Ok(()) => result.files_processed += 1,
            Err(err) => record_failure(&mut result, "metadata.json", err),
        }

        result.duration_ms = started.elapsed().as_millis() as u64;

        kv::put_json(
            self.kv.as_ref(),
            &format!("{RESULT_KEY_PREFIX}{sync_id}"),
            &result,
            self.result_ttl,
        )
        .await?;

        let pointer = LatestSyncPointer {
            sync_id: sync_id.clone(),
            timestamp,
        };
        kv::put_json(self.kv.as_ref(), LATEST_KEY, &pointer, self.pointer_ttl)
            .await?;

        SYNC_RUNS_TOTAL.inc();
        info!(
            "sync {sync_id} completed: {} processed, {} failed, {}ms",
            result.files_processed, result.files_failed, result.duration_ms
        );
        Ok(result)
    }

    async fn upload_artifact(&self, sync_id: &str, file: &str) -> Result<(), StoreError> {
        let source = self.source.clone();
        let store = self.store.clone();
        let key = format!("syncs/{sync_id}/{file}");
        let op = move || {
            let source = source.clone();
            let store = store.clone();
            let key = key.clone();
            let file = file.to_string();
            async move {
                let body = source.fetch(&file).await?;
                store
                    .put_object(&key, body, "text/markdown", &HashMap::new())
                    .await
            }
        };
        retry_with_backoff(op, self.retry_attempts, self.backoff, StoreError::is_credential).await
    }

    async fn upload_metadata(
        &self,
        sync_id: &str,
        timestamp: DateTime<Utc>,
        snapshot: &SyncResult,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_vec(snapshot)
            .map_err(|err| StoreError::new(format!("encoding sync metadata failed: {err}")))?;
        let object_metadata = HashMap::from([
            ("sync-id".to_string(), sync_id.to_string()),
            ("sync-timestamp".to_string(), timestamp.to_rfc3339()),
            ("original-source".to_string(), "ai-context".to_string()),
        ]);

        let store = self.store.clone();
        let key = format!("syncs/{sync_id}/metadata.json");
        let op = move || {
            let store = store.clone();
            let key = key.clone();
            let body = body.clone();
            let object_metadata = object_metadata.clone();
            async move {
                store
                    .put_object(&key, body, "application/json", &object_metadata)
                    .await
            }
        };
        retry_with_backoff(op, self.retry_attempts, self.backoff, StoreError::is_credential).await
    }
}

fn record_failure(result: &mut SyncResult, file: &str, err: StoreError) {
    warn!("sync unit {file} failed: {err}");
    SYNC_UNIT_FAILURES_TOTAL.inc();
    result.files_failed += 1;
    result.errors.push(SyncUnitError {
        file: file.to_string(),
        error: err.to_string(),
    });
}
