use thiserror::Error;

// Errors from the kv backing store. The throttle gate treats any of these as a
// signal to fail open; the sync orchestrator surfaces them as run-level failures.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("kv backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("kv backend unavailable: {0}")]
    Unavailable(String),

    #[error("kv record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

// Error from a remote object write or artifact fetch. Carries the remote error
// code when the backend reported one, so callers can classify the failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StoreError {
    pub code: Option<String>,
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    // Credential errors are not retriable: the same keys will fail again.
    pub fn is_credential(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("InvalidAccessKeyId") | Some("InvalidSecretAccessKey")
        )
    }
}

// A sync run failing as a whole, as opposed to individual units failing inside
// it. Unit failures live in the SyncResult, never here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync record store error: {0}")]
    Kv(#[from] KvError),

    #[error("could not resolve sync manifest: {0}")]
    Manifest(StoreError),
}
