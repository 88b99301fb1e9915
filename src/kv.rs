use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::KvError;

// The kv namespace capability: atomic get/put per key, with expiry. All durable
// state in both workers goes through this, so the core logic runs the same
// against sled or an in-memory map.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvError>;
}

pub async fn get_json<T: DeserializeOwned>(
    kv: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, KvError> {
    match kv.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn put_json<T: Serialize>(
    kv: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), KvError> {
    kv.put(key, serde_json::to_vec(value)?, ttl).await
}

// Stored value plus its expiry deadline. Sled has no native ttl, so expiry is
// checked on read and stale records are dropped then.
#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at: DateTime<Utc>,
    value: Vec<u8>,
}

pub struct SledKv {
    db: sled::Db,
}

impl SledKv {
    pub fn open(path: &str) -> Result<Self, KvError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }
}

#[async_trait]
impl KvStore for SledKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let Some(raw) = self.db.get(key)? else {
            return Ok(None);
        };
        let envelope: Envelope = serde_json::from_slice(&raw)?;
        if envelope.expires_at <= Utc::now() {
            self.db.remove(key)?;
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvError> {
        let envelope = Envelope {
            expires_at: Utc::now() + ttl,
            value,
        };
        self.db.insert(key, serde_json::to_vec(&envelope)?)?;
        Ok(())
    }
}

// In-memory kv with the same expiry semantics, for tests and local runs.
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, (DateTime<Utc>, Vec<u8>)>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => {
                let (expires_at, value) = entry.value();
                if *expires_at > Utc::now() {
                    return Ok(Some(value.clone()));
                }
            }
        }
        // expired: the read guard is released before mutating
        self.entries.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), KvError> {
        self.entries
            .insert(key.to_string(), (Utc::now() + ttl, value));
        Ok(())
    }
}
