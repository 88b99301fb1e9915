use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::KvError;
use crate::kv::{self, KvStore};
use crate::metrics::GATE_FAIL_OPEN_TOTAL;

// Per-identity counter bound to a fixed window anchored at the identity's first
// request, not the calendar. Mutated only by the gate.
#[derive(Debug, Serialize, Deserialize)]
pub struct RateWindowRecord {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub identity: String,
}

// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow {
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Deny {
        limit: u32,
        reset_at: DateTime<Utc>,
        retry_after_secs: u64,
    },
    // The backing store was unreachable; the request goes through unlabeled.
    FailOpen,
}

pub struct ThrottleGate {
    kv: Arc<dyn KvStore>,
    limit: u32,
    window: chrono::Duration,
    record_ttl: Duration,
}

impl ThrottleGate {
    pub fn new(kv: Arc<dyn KvStore>, limit: u32, window_secs: u64, record_ttl_secs: u64) -> Self {
        Self {
            kv,
            limit,
            window: chrono::Duration::seconds(window_secs as i64),
            record_ttl: Duration::from_secs(record_ttl_secs),
        }
    }

    // One kv read per call, one write on admission (a window reset always ends
    // in an admission). Store trouble never blocks traffic: the gate fails open.
    pub async fn admit(&self, identity: &str, now: DateTime<Utc>) -> Decision {
        match self.check(identity, now).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!("rate limit store unavailable, failing open: {err}");
                GATE_FAIL_OPEN_TOTAL.inc();
                Decision::FailOpen
            }
        }
    }

    async fn check(&self, identity: &str, now: DateTime<Utc>) -> Result<Decision, KvError> {
        let key = format!("rate-limit:{identity}");
        let mut record = kv::get_json::<RateWindowRecord>(self.kv.as_ref(), &key)
            .await?
            .unwrap_or_else(|| RateWindowRecord {
                count: 0,
                window_start: now,
                identity: identity.to_string(),
            });

        if now - record.window_start >= self.window {
            record.count = 0;
            record.window_start = now;
        }

        let reset_at = record.window_start + self.window;
        if record.count >= self.limit {
            debug!(
                "rate limit exceeded for {identity}: {} requests this window",
                record.count
            );
            let millis = (reset_at - now).num_milliseconds().max(0);
            return Ok(Decision::Deny {
                limit: self.limit,
                reset_at,
                retry_after_secs: (millis as u64).div_ceil(1000),
            });
        }

        record.count += 1;
        kv::put_json(self.kv.as_ref(), &key, &record, self.record_ttl)
            .await?;
        Ok(Decision::Allow {
            limit: self.limit,
            remaining: self.limit - record.count,
            reset_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use async_trait::async_trait;

    struct BrokenKv;

    #[async_trait]
    impl KvStore for BrokenKv {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, KvError> {
            Err(KvError::Unavailable("connection refused".to_string()))
        }

        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), KvError> {
            Err(KvError::Unavailable("connection refused".to_string()))
        }
    }

    fn gate(limit: u32) -> ThrottleGate {
        ThrottleGate::new(Arc::new(MemoryKv::new()), limit, 3600, 3900)
    }

    #[tokio::test]
    async fn admits_up_to_limit_with_monotonic_remaining() {
        let gate = gate(100);
        let now = Utc::now();

        for i in 1..=100u32 {
            match gate.admit("10.0.0.1", now).await {
                Decision::Allow {
                    limit, remaining, ..
                } => {
                    assert_eq!(limit, 100);
                    assert_eq!(remaining, 100 - i);
                }
                other => panic!("request {i} not admitted: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn rejects_past_the_limit_with_retry_timing() {
        let gate = gate(100);
        let now = Utc::now();

        for _ in 0..100 {
            gate.admit("10.0.0.1", now).await;
        }
        match gate.admit("10.0.0.1", now).await {
            Decision::Deny {
                limit,
                reset_at,
                retry_after_secs,
            } => {
                assert_eq!(limit, 100);
                assert_eq!(reset_at, now + chrono::Duration::hours(1));
                assert!(retry_after_secs > 0 && retry_after_secs <= 3600);
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let gate = gate(2);
        let start = Utc::now();

        gate.admit("10.0.0.1", start).await;
        gate.admit("10.0.0.1", start).await;
        assert!(matches!(
            gate.admit("10.0.0.1", start).await,
            Decision::Deny { .. }
        ));

        // simulated clock: one window later the identity starts over at count 1
        let later = start + chrono::Duration::hours(1);
        match gate.admit("10.0.0.1", later).await {
            Decision::Allow {
                remaining,
                reset_at,
                ..
            } => {
                assert_eq!(remaining, 1);
                assert_eq!(reset_at, later + chrono::Duration::hours(1));
            }
            other => panic!("expected admission after reset, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn identities_are_counted_independently() {
        let gate = gate(1);
        let now = Utc::now();

        assert!(matches!(
            gate.admit("10.0.0.1", now).await,
            Decision::Allow { .. }
        ));
        assert!(matches!(
            gate.admit("10.0.0.2", now).await,
            Decision::Allow { .. }
        ));
        assert!(matches!(
            gate.admit("10.0.0.1", now).await,
            Decision::Deny { .. }
        ));
    }

    #[tokio::test]
    async fn fails_open_when_the_store_is_down() {
        let gate = ThrottleGate::new(Arc::new(BrokenKv), 1, 3600, 3900);
        let now = Utc::now();

        for _ in 0..5 {
            assert_eq!(gate.admit("10.0.0.1", now).await, Decision::FailOpen);
        }
    }
}
