use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

// Exponential backoff schedule: base * multiplier^attempt.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    // 500ms, 1500ms, 4500ms across a three-attempt budget
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            multiplier: 3,
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base * self.multiplier.saturating_pow(attempt)
    }
}

// Runs `op` up to `max_attempts` times, sleeping between attempts per the
// policy. `non_retriable` short-circuits errors that retrying cannot fix
// (credential failures); those and the final attempt's error propagate to the
// caller unchanged. The sleep only blocks this operation, nothing else.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    policy: BackoffPolicy,
    non_retriable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let budget = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if non_retriable(&err) || attempt + 1 >= budget {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "retry {}/{} after {:?}: {}",
                    attempt + 1,
                    budget,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn counting_op(
        attempts: Arc<AtomicU32>,
        stamps: Arc<Mutex<Vec<Instant>>>,
        failures_before_success: u32,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>> {
        move || {
            let attempts = attempts.clone();
            let stamps = stamps.clone();
            Box::pin(async move {
                stamps.lock().unwrap().push(Instant::now());
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < failures_before_success {
                    Err(format!("transient failure {n}"))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures_with_expected_delays() {
        let attempts = Arc::new(AtomicU32::new(0));
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let op = counting_op(attempts.clone(), stamps.clone(), 2);

        let out = retry_with_backoff(op, 3, BackoffPolicy::default(), |_| false).await;

        assert_eq!(out, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps[1] - stamps[0], Duration::from_millis(500));
        assert_eq!(stamps[2] - stamps[1], Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_and_returns_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let op = counting_op(attempts.clone(), stamps.clone(), u32::MAX);

        let out = retry_with_backoff(op, 3, BackoffPolicy::default(), |_| false).await;

        assert_eq!(out, Err("transient failure 2".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retriable_error_aborts_after_one_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let op = {
            let attempts = attempts.clone();
            move || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>("denied".to_string())
                }
            }
        };

        let out = retry_with_backoff(op, 5, BackoffPolicy::default(), |e: &String| e == "denied")
            .await;

        assert_eq!(out, Err("denied".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_budget_still_runs_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let op = {
            let attempts = attempts.clone();
            move || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7u32)
                }
            }
        };

        let out = retry_with_backoff(op, 0, BackoffPolicy::default(), |_| false).await;

        assert_eq!(out, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
