//! Bounded polling of provider state

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::family::Lifecycle;
use crate::resource::Target;

/// Default delay before each status check
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of checks before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 360;

/// Fixed-interval poller with an attempt ceiling
///
/// Each attempt sleeps first and checks second. Check errors count as "not
/// ready yet" and never abort the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Poller {
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Same interval with a different attempt ceiling
    #[must_use]
    pub const fn with_attempts(self, max_attempts: u32) -> Self {
        Self {
            interval: self.interval,
            max_attempts,
        }
    }

    /// Longest time a wait can take
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    /// Check until `accept` holds, returning the accepted value
    pub async fn poll<T, E, F, Fut, P>(&self, mut check: F, accept: P) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&T) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;
            match check().await {
                Ok(value) if accept(&value) => {
                    debug!(attempt, "poll condition reached");
                    return Some(value);
                }
                Ok(_) => {}
                Err(e) => debug!(attempt, error = %e, "status check failed, treating as not ready"),
            }
        }
        None
    }

    /// Check until `accept` holds
    pub async fn until<T, E, F, Fut, P>(&self, check: F, accept: P) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&T) -> bool,
    {
        self.poll(check, accept).await.is_some()
    }
}

/// Wait until `target` reports a serving status
///
/// Returns `false` when the ceiling is reached.
pub async fn wait_serving(lifecycle: &dyn Lifecycle, poller: &Poller, target: &Target) -> bool {
    info!(id = %target.id, name = %target.name, "waiting for serving status");
    let serving = poller
        .until(
            || lifecycle.status(&target.id),
            |status: &Option<String>| status.as_deref().is_some_and(|s| lifecycle.is_serving(s)),
        )
        .await;
    if !serving {
        warn!(
            id = %target.id,
            name = %target.name,
            ceiling = ?poller.ceiling(),
            "resource not serving before wait ceiling"
        );
    }
    serving
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> Poller {
        Poller::new(Duration::from_millis(1), max_attempts)
    }

    #[tokio::test]
    async fn test_poll_returns_accepted_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let found = fast(10)
            .poll(
                || {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok::<_, String>(n) }
                },
                |n| *n == 3,
            )
            .await;

        assert_eq!(found, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_errors_count_as_not_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let ready = fast(5)
            .until(
                || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("throttled".to_string())
                        } else {
                            Ok(true)
                        }
                    }
                },
                |ok| *ok,
            )
            .await;

        assert!(ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_at_ceiling() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let ready = fast(4)
            .until(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(false) }
                },
                |ok| *ok,
            )
            .await;

        assert!(!ready);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_only_errors_exhaust_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let ready = fast(2)
            .until(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err::<bool, _>("throttled") }
                },
                |ok| *ok,
            )
            .await;

        assert!(!ready);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ceiling() {
        let poller = Poller::new(Duration::from_secs(10), 360);
        assert_eq!(poller.ceiling(), Duration::from_secs(3600));
        assert_eq!(Poller::default(), poller);
        assert_eq!(poller.with_attempts(6).ceiling(), Duration::from_secs(60));
    }
}
