//! Per-identity request-rate governance.
//!
//! Fixed-window counting: each identity gets up to `max_requests` operations
//! per window, and the counter resets when the window elapses. The counter
//! lives behind [`CounterStore`] so a multi-instance deployment can swap in
//! a shared backend; the bundled store is an in-memory map, which is correct
//! for exactly one running instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Where the per-identity window counters live.
pub trait CounterStore: Send + Sync {
    /// Records one hit for `identity` and returns the running count within
    /// the window containing `now`. The first hit of a fresh window returns 1.
    fn hit(&self, identity: &str, now: Instant, window: Duration) -> u32;

    /// Drops counters whose window has elapsed. Called periodically so the
    /// store does not grow with every identity ever seen.
    fn prune(&self, now: Instant, window: Duration);
}

struct Window {
    started: Instant,
    count: u32,
}

/// Single-instance counter store: a mutex-guarded map keyed by identity.
#[derive(Default)]
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, identity: &str, now: Instant, window: Duration) -> u32 {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match windows.get_mut(identity) {
            Some(current) if now.duration_since(current.started) < window => {
                current.count = current.count.saturating_add(1);
                current.count
            }
            _ => {
                windows.insert(
                    identity.to_string(),
                    Window {
                        started: now,
                        count: 1,
                    },
                );
                1
            }
        }
    }

    fn prune(&self, now: Instant, window: Duration) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, current| now.duration_since(current.started) < window);
    }
}

/// Fixed-window limiter checked before any network or storage work.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self::with_store(Arc::new(InMemoryCounterStore::default()), window, max_requests)
    }

    pub fn with_store(store: Arc<dyn CounterStore>, window: Duration, max_requests: u32) -> Self {
        Self {
            store,
            window,
            max_requests,
        }
    }

    /// Charges one operation to `identity` and reports whether it is allowed.
    pub fn allow(&self, identity: &str) -> bool {
        let count = self.store.hit(identity, Instant::now(), self.window);
        let allowed = count <= self.max_requests;
        if !allowed {
            tracing::warn!(identity, count, "rate limit exceeded");
        }
        allowed
    }

    /// Spawns a background task that periodically drops expired windows.
    pub fn start_pruning(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(300));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.store.prune(Instant::now(), self.window);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_limit_enforced_within_window() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 30);

        for _ in 0..30 {
            assert!(limiter.allow("user-1"));
        }
        // The 31st call inside the window is rejected
        assert!(!limiter.allow("user-1"));
        assert!(!limiter.allow("user-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_reset_allows_again() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 30);

        for _ in 0..30 {
            assert!(limiter.allow("user-1"));
        }
        assert!(!limiter.allow("user-1"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.allow("user-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identities_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);

        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        assert!(limiter.allow("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_drops_expired_windows_only() {
        let store = Arc::new(InMemoryCounterStore::default());
        let window = Duration::from_secs(60);

        store.hit("old", Instant::now(), window);
        tokio::time::advance(Duration::from_secs(30)).await;
        store.hit("young", Instant::now(), window);
        tokio::time::advance(Duration::from_secs(31)).await;

        store.prune(Instant::now(), window);

        let windows = store.windows.lock().unwrap();
        assert!(!windows.contains_key("old"));
        assert!(windows.contains_key("young"));
    }
}
