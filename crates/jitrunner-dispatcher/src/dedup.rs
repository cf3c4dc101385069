//! In-flight markers for deduplicating redelivered jobs.
//!
//! Markers live in process memory, so they only catch duplicates handled by
//! the same worker process. Two workers receiving the same job concurrently
//! can still both dispatch it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Short-lived markers keyed by job identity.
pub struct InFlightGuard {
    ttl: Duration,
    markers: Mutex<HashMap<String, Instant>>,
}

impl InFlightGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            markers: Mutex::new(HashMap::new()),
        }
    }

    /// Take the marker for `key`. Returns `false` if a live marker exists.
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        markers.retain(|_, expires| *expires > now);

        if markers.contains_key(key) {
            return false;
        }
        markers.insert(key.to_string(), now + self.ttl);
        true
    }

    /// Drop the marker for `key` so a redelivery can retry.
    pub fn release(&self, key: &str) {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        markers.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let guard = InFlightGuard::new(Duration::from_secs(60));
        assert!(guard.try_acquire("acme/widget#1"));
        assert!(!guard.try_acquire("acme/widget#1"));
        assert!(guard.try_acquire("acme/widget#2"));
    }

    #[test]
    fn test_release_allows_retry() {
        let guard = InFlightGuard::new(Duration::from_secs(60));
        assert!(guard.try_acquire("acme/widget#1"));
        guard.release("acme/widget#1");
        assert!(guard.try_acquire("acme/widget#1"));
    }

    #[tokio::test]
    async fn test_marker_expires() {
        let guard = InFlightGuard::new(Duration::from_millis(20));
        assert!(guard.try_acquire("acme/widget#1"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(guard.try_acquire("acme/widget#1"));
    }
}
