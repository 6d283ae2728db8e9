//! Per-key expiry deadlines.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks absolute expiry deadlines for store keys.
///
/// Keys without a deadline never expire.
#[derive(Debug, Default)]
pub struct TtlTracker {
    deadlines: HashMap<String, Instant>,
}

impl TtlTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key to expire `ttl` from now, replacing any earlier deadline.
    ///
    /// A `ttl` too large to represent as an `Instant` leaves the key
    /// without a deadline.
    pub fn expire(&mut self, key: &str, ttl: Duration) {
        match Instant::now().checked_add(ttl) {
            Some(deadline) => {
                self.deadlines.insert(key.to_string(), deadline);
            }
            None => self.persist(key),
        }
    }

    /// Drop the deadline so the key no longer expires.
    pub fn persist(&mut self, key: &str) {
        self.deadlines.remove(key);
    }

    /// Check if a key's deadline has passed.
    pub fn is_expired(&self, key: &str) -> bool {
        self.deadlines
            .get(key)
            .is_some_and(|deadline| *deadline <= Instant::now())
    }

    /// Time left before the key expires, if it has a deadline.
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        self.deadlines
            .get(key)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Remove tracking for a key.
    pub fn remove(&mut self, key: &str) {
        self.deadlines.remove(key);
    }

    /// Get all expired keys.
    pub fn get_expired(&self) -> Vec<String> {
        let now = Instant::now();
        self.deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remove all expired entries and return their keys.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let expired = self.get_expired();
        for key in &expired {
            self.deadlines.remove(key);
        }
        expired
    }

    /// Get the number of keys carrying a deadline.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Check if no key carries a deadline.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_untracked_never_expires() {
        let tracker = TtlTracker::new();

        assert!(!tracker.is_expired("1"));
        assert_eq!(tracker.remaining("1"), None);
        assert!(tracker.get_expired().is_empty());
    }

    #[test]
    fn test_expire_resets_deadline() {
        let mut tracker = TtlTracker::new();
        tracker.expire("1", Duration::from_millis(50));

        thread::sleep(Duration::from_millis(30));

        // Refresh before the first deadline passes
        tracker.expire("1", Duration::from_millis(50));

        // Now past the first deadline
        thread::sleep(Duration::from_millis(30));

        assert!(!tracker.is_expired("1"));
    }

    #[test]
    fn test_expiration() {
        let mut tracker = TtlTracker::new();
        tracker.expire("1", Duration::from_millis(10));

        thread::sleep(Duration::from_millis(20));

        assert!(tracker.is_expired("1"));
        assert_eq!(tracker.get_expired(), vec!["1".to_string()]);
        assert_eq!(tracker.remaining("1"), Some(Duration::ZERO));
    }

    #[test]
    fn test_drain_expired_keeps_live_keys() {
        let mut tracker = TtlTracker::new();
        tracker.expire("1", Duration::from_millis(10));
        tracker.expire("2", Duration::from_millis(10));
        tracker.expire("3", Duration::from_secs(60));

        thread::sleep(Duration::from_millis(20));

        let mut expired = tracker.drain_expired();
        expired.sort();
        assert_eq!(expired, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let mut tracker = TtlTracker::new();
        tracker.expire("1", Duration::from_millis(10));

        tracker.expire("1", Duration::from_secs(u64::MAX));

        thread::sleep(Duration::from_millis(20));
        assert!(!tracker.is_expired("1"));
        assert_eq!(tracker.remaining("1"), None);
    }

    #[test]
    fn test_persist() {
        let mut tracker = TtlTracker::new();
        tracker.expire("1", Duration::from_millis(10));
        tracker.persist("1");

        thread::sleep(Duration::from_millis(20));

        assert!(!tracker.is_expired("1"));
        assert!(tracker.is_empty());
    }
}
