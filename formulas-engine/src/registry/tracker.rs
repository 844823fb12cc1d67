//! At-most-one in-flight download per formula name.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Tracks which formulas are currently being downloaded.
///
/// Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct DownloadTracker {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Marks a download as in flight until dropped.
#[derive(Debug)]
pub struct DownloadGuard {
    name: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl DownloadTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`. Returns `None` if a download for it is already running.
    #[must_use]
    pub fn try_begin(&self, name: &str) -> Option<DownloadGuard> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        set.insert(name.to_string()).then(|| DownloadGuard {
            name: name.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Whether `name` is currently being downloaded.
    #[must_use]
    pub fn is_downloading(&self, name: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Whether any download is running.
    #[must_use]
    pub fn any_in_flight(&self) -> bool {
        !self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl DownloadGuard {
    /// The claimed name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_rejected() {
        let tracker = DownloadTracker::new();
        let Some(guard) = tracker.try_begin("Tool") else {
            panic!("first claim should succeed");
        };
        assert_eq!(guard.name(), "Tool");
        assert!(tracker.is_downloading("Tool"));
        assert!(tracker.try_begin("Tool").is_none());
        assert!(tracker.try_begin("Other").is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let tracker = DownloadTracker::new();
        {
            let _guard = tracker.try_begin("Tool");
            assert!(tracker.any_in_flight());
        }
        assert!(!tracker.is_downloading("Tool"));
        assert!(!tracker.any_in_flight());
        assert!(tracker.try_begin("Tool").is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = DownloadTracker::new();
        let clone = tracker.clone();
        let _guard = tracker.try_begin("Tool");
        assert!(clone.is_downloading("Tool"));
    }
}
