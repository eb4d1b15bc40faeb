//! Per-account single-flight gate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Tracks which accounts currently have a sync attempt running.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set holds plain keys; a panic while holding the lock cannot leave it half-updated.
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims `key`, or returns `None` when an attempt for it is already running.
    pub fn try_acquire(&self, key: &str) -> Option<FlightGuard> {
        if !self.keys().insert(key.to_string()) {
            return None;
        }
        Some(FlightGuard {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.keys().contains(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.keys().len()
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct FlightGuard {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl FlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_key_is_rejected() {
        let gate = SingleFlight::new();
        let guard = gate.try_acquire("acc-1").expect("first acquire");
        assert!(gate.try_acquire("acc-1").is_none());
        assert!(gate.is_in_flight("acc-1"));
        assert_eq!(guard.key(), "acc-1");
    }

    #[test]
    fn different_keys_do_not_block_each_other() {
        let gate = SingleFlight::new();
        let _a = gate.try_acquire("acc-1").expect("acc-1");
        let _b = gate.try_acquire("acc-2").expect("acc-2");
        assert_eq!(gate.in_flight_count(), 2);
    }

    #[test]
    fn dropping_guard_releases_key() {
        let gate = SingleFlight::new();
        {
            let _guard = gate.try_acquire("acc-1").expect("acquire");
        }
        assert!(!gate.is_in_flight("acc-1"));
        assert!(gate.try_acquire("acc-1").is_some());
    }

    #[test]
    fn clones_share_the_same_set() {
        let gate = SingleFlight::new();
        let other = gate.clone();
        let _guard = gate.try_acquire("acc-1").expect("acquire");
        assert!(other.try_acquire("acc-1").is_none());
    }
}
