// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracking registry
//!
//! The set of torrent hashes that currently have a running monitor. A hash
//! is claimed by the trigger handler and released when the monitor that
//! owns the claim ends, whichever way it ends.
//!
//! Claims are RAII: [`TrackingRegistry::try_claim`] hands out a
//! [`TrackingGuard`] and dropping it removes the hash. The guard moves into
//! the monitor task, so removal happens exactly once even if the task
//! returns early or panics.
//!
//! ## Locking
//!
//! A single `std::sync::Mutex` guards the set. It is held only for the
//! check-and-insert and for the remove, never across an `.await`. Poisoning
//! is recovered rather than propagated: a panic in some other holder must
//! not stop new torrents from being tracked.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared set of hashes under active monitoring.
///
/// Cheap to clone; clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct TrackingRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `hash` for a new monitor.
    ///
    /// Returns `None` if another monitor already holds it.
    pub fn try_claim(&self, hash: &str) -> Option<TrackingGuard> {
        let inserted = resilient_lock(&self.active).insert(hash.to_string());

        inserted.then(|| TrackingGuard {
            registry: self.clone(),
            hash: hash.to_string(),
        })
    }

    /// Whether a monitor currently holds `hash`.
    pub fn contains(&self, hash: &str) -> bool {
        resilient_lock(&self.active).contains(hash)
    }

    /// Number of running monitors.
    pub fn len(&self) -> usize {
        resilient_lock(&self.active).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, hash: &str) {
        if !resilient_lock(&self.active).remove(hash) {
            tracing::warn!(hash, "Released a hash that was not registered");
        }
    }
}

/// Proof that the holder is the only monitor for one hash.
///
/// Dropping the guard releases the hash.
#[derive(Debug)]
pub struct TrackingGuard {
    registry: TrackingRegistry,
    hash: String,
}

impl TrackingGuard {
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        self.registry.release(&self.hash);
        tracing::debug!(hash = %self.hash, "Released tracking claim");
    }
}

/// Lock the mutex, recovering the data if a previous holder panicked.
fn resilient_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "registry",
                event = "LOCK_POISONED",
                "Tracking registry lock was poisoned. Recovering data."
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let registry = TrackingRegistry::new();

        let first = registry.try_claim("abc");
        assert!(first.is_some());
        assert!(registry.try_claim("abc").is_none());
        assert!(registry.contains("abc"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_drop_releases_claim() {
        let registry = TrackingRegistry::new();

        let guard = registry.try_claim("abc").unwrap();
        assert_eq!(guard.hash(), "abc");
        drop(guard);

        assert!(!registry.contains("abc"));
        assert!(registry.is_empty());
        assert!(registry.try_claim("abc").is_some());
    }

    #[test]
    fn test_independent_hashes() {
        let registry = TrackingRegistry::new();

        let _a = registry.try_claim("bbb").unwrap();
        let _b = registry.try_claim("aaa").unwrap();
        assert!(registry.contains("aaa"));
        assert!(registry.contains("bbb"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = TrackingRegistry::new();
        let clone = registry.clone();

        let _guard = registry.try_claim("abc").unwrap();
        assert!(clone.contains("abc"));
        assert!(clone.try_claim("abc").is_none());
    }

    #[test]
    fn test_concurrent_claims_yield_one_winner() {
        let registry = TrackingRegistry::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    // Leak winning guards so the claim outlives the thread.
                    registry.try_claim("race").map(std::mem::forget).is_some()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(registry.contains("race"));
    }

    #[test]
    fn test_release_survives_poisoned_lock() {
        let registry = TrackingRegistry::new();
        let guard = registry.try_claim("abc").unwrap();

        let poisoner = registry.clone();
        let _ = std::thread::spawn(move || {
            let _held = poisoner.active.lock().unwrap();
            panic!("poison the registry");
        })
        .join();

        drop(guard);
        assert!(!registry.contains("abc"));
    }
}
