//! Suppression flags that keep PO, JSON and code handlers from re-triggering each other.
//!
//! The registry holds one global master lock plus reentrant per-resource
//! counters. A resource is locked while its counter is above zero, so two
//! overlapping jobs for the same locale each add and remove their own lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// What: Key identifying one lockable resource (a locale such as `de`).
///
/// Details:
/// - Handlers lock by locale so that JSON -> PO and PO -> JSON for the same
///   locale see each other regardless of namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// What: Build a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// What: Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Mutable state guarded by the registry mutex.
#[derive(Debug, Default)]
struct LockState {
    /// Suppresses all handling while set.
    master: bool,
    /// Reentrant counters; an entry is removed once it reaches zero.
    resources: HashMap<ResourceKey, u32>,
}

/// What: Thread-safe registry of the master lock and per-resource lock counts.
///
/// Details:
/// - Every operation is total: poisoning is recovered from and removing an
///   absent lock is a logged no-op.
/// - Shared between handler tasks behind an `Arc`.
#[derive(Debug, Default)]
pub struct LockRegistry {
    state: Mutex<LockState>,
}

impl LockRegistry {
    /// What: Create an empty registry with the master lock disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the state guard, recovering from a poisoned mutex.
    fn state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// What: Enable or disable the master lock.
    ///
    /// Inputs:
    /// - `enabled`: New master lock value
    ///
    /// Details:
    /// - Does not cancel jobs that are already running.
    pub fn set_master_lock(&self, enabled: bool) {
        self.state().master = enabled;
        tracing::info!(
            "Set: Masterlock: {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// What: Flip the master lock and return the new value.
    pub fn toggle_master_lock(&self) -> bool {
        let enabled = {
            let mut state = self.state();
            state.master = !state.master;
            state.master
        };
        tracing::info!(
            "Set: Masterlock: {}",
            if enabled { "enabled" } else { "disabled" }
        );
        enabled
    }

    /// What: Report whether the master lock is set.
    #[must_use]
    pub fn is_master_locked(&self) -> bool {
        self.state().master
    }

    /// What: Increment the lock counter for `key`.
    pub fn add_lock(&self, key: &ResourceKey) {
        let count = {
            let mut state = self.state();
            let count = state.resources.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        tracing::debug!("Added 1. Locks active for {key}: {count}");
    }

    /// What: Decrement the lock counter for `key`.
    ///
    /// Details:
    /// - A key that is absent or already at zero is left untouched and only
    ///   logged; counters never go negative.
    pub fn remove_lock(&self, key: &ResourceKey) {
        let remaining = {
            let mut state = self.state();
            match state.resources.get_mut(key) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    Some(*count)
                }
                Some(_) => {
                    state.resources.remove(key);
                    Some(0)
                }
                None => None,
            }
        };
        match remaining {
            Some(count) => tracing::debug!("Removed 1. Locks active for {key}: {count}"),
            None => tracing::debug!("Resource {key} not locked; nothing to remove"),
        }
    }

    /// What: Report whether `key` has at least one active lock.
    #[must_use]
    pub fn is_locked(&self, key: &ResourceKey) -> bool {
        self.state().resources.get(key).is_some_and(|c| *c > 0)
    }

    /// What: Report whether the master lock or any resource lock is active.
    #[must_use]
    pub fn any_locked(&self) -> bool {
        let state = self.state();
        state.master || state.resources.values().any(|c| *c > 0)
    }

    /// What: Current counter for `key` (zero when absent).
    #[must_use]
    pub fn lock_count(&self, key: &ResourceKey) -> u32 {
        self.state().resources.get(key).copied().unwrap_or(0)
    }
}
