//! Bare per-key syncing flags.
//!
//! The degraded sibling of the hubs: a flat key → bool map with no
//! subscribers and no eviction, for consumers that poll a flag instead of
//! being pushed updates.

use std::marker::PhantomData;

use dashmap::DashMap;

use super::keys::HubKey;

/// Per-key boolean sync flags.
pub struct SyncStatusHub<K> {
    flags: DashMap<String, bool>,
    _key: PhantomData<fn(&K)>,
}

impl<K: HubKey> Default for SyncStatusHub<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: HubKey> SyncStatusHub<K> {
    pub fn new() -> Self {
        Self {
            flags: DashMap::new(),
            _key: PhantomData,
        }
    }

    /// Current flag for `key`; a key never begun is not syncing.
    pub fn is_syncing(&self, key: &K) -> bool {
        self.flags
            .get(&key.hub_key())
            .map(|flag| *flag)
            .unwrap_or(false)
    }

    /// Raise the flag for `key`.
    pub fn begin(&self, key: &K) {
        self.flags.insert(key.hub_key(), true);
    }

    /// Lower the flag for `key`.
    pub fn end(&self, key: &K) {
        self.flags.insert(key.hub_key(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_not_syncing() {
        let hub: SyncStatusHub<String> = SyncStatusHub::new();
        assert!(!hub.is_syncing(&"a".to_string()));
    }

    #[test]
    fn begin_and_end_flip_the_flag() {
        let hub: SyncStatusHub<String> = SyncStatusHub::new();
        let key = "a".to_string();

        hub.begin(&key);
        assert!(hub.is_syncing(&key));

        hub.end(&key);
        assert!(!hub.is_syncing(&key));
    }

    #[test]
    fn keys_are_independent() {
        let hub: SyncStatusHub<String> = SyncStatusHub::new();
        hub.begin(&"a".to_string());
        assert!(!hub.is_syncing(&"b".to_string()));
    }
}
