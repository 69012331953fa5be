//! Sync provenance for remotely-fetched state.
//!
//! Every entity snapshot the UI sees carries a [`SyncState`] saying where
//! the data came from and whether a fresher copy is on the way.

/// Provenance of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing yet: neither cache nor network has answered.
    Loading,
    /// A cached value is showing while the network is consulted.
    Syncing,
    /// The value reflects the most recent successful fetch.
    Synced,
    /// The network failed; the value (if any) is the last known good copy.
    Offline,
    /// The server says the entity does not exist. Terminal.
    NotFound,
    /// The server refused access. Terminal.
    Forbidden,
}

impl SyncState {
    /// Terminal states are authoritative answers; they are never retried
    /// automatically.
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncState::NotFound | SyncState::Forbidden)
    }
}

/// Merge the states of several entities shown together into the one state
/// that describes the whole view. The most alarming state wins.
pub fn merge_sync_states(states: &[SyncState]) -> SyncState {
    for candidate in [
        SyncState::Forbidden,
        SyncState::NotFound,
        SyncState::Offline,
        SyncState::Loading,
        SyncState::Syncing,
    ] {
        if states.contains(&candidate) {
            return candidate;
        }
    }
    SyncState::Synced
}

/// A value (possibly absent) tagged with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub state: SyncState,
}

impl<T> Snapshot<T> {
    pub fn loading() -> Self {
        Self {
            data: None,
            state: SyncState::Loading,
        }
    }

    /// A cached value shown while revalidation is in flight.
    pub fn syncing_with(data: T) -> Self {
        Self {
            data: Some(data),
            state: SyncState::Syncing,
        }
    }

    pub fn synced(data: T) -> Self {
        Self {
            data: Some(data),
            state: SyncState::Synced,
        }
    }

    /// The network failed; carry the stale value if one exists.
    pub fn offline(data: Option<T>) -> Self {
        Self {
            data,
            state: SyncState::Offline,
        }
    }

    pub fn not_found() -> Self {
        Self {
            data: None,
            state: SyncState::NotFound,
        }
    }

    pub fn forbidden() -> Self {
        Self {
            data: None,
            state: SyncState::Forbidden,
        }
    }
}
