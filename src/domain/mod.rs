//! Domain types shared across the sync services.

mod keys;
mod sync;

pub use keys::PostKey;
pub use sync::{Snapshot, SyncState, merge_sync_states};
