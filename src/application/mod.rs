//! Entity sync services.
//!
//! Each service owns one hub per entity kind and composes it with the remote
//! client and local store into the cache-first flow: emit the stored value
//! while the network is consulted, replace it on success, fall back to it on
//! failure.

mod timeline;
mod user;

pub use timeline::{
    PostListSnapshot, PostPayload, PostPayloadSnapshot, TimelineService, TimelineSnapshot,
};
pub use user::{Avatar, AvatarSnapshot, UserService, UserSnapshot};

pub(crate) const METRIC_SYNC_OFFLINE: &str = "flusso_sync_offline_total";
