//! Flusso reactive cache hub.
//!
//! Every piece of remotely-fetched state is routed through a hub:
//!
//! - [`DataLine`] — one cell: latest value, syncing flag, subscriber lists,
//!   with replay-of-latest-value on subscribe.
//! - [`DataHub`] — keyed registry of lines exposed to the owning service.
//! - [`SubscriptionHub`] — sibling registry where subscription goes through
//!   [`Subscription`] handles and eviction runs a stored teardown.
//! - [`SyncStatusHub`] — flat per-key sync flags for polling consumers.
//!
//! Lines are created lazily, the setup hook fires once per line instance,
//! and a periodic sweep evicts lines nobody watches whose destroyable
//! predicate consents. The sweep task exists exactly while the hub has
//! lines.

mod config;
mod data_hub;
mod keys;
mod line;
mod lock;
mod registry;
mod subscription;
mod sweep;
mod sync_status;

pub use config::{DataHubConfig, HubOptions, SubscriptionHubConfig, Teardown};
pub use data_hub::DataHub;
pub use keys::HubKey;
pub use line::{
    CombinedStream, DataLine, DataStream, SubscriberId, SyncStream, WithSyncStatus,
};
pub use subscription::{Subscription, SubscriptionHub};
pub use sync_status::SyncStatusHub;
