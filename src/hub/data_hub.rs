//! Line-exposing hub variant.
//!
//! A [`DataHub`] hands the created [`DataLine`] back to its owning service,
//! which drives it directly with `next`/`begin_sync`/`end_sync`. Consumers
//! outside the owning service should reach state through the stream
//! accessors instead.

use super::config::DataHubConfig;
use super::keys::HubKey;
use super::line::{CombinedStream, DataLine, DataStream, SubscriberId, SyncStream};
use super::registry::HubCore;

/// Keyed registry of [`DataLine`]s with lazy creation, a setup hook fired
/// once per line instance, and sweep-based eviction of unwatched lines.
///
/// Lines are created from inside a Tokio runtime: the first creation starts
/// the hub's sweep task.
pub struct DataHub<K, T> {
    core: HubCore<K, T>,
}

impl<K, T> DataHub<K, T>
where
    K: HubKey + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: DataHubConfig<K, T>) -> Self {
        Self {
            core: HubCore::new(config.options, config.setup, config.destroyable),
        }
    }

    /// The line for `key`, creating it (and running the setup hook) on miss.
    ///
    /// This is the first entry point into an entity's data: the setup hook
    /// is where the owning service kicks off the initial fetch.
    pub fn get_line_or_create_with_setup(&self, key: &K) -> DataLine<T> {
        self.core.get_or_create(key, true)
    }

    /// The line for `key`, creating it on miss **without** the setup hook.
    ///
    /// Lets a sync routine, while executing inside its own setup callback,
    /// read or write lines for related keys without triggering recursive
    /// fetches. A later with-setup access of the same live line does not
    /// fire the hook either; setup runs at most once per line instance.
    pub fn get_line_or_create_without_setup(&self, key: &K) -> DataLine<T> {
        self.core.get_or_create(key, false)
    }

    /// The existing line for `key`, or `None`. Never creates.
    pub fn get_line(&self, key: &K) -> Option<DataLine<T>> {
        self.core.get(key)
    }

    /// Value stream for `key`, through the with-setup path.
    pub fn observe(&self, key: &K) -> DataStream<T> {
        self.get_line_or_create_with_setup(key).observe()
    }

    /// Syncing-flag stream for `key`, through the with-setup path.
    pub fn observe_sync(&self, key: &K) -> SyncStream<T> {
        self.get_line_or_create_with_setup(key).observe_sync()
    }

    /// Combined value-plus-flag stream for `key`, through the with-setup
    /// path.
    pub fn observe_with_sync(&self, key: &K) -> CombinedStream<T> {
        self.get_line_or_create_with_setup(key).observe_with_sync()
    }

    /// Subscribe a callback to `key`'s line, through the with-setup path.
    pub fn subscribe(
        &self,
        key: &K,
        subscriber: impl Fn(&T) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.get_line_or_create_with_setup(key).subscribe(subscriber)
    }

    /// Detach a callback from `key`'s line, if the line still exists.
    pub fn unsubscribe(&self, key: &K, id: SubscriberId) {
        if let Some(line) = self.get_line(key) {
            line.unsubscribe(id);
        }
    }

    /// Number of live lines.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Whether the sweep task is currently running. True exactly while the
    /// hub holds at least one line.
    pub fn sweep_active(&self) -> bool {
        self.core.sweep_active()
    }
}
