//! Handle-mediated hub variant.
//!
//! A [`SubscriptionHub`] never hands its lines out. Consumers subscribe and
//! receive a [`Subscription`] handle; the owning service pushes values in
//! through [`SubscriptionHub::update`] or from inside the setup hook, which
//! may also return a teardown closure. The hub invokes that teardown exactly
//! once when the sweep finally evicts the line — the place to release an
//! external resource such as a registered blob.

use super::config::SubscriptionHubConfig;
use super::keys::HubKey;
use super::line::{DataLine, DataStream};
use super::registry::HubCore;

/// Detaches its subscriber when dropped or explicitly unsubscribed.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Detach now instead of at drop.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Keyed registry of cache lines where subscription is the only external
/// surface, and eviction can release per-line external resources.
pub struct SubscriptionHub<K, T> {
    core: HubCore<K, T>,
}

impl<K, T> SubscriptionHub<K, T>
where
    K: HubKey + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: SubscriptionHubConfig<K, T>) -> Self {
        Self {
            core: HubCore::new(config.options, config.setup, config.destroyable),
        }
    }

    /// Subscribe to `key`'s line, creating it (and running the setup hook)
    /// on miss. A line with a value replays it synchronously before this
    /// call returns.
    pub fn subscribe(
        &self,
        key: &K,
        subscriber: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription {
        let line = self.core.get_or_create(key, true);
        let id = line.subscribe(subscriber);
        Subscription::new(line.detacher(id))
    }

    /// Value stream for `key`, through the with-setup path.
    pub fn observe(&self, key: &K) -> DataStream<T> {
        self.core.get_or_create(key, true).observe()
    }

    /// Push a value into `key`'s line if it exists; no-op otherwise.
    ///
    /// Never creates a line: an update for an entity nobody asked about yet
    /// has nowhere to go and nothing to notify.
    pub fn update(&self, key: &K, value: T) {
        if let Some(line) = self.core.get(key) {
            line.next(value);
        }
    }

    /// Run `mutate` against `key`'s line without the setup hook, creating a
    /// bare line on miss. For sync routines that need to seed or flag
    /// related lines from inside their own setup.
    pub fn with_line_no_setup<R>(&self, key: &K, mutate: impl FnOnce(&DataLine<T>) -> R) -> R {
        let line = self.core.get_or_create(key, false);
        mutate(&line)
    }

    /// Number of live lines.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Whether the sweep task is currently running.
    pub fn sweep_active(&self) -> bool {
        self.core.sweep_active()
    }
}
