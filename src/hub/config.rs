//! Hub configuration.
//!
//! Data-only knobs live in [`HubOptions`]; the per-hub hooks (setup and the
//! destroyable predicate) are attached through the variant-specific config
//! types so each hub variant keeps its own setup signature.

use std::sync::Arc;
use std::time::Duration;

use super::line::DataLine;

pub(crate) const DEFAULT_SWEEP_INTERVAL_MS: u64 = 20_000;
const DEFAULT_LABEL: &str = "hub";

/// Closure invoked when an evicted line must release an external resource.
pub type Teardown = Box<dyn FnOnce() + Send>;

pub(crate) type SetupHook<K, T> =
    Arc<dyn Fn(&K, &DataLine<T>) -> Option<Teardown> + Send + Sync>;
pub(crate) type DestroyableHook<K, T> = Arc<dyn Fn(&K, Option<&T>) -> bool + Send + Sync>;

/// Data-only knobs shared by both hub variants.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// How often the sweep pass runs while any line exists.
    pub sweep_interval: Duration,
    /// Short name used in log fields and metric labels.
    pub label: &'static str,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            label: DEFAULT_LABEL,
        }
    }
}

impl HubOptions {
    /// Options with the default sweep interval and the given label.
    pub fn labeled(label: &'static str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }
}

/// Configuration for [`super::DataHub`].
///
/// The setup hook is where the owning service starts its initial fetch; its
/// return value is ignored by this variant.
pub struct DataHubConfig<K, T> {
    pub options: HubOptions,
    pub(crate) setup: Option<SetupHook<K, T>>,
    pub(crate) destroyable: Option<DestroyableHook<K, T>>,
}

impl<K, T> Default for DataHubConfig<K, T> {
    fn default() -> Self {
        Self::new(HubOptions::default())
    }
}

impl<K, T> DataHubConfig<K, T> {
    pub fn new(options: HubOptions) -> Self {
        Self {
            options,
            setup: None,
            destroyable: None,
        }
    }

    /// Hook invoked exactly once when a line is first created for a key.
    pub fn with_setup(
        mut self,
        setup: impl Fn(&K, &DataLine<T>) + Send + Sync + 'static,
    ) -> Self {
        self.setup = Some(Arc::new(move |key, line| {
            setup(key, line);
            None
        }));
        self
    }

    /// Predicate deciding whether an unwatched line's value may be discarded.
    pub fn with_destroyable(
        mut self,
        destroyable: impl Fn(&K, Option<&T>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.destroyable = Some(Arc::new(destroyable));
        self
    }
}

/// Configuration for [`super::SubscriptionHub`].
///
/// Unlike the [`DataHubConfig`] setup hook, this one may return a teardown
/// closure; the hub stores it and invokes it exactly once when the line is
/// evicted by the sweep.
pub struct SubscriptionHubConfig<K, T> {
    pub options: HubOptions,
    pub(crate) setup: Option<SetupHook<K, T>>,
    pub(crate) destroyable: Option<DestroyableHook<K, T>>,
}

impl<K, T> Default for SubscriptionHubConfig<K, T> {
    fn default() -> Self {
        Self::new(HubOptions::default())
    }
}

impl<K, T> SubscriptionHubConfig<K, T> {
    pub fn new(options: HubOptions) -> Self {
        Self {
            options,
            setup: None,
            destroyable: None,
        }
    }

    /// Hook invoked exactly once when a line is first created for a key.
    pub fn with_setup(
        mut self,
        setup: impl Fn(&K, &DataLine<T>) -> Option<Teardown> + Send + Sync + 'static,
    ) -> Self {
        self.setup = Some(Arc::new(setup));
        self
    }

    /// Predicate deciding whether an unwatched line's value may be discarded.
    pub fn with_destroyable(
        mut self,
        destroyable: impl Fn(&K, Option<&T>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.destroyable = Some(Arc::new(destroyable));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sweep_interval_is_twenty_seconds() {
        let options = HubOptions::default();
        assert_eq!(options.sweep_interval, Duration::from_millis(20_000));
        assert_eq!(options.label, "hub");
    }

    #[test]
    fn labeled_keeps_default_interval() {
        let options = HubOptions::labeled("timeline");
        assert_eq!(options.label, "timeline");
        assert_eq!(options.sweep_interval, Duration::from_millis(20_000));
    }

    #[test]
    fn data_hub_setup_return_value_is_discarded() {
        let config: DataHubConfig<String, u32> =
            DataHubConfig::default().with_setup(|_key, _line| ());
        let setup = config.setup.expect("setup hook installed");

        let line = DataLine::new();
        assert!(setup(&"k".to_string(), &line).is_none());
    }
}
