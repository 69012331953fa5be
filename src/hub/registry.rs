//! Keyed line registry shared by both hub variants.
//!
//! Owns the canonical-key → line map, creates lines lazily (running the
//! setup hook exactly once per line instance), stores any teardown the hook
//! returned, and tracks the sweep task handle. Map mutation and sweeper
//! bookkeeping live under one lock so the stop-when-empty / restart-on-create
//! transitions cannot race.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tracing::debug;

use super::config::{DestroyableHook, HubOptions, SetupHook, Teardown};
use super::keys::HubKey;
use super::line::{DataLine, ValuePredicate};
use super::lock::lock;
use super::sweep;

const SOURCE: &str = "hub::registry";

pub(crate) const METRIC_LINE_CREATED: &str = "flusso_hub_line_created_total";
pub(crate) const METRIC_LINE_EVICTED: &str = "flusso_hub_line_evicted_total";
pub(crate) const METRIC_SWEEP_MS: &str = "flusso_hub_sweep_ms";

struct LineSlot<T> {
    line: DataLine<T>,
    teardown: Option<Teardown>,
}

struct RegistryState<T> {
    lines: HashMap<String, LineSlot<T>>,
    sweeper: Option<JoinHandle<()>>,
}

pub(crate) struct CoreShared<K, T> {
    state: Mutex<RegistryState<T>>,
    setup: Option<SetupHook<K, T>>,
    destroyable: Option<DestroyableHook<K, T>>,
    pub(crate) options: HubOptions,
}

pub(crate) struct HubCore<K, T> {
    shared: Arc<CoreShared<K, T>>,
}

impl<K, T> HubCore<K, T>
where
    K: HubKey + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        options: HubOptions,
        setup: Option<SetupHook<K, T>>,
        destroyable: Option<DestroyableHook<K, T>>,
    ) -> Self {
        Self {
            shared: Arc::new(CoreShared {
                state: Mutex::new(RegistryState {
                    lines: HashMap::new(),
                    sweeper: None,
                }),
                setup,
                destroyable,
                options,
            }),
        }
    }

    /// The existing line for `key`, or `None`. Never creates.
    pub(crate) fn get(&self, key: &K) -> Option<DataLine<T>> {
        let canonical = key.hub_key();
        let state = lock(&self.shared.state, SOURCE, "get");
        state.lines.get(&canonical).map(|slot| slot.line.clone())
    }

    /// The existing line for `key`, or a freshly created one.
    ///
    /// Creation inserts the line and (when the map was empty) starts the
    /// sweep task before the setup hook runs, so a hook that re-enters the
    /// hub for this or any other key observes a consistent map. The setup
    /// hook runs at most once per line instance, and only when `run_setup`
    /// is true on the call that actually creates the line.
    pub(crate) fn get_or_create(&self, key: &K, run_setup: bool) -> DataLine<T> {
        let canonical = key.hub_key();

        let (line, created) = {
            let mut state = lock(&self.shared.state, SOURCE, "get_or_create");
            if let Some(slot) = state.lines.get(&canonical) {
                (slot.line.clone(), false)
            } else {
                let predicate = self.shared.destroyable.clone().map(|destroyable| {
                    let key = key.clone();
                    Box::new(move |value: Option<&T>| destroyable(&key, value))
                        as ValuePredicate<T>
                });
                let line = DataLine::with_predicate(predicate);
                state.lines.insert(
                    canonical.clone(),
                    LineSlot {
                        line: line.clone(),
                        teardown: None,
                    },
                );
                if state.sweeper.is_none() {
                    state.sweeper = Some(sweep::spawn(&self.shared));
                }
                (line, true)
            }
        };

        if created {
            counter!(METRIC_LINE_CREATED, "hub" => self.shared.options.label).increment(1);
            debug!(
                hub = self.shared.options.label,
                key = %canonical,
                run_setup,
                "created cache line"
            );
            if run_setup
                && let Some(setup) = &self.shared.setup
                && let Some(teardown) = setup(key, &line)
            {
                self.store_teardown(&canonical, &line, teardown);
            }
        }

        line
    }

    /// Attach the teardown produced by a setup hook to its line slot.
    ///
    /// If the line was already evicted while the hook ran, the teardown is
    /// invoked immediately so the resource it guards is still released
    /// exactly once.
    fn store_teardown(&self, canonical: &str, line: &DataLine<T>, teardown: Teardown) {
        let orphaned = {
            let mut state = lock(&self.shared.state, SOURCE, "store_teardown");
            match state.lines.get_mut(canonical) {
                Some(slot) if slot.line.same_cell(line) => {
                    slot.teardown = Some(teardown);
                    None
                }
                _ => Some(teardown),
            }
        };
        if let Some(teardown) = orphaned {
            teardown();
        }
    }

    /// Number of live lines.
    pub(crate) fn len(&self) -> usize {
        lock(&self.shared.state, SOURCE, "len").lines.len()
    }

    /// Whether the sweep task currently exists.
    pub(crate) fn sweep_active(&self) -> bool {
        lock(&self.shared.state, SOURCE, "sweep_active")
            .sweeper
            .is_some()
    }
}

impl<K, T> CoreShared<K, T>
where
    K: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// One eviction pass. Removes every destroyable line, invoking its
    /// stored teardown exactly once, and returns true when the map emptied
    /// and the sweeper handle was cleared (the caller then stops ticking).
    pub(crate) fn sweep_once(&self) -> bool {
        let sweep_started = std::time::Instant::now();
        let mut teardowns = Vec::new();
        let mut evicted = 0_u64;

        let stopped = {
            let mut state = lock(&self.state, SOURCE, "sweep_once");
            let doomed: Vec<String> = state
                .lines
                .iter()
                .filter(|(_, slot)| slot.line.destroyable())
                .map(|(key, _)| key.clone())
                .collect();

            for key in doomed {
                if let Some(mut slot) = state.lines.remove(&key) {
                    if let Some(teardown) = slot.teardown.take() {
                        teardowns.push(teardown);
                    }
                    evicted += 1;
                    debug!(hub = self.options.label, key = %key, "evicted cache line");
                }
            }

            if state.lines.is_empty() {
                state.sweeper = None;
                true
            } else {
                false
            }
        };

        for teardown in teardowns {
            teardown();
        }

        if evicted > 0 {
            counter!(METRIC_LINE_EVICTED, "hub" => self.options.label).increment(evicted);
        }
        histogram!(METRIC_SWEEP_MS, "hub" => self.options.label)
            .record(sweep_started.elapsed().as_secs_f64() * 1000.0);

        stopped
    }
}

impl<K, T> Clone for HubCore<K, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, T> Drop for CoreShared<K, T> {
    fn drop(&mut self) {
        // The sweep task only holds a weak reference, so it exits on its
        // next tick; outstanding teardowns still have to run here.
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(sweeper) = state.sweeper.take() {
            sweeper.abort();
        }
        for (_, slot) in state.lines.drain() {
            if let Some(teardown) = slot.teardown {
                teardown();
            }
        }
    }
}
