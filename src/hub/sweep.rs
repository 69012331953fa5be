//! Interval-driven eviction.
//!
//! One task per hub, alive exactly while the hub has lines. Each tick runs a
//! single eviction pass; when the pass empties the map it clears the sweeper
//! handle (the not-running sentinel) and the task exits, so the next line
//! creation starts a fresh one. Driven by the Tokio timer, which lets tests
//! advance a paused clock instead of sleeping.

use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

use super::registry::CoreShared;

pub(crate) fn spawn<K, T>(shared: &Arc<CoreShared<K, T>>) -> JoinHandle<()>
where
    K: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    let weak: Weak<CoreShared<K, T>> = Arc::downgrade(shared);
    let interval = shared.options.sweep_interval;
    let label = shared.options.label;

    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            trace!(hub = label, "sweep tick");
            if shared.sweep_once() {
                break;
            }
        }
    })
}
