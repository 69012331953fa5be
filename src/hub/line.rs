//! Single-cell broadcast primitive.
//!
//! A [`DataLine`] holds the latest value for one cache key, an independent
//! "currently syncing" flag, and the callbacks watching either. Subscribing
//! to a populated line replays the current value synchronously; `next`
//! notifies every registered subscriber in registration order.
//!
//! Notification passes snapshot the subscriber list before invoking any
//! callback and run outside the line's lock. A subscribe or unsubscribe
//! performed from inside a callback therefore takes effect for later passes,
//! never the in-flight one, and callbacks may freely call back into the line.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::lock::lock;

const SOURCE: &str = "hub::line";

type ValueSubscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;
type SyncSubscriber = Arc<dyn Fn(bool) + Send + Sync>;
type CombinedSubscriber<T> = Arc<dyn Fn(&T, bool) + Send + Sync>;
pub(crate) type ValuePredicate<T> = Box<dyn Fn(Option<&T>) -> bool + Send + Sync>;

/// Token identifying one registered subscriber on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// A value paired with the syncing flag at the moment of emission.
#[derive(Debug, Clone, PartialEq)]
pub struct WithSyncStatus<T> {
    pub data: T,
    pub syncing: bool,
}

struct LineState<T> {
    value: Option<T>,
    syncing: bool,
    value_subscribers: Vec<(SubscriberId, ValueSubscriber<T>)>,
    sync_subscribers: Vec<(SubscriberId, SyncSubscriber)>,
    combined_subscribers: Vec<(SubscriberId, CombinedSubscriber<T>)>,
}

pub(crate) struct LineShared<T> {
    state: Mutex<LineState<T>>,
    subscriber_seq: AtomicU64,
    predicate: Option<ValuePredicate<T>>,
}

impl<T> LineShared<T> {
    fn remove_subscriber(&self, id: SubscriberId) {
        let mut state = lock(&self.state, SOURCE, "remove_subscriber");
        state.value_subscribers.retain(|(sid, _)| *sid != id);
        state.sync_subscribers.retain(|(sid, _)| *sid != id);
        state.combined_subscribers.retain(|(sid, _)| *sid != id);
    }
}

/// One mutable cache cell: latest value, syncing flag, subscriber lists.
///
/// Cheap to clone; clones share the same cell. A line is owned by its hub
/// and handed to the owning service so it can push values via [`next`],
/// [`begin_sync`], [`end_sync`], and [`end_sync_and_next`].
///
/// [`next`]: DataLine::next
/// [`begin_sync`]: DataLine::begin_sync
/// [`end_sync`]: DataLine::end_sync
/// [`end_sync_and_next`]: DataLine::end_sync_and_next
pub struct DataLine<T> {
    shared: Arc<LineShared<T>>,
}

impl<T> Clone for DataLine<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for DataLine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DataLine<T> {
    /// A fresh, empty line with no destroyable predicate.
    pub fn new() -> Self {
        Self::with_predicate(None)
    }

    pub(crate) fn with_predicate(predicate: Option<ValuePredicate<T>>) -> Self {
        Self {
            shared: Arc::new(LineShared {
                state: Mutex::new(LineState {
                    value: None,
                    syncing: false,
                    value_subscribers: Vec::new(),
                    sync_subscribers: Vec::new(),
                    combined_subscribers: Vec::new(),
                }),
                subscriber_seq: AtomicU64::new(0),
                predicate,
            }),
        }
    }

    pub(crate) fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.shared.subscriber_seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Detach a subscriber. Idempotent: unknown or already-removed ids are a
    /// no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.shared.remove_subscriber(id);
    }
}

impl<T: Clone + Send + Sync + 'static> DataLine<T> {
    /// Register a value subscriber.
    ///
    /// If the line already holds a value, `subscriber` is invoked with it
    /// synchronously, exactly once, before this call returns.
    pub fn subscribe(
        &self,
        subscriber: impl Fn(&T) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id();
        let subscriber: ValueSubscriber<T> = Arc::new(subscriber);
        let replay = {
            let mut state = lock(&self.shared.state, SOURCE, "subscribe");
            state.value_subscribers.push((id, subscriber.clone()));
            state.value.clone()
        };
        if let Some(value) = replay {
            subscriber(&value);
        }
        id
    }

    /// Register a syncing-flag subscriber.
    ///
    /// The current flag value is delivered immediately; afterwards the
    /// subscriber only hears actual transitions.
    pub fn subscribe_sync(
        &self,
        subscriber: impl Fn(bool) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id();
        let subscriber: SyncSubscriber = Arc::new(subscriber);
        let current = {
            let mut state = lock(&self.shared.state, SOURCE, "subscribe_sync");
            state.sync_subscribers.push((id, subscriber.clone()));
            state.syncing
        };
        subscriber(current);
        id
    }

    /// Register a combined subscriber hearing `(value, syncing)` whenever
    /// either side changes. Nothing is delivered until the line has a value.
    pub fn subscribe_combined(
        &self,
        subscriber: impl Fn(&T, bool) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id();
        let subscriber: CombinedSubscriber<T> = Arc::new(subscriber);
        let replay = {
            let mut state = lock(&self.shared.state, SOURCE, "subscribe_combined");
            state
                .combined_subscribers
                .push((id, subscriber.clone()));
            state.value.clone().map(|value| (value, state.syncing))
        };
        if let Some((value, syncing)) = replay {
            subscriber(&value, syncing);
        }
        id
    }

    /// Set the value and notify every currently-registered subscriber, in
    /// registration order, with the new value.
    pub fn next(&self, value: T) {
        let (value_subs, combined_subs, syncing) = {
            let mut state = lock(&self.shared.state, SOURCE, "next");
            state.value = Some(value.clone());
            (
                state
                    .value_subscribers
                    .iter()
                    .map(|(_, cb)| cb.clone())
                    .collect::<Vec<_>>(),
                state
                    .combined_subscribers
                    .iter()
                    .map(|(_, cb)| cb.clone())
                    .collect::<Vec<_>>(),
                state.syncing,
            )
        };
        for subscriber in value_subs {
            subscriber(&value);
        }
        for subscriber in combined_subs {
            subscriber(&value, syncing);
        }
    }

    /// Raise the syncing flag. Emits only if the flag was down.
    pub fn begin_sync(&self) {
        self.set_syncing(true);
    }

    /// Lower the syncing flag. Emits only if the flag was up.
    pub fn end_sync(&self) {
        self.set_syncing(false);
    }

    /// `end_sync` followed by `next`: two distinct notifications, not one
    /// combined emission.
    pub fn end_sync_and_next(&self, value: T) {
        self.end_sync();
        self.next(value);
    }

    fn set_syncing(&self, syncing: bool) {
        let notify = {
            let mut state = lock(&self.shared.state, SOURCE, "set_syncing");
            if state.syncing == syncing {
                None
            } else {
                state.syncing = syncing;
                let sync_subs = state
                    .sync_subscribers
                    .iter()
                    .map(|(_, cb)| cb.clone())
                    .collect::<Vec<_>>();
                let combined = state.value.clone().map(|value| {
                    (
                        value,
                        state
                            .combined_subscribers
                            .iter()
                            .map(|(_, cb)| cb.clone())
                            .collect::<Vec<_>>(),
                    )
                });
                Some((sync_subs, combined))
            }
        };

        if let Some((sync_subs, combined)) = notify {
            for subscriber in sync_subs {
                subscriber(syncing);
            }
            if let Some((value, combined_subs)) = combined {
                for subscriber in combined_subs {
                    subscriber(&value, syncing);
                }
            }
        }
    }

    /// The latest value, if any.
    pub fn value(&self) -> Option<T> {
        lock(&self.shared.state, SOURCE, "value").value.clone()
    }

    /// Whether the line is currently syncing.
    pub fn is_syncing(&self) -> bool {
        lock(&self.shared.state, SOURCE, "is_syncing").syncing
    }

    /// True iff no value or combined subscriber remains and the destroyable
    /// predicate (default: always true) accepts the current value.
    ///
    /// Watchers of the bare syncing flag do not pin a line.
    pub fn destroyable(&self) -> bool {
        let state = lock(&self.shared.state, SOURCE, "destroyable");
        state.value_subscribers.is_empty()
            && state.combined_subscribers.is_empty()
            && match &self.shared.predicate {
                Some(predicate) => predicate(state.value.as_ref()),
                None => true,
            }
    }

    /// A cold per-subscriber stream of values. Each stream performs its own
    /// subscription, so each new stream replays the current value if one is
    /// defined, and unsubscribes when dropped.
    pub fn observe(&self) -> DataStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |value: &T| {
            let _ = tx.send(value.clone());
        });
        DataStream {
            rx,
            _guard: StreamGuard {
                line: Arc::downgrade(&self.shared),
                id,
            },
        }
    }

    /// A stream of the syncing flag; the current value is delivered first.
    pub fn observe_sync(&self) -> SyncStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe_sync(move |syncing| {
            let _ = tx.send(syncing);
        });
        SyncStream {
            rx,
            _guard: StreamGuard {
                line: Arc::downgrade(&self.shared),
                id,
            },
        }
    }

    /// A stream of `(value, syncing)` pairs; silent until the line has a
    /// value.
    pub fn observe_with_sync(&self) -> CombinedStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe_combined(move |value: &T, syncing| {
            let _ = tx.send(WithSyncStatus {
                data: value.clone(),
                syncing,
            });
        });
        CombinedStream {
            rx,
            _guard: StreamGuard {
                line: Arc::downgrade(&self.shared),
                id,
            },
        }
    }

    pub(crate) fn detacher(&self, id: SubscriberId) -> impl FnOnce() + Send + 'static {
        let line = Arc::downgrade(&self.shared);
        move || {
            if let Some(shared) = line.upgrade() {
                shared.remove_subscriber(id);
            }
        }
    }
}

/// Unsubscribes its id when dropped; holds the line weakly so an abandoned
/// stream never keeps an evicted line alive.
struct StreamGuard<T> {
    line: Weak<LineShared<T>>,
    id: SubscriberId,
}

impl<T> Drop for StreamGuard<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.line.upgrade() {
            shared.remove_subscriber(self.id);
        }
    }
}

/// Stream returned by [`DataLine::observe`].
pub struct DataStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
    _guard: StreamGuard<T>,
}

impl<T> Stream for DataStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Stream returned by [`DataLine::observe_sync`].
pub struct SyncStream<T> {
    rx: mpsc::UnboundedReceiver<bool>,
    _guard: StreamGuard<T>,
}

impl<T> Stream for SyncStream<T> {
    type Item = bool;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<bool>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Stream returned by [`DataLine::observe_with_sync`].
pub struct CombinedStream<T> {
    rx: mpsc::UnboundedReceiver<WithSyncStatus<T>>,
    _guard: StreamGuard<T>,
}

impl<T> Stream for CombinedStream<T> {
    type Item = WithSyncStatus<T>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<WithSyncStatus<T>>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
