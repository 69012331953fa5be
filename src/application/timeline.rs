//! Timeline sync service.
//!
//! Routes timeline info, post lists, and post binary payloads through their
//! hubs. Timeline info and post lists are persisted to the local store for
//! offline fallback; binary payloads live in the blob registry and are
//! released by the line teardown when the sweep evicts them.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use flusso_api_types::{HttpPost, HttpTimeline};

use crate::domain::{PostKey, Snapshot};
use crate::hub::{
    DataHub, DataHubConfig, DataLine, DataStream, HubOptions, Subscription, SubscriptionHub,
    SubscriptionHubConfig, Teardown,
};
use crate::infra::blob::{BlobHandle, BlobRegistry};
use crate::infra::http::{FetchError, TimelineApi};
use crate::infra::store::{CacheStore, read_stored, remove_stored, write_stored};

use super::METRIC_SYNC_OFFLINE;

pub type TimelineSnapshot = Snapshot<HttpTimeline>;
pub type PostListSnapshot = Snapshot<Vec<HttpPost>>;

/// A fetched post payload, resolvable through the blob registry.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPayload {
    pub handle: BlobHandle,
    pub mime: String,
    pub size: usize,
}

pub type PostPayloadSnapshot = Snapshot<PostPayload>;

fn timeline_store_key(name: &str) -> String {
    format!("timeline/{name}")
}

fn posts_store_key(name: &str) -> String {
    format!("posts/{name}")
}

/// Sync service for timelines, their post lists, and post payloads.
pub struct TimelineService {
    timelines: DataHub<String, TimelineSnapshot>,
    posts: DataHub<String, PostListSnapshot>,
    payloads: SubscriptionHub<PostKey, PostPayloadSnapshot>,
    client: Arc<dyn TimelineApi>,
    store: Arc<dyn CacheStore>,
}

impl TimelineService {
    pub fn new(
        client: Arc<dyn TimelineApi>,
        store: Arc<dyn CacheStore>,
        blobs: Arc<BlobRegistry>,
        sweep_interval: Duration,
    ) -> Self {
        let timelines = {
            let client = client.clone();
            let store = store.clone();
            DataHub::new(
                DataHubConfig::new(HubOptions {
                    sweep_interval,
                    label: "timeline",
                })
                .with_setup(move |name: &String, line: &DataLine<TimelineSnapshot>| {
                    line.next(Snapshot::loading());
                    spawn_timeline_sync(client.clone(), store.clone(), name.clone(), line.clone());
                }),
            )
        };

        let posts = {
            let client = client.clone();
            let store = store.clone();
            DataHub::new(
                DataHubConfig::new(HubOptions {
                    sweep_interval,
                    label: "posts",
                })
                .with_setup(move |name: &String, line: &DataLine<PostListSnapshot>| {
                    line.next(Snapshot::loading());
                    spawn_posts_sync(client.clone(), store.clone(), name.clone(), line.clone());
                }),
            )
        };

        let payloads = {
            let client = client.clone();
            SubscriptionHub::new(
                SubscriptionHubConfig::new(HubOptions {
                    sweep_interval,
                    label: "post-data",
                })
                .with_setup(move |key: &PostKey, line: &DataLine<PostPayloadSnapshot>| {
                    line.next(Snapshot::loading());
                    spawn_payload_sync(client.clone(), blobs.clone(), key.clone(), line.clone());

                    // Evicting the line releases whatever payload it ended
                    // up holding.
                    let line = line.clone();
                    let blobs = blobs.clone();
                    Some(Box::new(move || {
                        if let Some(snapshot) = line.value()
                            && let Some(payload) = snapshot.data
                        {
                            blobs.revoke(&payload.handle);
                        }
                    }) as Teardown)
                }),
            )
        };

        Self {
            timelines,
            posts,
            payloads,
            client,
            store,
        }
    }

    /// Snapshot stream for one timeline. Subscribing is what triggers the
    /// initial fetch.
    pub fn timeline(&self, name: &str) -> DataStream<TimelineSnapshot> {
        self.timelines.observe(&name.to_string())
    }

    /// Snapshot stream for one timeline's post list.
    pub fn posts(&self, name: &str) -> DataStream<PostListSnapshot> {
        self.posts.observe(&name.to_string())
    }

    /// Subscribe to one post's binary payload. Dropping the subscription
    /// releases interest; the payload itself is revoked when the line is
    /// eventually swept.
    pub fn post_payload(
        &self,
        key: &PostKey,
        subscriber: impl Fn(&PostPayloadSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        self.payloads.subscribe(key, subscriber)
    }

    /// Snapshot stream for one post's binary payload.
    pub fn observe_post_payload(&self, key: &PostKey) -> DataStream<PostPayloadSnapshot> {
        self.payloads.observe(key)
    }

    /// Force a fresh timeline fetch. No-op while a fetch is already in
    /// flight.
    pub fn reload_timeline(&self, name: &str) {
        let line = self
            .timelines
            .get_line_or_create_without_setup(&name.to_string());
        if line.is_syncing() {
            return;
        }
        spawn_timeline_sync(
            self.client.clone(),
            self.store.clone(),
            name.to_string(),
            line,
        );
    }

    /// Force a fresh post list fetch. No-op while a fetch is already in
    /// flight.
    pub fn reload_posts(&self, name: &str) {
        let line = self
            .posts
            .get_line_or_create_without_setup(&name.to_string());
        if line.is_syncing() {
            return;
        }
        spawn_posts_sync(
            self.client.clone(),
            self.store.clone(),
            name.to_string(),
            line,
        );
    }
}

fn spawn_timeline_sync(
    client: Arc<dyn TimelineApi>,
    store: Arc<dyn CacheStore>,
    name: String,
    line: DataLine<TimelineSnapshot>,
) {
    line.begin_sync();
    tokio::spawn(async move {
        let store_key = timeline_store_key(&name);
        let saved: Option<HttpTimeline> = read_stored(store.as_ref(), &store_key).await;
        if let Some(saved) = &saved
            && line.value().is_none_or(|snapshot| snapshot.data.is_none())
        {
            line.next(Snapshot::syncing_with(saved.clone()));
        }

        match client.get_timeline(&name).await {
            Ok(timeline) => {
                write_stored(store.as_ref(), &store_key, &timeline).await;
                line.end_sync_and_next(Snapshot::synced(timeline));
            }
            Err(FetchError::NotFound) => {
                remove_stored(store.as_ref(), &store_key).await;
                line.end_sync_and_next(Snapshot::not_found());
            }
            Err(FetchError::Forbidden) => {
                line.end_sync_and_next(Snapshot::forbidden());
            }
            Err(error) => {
                warn!(timeline = %name, %error, "timeline fetch failed; serving cached data");
                counter!(METRIC_SYNC_OFFLINE, "entity" => "timeline").increment(1);
                line.end_sync_and_next(Snapshot::offline(saved));
            }
        }
    });
}

fn spawn_posts_sync(
    client: Arc<dyn TimelineApi>,
    store: Arc<dyn CacheStore>,
    name: String,
    line: DataLine<PostListSnapshot>,
) {
    line.begin_sync();
    tokio::spawn(async move {
        let store_key = posts_store_key(&name);
        let saved: Option<Vec<HttpPost>> = read_stored(store.as_ref(), &store_key).await;
        if let Some(saved) = &saved
            && line.value().is_none_or(|snapshot| snapshot.data.is_none())
        {
            line.next(Snapshot::syncing_with(saved.clone()));
        }

        match client.list_posts(&name).await {
            Ok(posts) => {
                write_stored(store.as_ref(), &store_key, &posts).await;
                line.end_sync_and_next(Snapshot::synced(posts));
            }
            Err(FetchError::NotFound) => {
                remove_stored(store.as_ref(), &store_key).await;
                line.end_sync_and_next(Snapshot::not_found());
            }
            Err(FetchError::Forbidden) => {
                line.end_sync_and_next(Snapshot::forbidden());
            }
            Err(error) => {
                warn!(timeline = %name, %error, "post list fetch failed; serving cached data");
                counter!(METRIC_SYNC_OFFLINE, "entity" => "posts").increment(1);
                line.end_sync_and_next(Snapshot::offline(saved));
            }
        }
    });
}

fn spawn_payload_sync(
    client: Arc<dyn TimelineApi>,
    blobs: Arc<BlobRegistry>,
    key: PostKey,
    line: DataLine<PostPayloadSnapshot>,
) {
    line.begin_sync();
    tokio::spawn(async move {
        match client.get_post_data(&key.timeline_name, key.post_id).await {
            Ok(payload) => {
                let size = payload.bytes.len();
                let handle = blobs.register(payload.bytes, payload.mime.clone());
                line.end_sync_and_next(Snapshot::synced(PostPayload {
                    handle,
                    mime: payload.mime,
                    size,
                }));
            }
            Err(FetchError::NotFound) => {
                line.end_sync_and_next(Snapshot::not_found());
            }
            Err(FetchError::Forbidden) => {
                line.end_sync_and_next(Snapshot::forbidden());
            }
            Err(error) => {
                warn!(
                    timeline = %key.timeline_name,
                    post = key.post_id,
                    %error,
                    "post payload fetch failed"
                );
                counter!(METRIC_SYNC_OFFLINE, "entity" => "post-data").increment(1);
                let previous = line.value().and_then(|snapshot| snapshot.data);
                line.end_sync_and_next(Snapshot::offline(previous));
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use time::macros::datetime;
    use tokio::sync::Notify;
    use uuid::Uuid;

    use flusso_api_types::{HttpUser, TimelineVisibility};

    use crate::domain::SyncState;
    use crate::infra::http::BlobPayload;
    use crate::infra::store::MemoryStore;

    use super::*;

    fn sample_user(username: &str) -> HttpUser {
        HttpUser {
            unique_id: Uuid::nil(),
            username: username.to_string(),
            nickname: username.to_string(),
            permissions: vec![],
        }
    }

    fn sample_timeline(name: &str) -> HttpTimeline {
        HttpTimeline {
            unique_id: Uuid::nil(),
            name: name.to_string(),
            description: "".to_string(),
            owner: sample_user("alice"),
            visibility: TimelineVisibility::Public,
            last_modified: datetime!(2024-05-01 12:00 UTC),
            members: vec![],
        }
    }

    fn sample_post(id: i64) -> HttpPost {
        HttpPost {
            id,
            content: None,
            time: datetime!(2024-05-01 12:00 UTC),
            last_updated: datetime!(2024-05-01 12:00 UTC),
            author: Some(sample_user("alice")),
            deleted: false,
        }
    }

    /// Scripted remote: per-name responses plus a call counter and an
    /// optional gate so tests can hold a fetch in flight.
    #[derive(Default)]
    struct FakeTimelineApi {
        timelines: Mutex<HashMap<String, Result<HttpTimeline, FetchError>>>,
        posts: Mutex<HashMap<String, Result<Vec<HttpPost>, FetchError>>>,
        payloads: Mutex<HashMap<String, Result<BlobPayload, FetchError>>>,
        timeline_calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl TimelineApi for FakeTimelineApi {
        async fn get_timeline(&self, name: &str) -> Result<HttpTimeline, FetchError> {
            self.timeline_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.timelines
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or(Err(FetchError::NotFound))
        }

        async fn list_posts(&self, timeline_name: &str) -> Result<Vec<HttpPost>, FetchError> {
            self.posts
                .lock()
                .unwrap()
                .get(timeline_name)
                .cloned()
                .unwrap_or(Err(FetchError::NotFound))
        }

        async fn get_post_data(
            &self,
            timeline_name: &str,
            post_id: i64,
        ) -> Result<BlobPayload, FetchError> {
            self.payloads
                .lock()
                .unwrap()
                .get(&format!("{timeline_name}/{post_id}"))
                .cloned()
                .unwrap_or(Err(FetchError::NotFound))
        }
    }

    fn service_with(client: FakeTimelineApi) -> (TimelineService, Arc<MemoryStore>, Arc<BlobRegistry>) {
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(BlobRegistry::new());
        let service = TimelineService::new(
            Arc::new(client),
            store.clone(),
            blobs.clone(),
            Duration::from_millis(20_000),
        );
        (service, store, blobs)
    }

    async fn next_with_state(
        stream: &mut DataStream<TimelineSnapshot>,
        state: SyncState,
    ) -> TimelineSnapshot {
        loop {
            let snapshot = stream.next().await.expect("stream stays open");
            if snapshot.state == state {
                return snapshot;
            }
        }
    }

    #[tokio::test]
    async fn timeline_reaches_synced_and_persists() {
        let client = FakeTimelineApi::default();
        client
            .timelines
            .lock()
            .unwrap()
            .insert("journal".to_string(), Ok(sample_timeline("journal")));
        let (service, store, _blobs) = service_with(client);

        let mut stream = service.timeline("journal");
        let snapshot = next_with_state(&mut stream, SyncState::Synced).await;
        assert_eq!(snapshot.data.expect("synced data").name, "journal");

        let persisted: Option<HttpTimeline> =
            read_stored(store.as_ref(), "timeline/journal").await;
        assert!(persisted.is_some());
    }

    #[tokio::test]
    async fn network_failure_falls_back_to_stored_value() {
        let client = FakeTimelineApi::default();
        client.timelines.lock().unwrap().insert(
            "journal".to_string(),
            Err(FetchError::Network("down".to_string())),
        );
        let (service, store, _blobs) = service_with(client);
        write_stored(store.as_ref(), "timeline/journal", &sample_timeline("journal")).await;

        let mut stream = service.timeline("journal");
        let snapshot = next_with_state(&mut stream, SyncState::Offline).await;
        assert_eq!(snapshot.data.expect("stale data").name, "journal");
    }

    #[tokio::test]
    async fn network_failure_without_cache_is_offline_and_empty() {
        let client = FakeTimelineApi::default();
        client.timelines.lock().unwrap().insert(
            "journal".to_string(),
            Err(FetchError::Network("down".to_string())),
        );
        let (service, _store, _blobs) = service_with(client);

        let mut stream = service.timeline("journal");
        let snapshot = next_with_state(&mut stream, SyncState::Offline).await;
        assert!(snapshot.data.is_none());
    }

    #[tokio::test]
    async fn not_found_is_terminal_and_clears_the_store() {
        let client = FakeTimelineApi::default();
        client
            .timelines
            .lock()
            .unwrap()
            .insert("gone".to_string(), Err(FetchError::NotFound));
        let (service, store, _blobs) = service_with(client);
        write_stored(store.as_ref(), "timeline/gone", &sample_timeline("gone")).await;

        let mut stream = service.timeline("gone");
        let snapshot = next_with_state(&mut stream, SyncState::NotFound).await;
        assert!(snapshot.data.is_none());

        let persisted: Option<HttpTimeline> = read_stored(store.as_ref(), "timeline/gone").await;
        assert!(persisted.is_none());
    }

    #[tokio::test]
    async fn reload_is_a_no_op_while_syncing() {
        let gate = Arc::new(Notify::new());
        let client = FakeTimelineApi {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        client
            .timelines
            .lock()
            .unwrap()
            .insert("journal".to_string(), Ok(sample_timeline("journal")));
        let client = Arc::new(client);
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(BlobRegistry::new());
        let service = TimelineService::new(
            client.clone(),
            store,
            blobs,
            Duration::from_millis(20_000),
        );

        let mut stream = service.timeline("journal");
        // Fetch one is parked on the gate; a reload now must not start a
        // second fetch.
        service.reload_timeline("journal");
        gate.notify_one();

        let _ = next_with_state(&mut stream, SyncState::Synced).await;
        assert_eq!(client.timeline_calls.load(Ordering::SeqCst), 1);

        // After the first fetch settles, reload starts a fresh one.
        service.reload_timeline("journal");
        gate.notify_one();
        let _ = next_with_state(&mut stream, SyncState::Synced).await;
        assert_eq!(client.timeline_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn posts_flow_reaches_synced() {
        let client = FakeTimelineApi::default();
        client
            .posts
            .lock()
            .unwrap()
            .insert("journal".to_string(), Ok(vec![sample_post(1), sample_post(2)]));
        let (service, _store, _blobs) = service_with(client);

        let mut stream = service.posts("journal");
        let snapshot = loop {
            let snapshot = stream.next().await.expect("stream stays open");
            if snapshot.state == SyncState::Synced {
                break snapshot;
            }
        };
        assert_eq!(snapshot.data.expect("posts").len(), 2);
    }

    #[tokio::test]
    async fn payload_registers_a_blob() {
        let client = FakeTimelineApi::default();
        client.payloads.lock().unwrap().insert(
            "journal/1".to_string(),
            Ok(BlobPayload {
                bytes: Bytes::from_static(b"pixels"),
                mime: "image/png".to_string(),
                etag: "v1".to_string(),
            }),
        );
        let (service, _store, blobs) = service_with(client);

        let key = PostKey::new("journal", 1);
        let mut stream = service.observe_post_payload(&key);
        let snapshot = loop {
            let snapshot = stream.next().await.expect("stream stays open");
            if snapshot.state == SyncState::Synced {
                break snapshot;
            }
        };

        let payload = snapshot.data.expect("payload");
        assert_eq!(payload.size, 6);
        assert_eq!(
            blobs.bytes(&payload.handle),
            Some(Bytes::from_static(b"pixels"))
        );
    }
}
