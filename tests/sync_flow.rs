//! Entity sync flows end to end: cache first, network second, cache again
//! on failure. Uses scripted collaborators and a current-thread runtime so
//! emission order is deterministic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use time::macros::datetime;
use uuid::Uuid;

use flusso::application::TimelineService;
use flusso::domain::{PostKey, SyncState};
use flusso::infra::blob::BlobRegistry;
use flusso::infra::http::{BlobPayload, FetchError, TimelineApi};
use flusso::infra::store::{MemoryStore, write_stored};
use flusso_api_types::{HttpPost, HttpTimeline, HttpUser, TimelineVisibility};

fn sample_timeline(name: &str) -> HttpTimeline {
    HttpTimeline {
        unique_id: Uuid::nil(),
        name: name.to_string(),
        description: "".to_string(),
        owner: HttpUser {
            unique_id: Uuid::nil(),
            username: "alice".to_string(),
            nickname: "Alice".to_string(),
            permissions: vec![],
        },
        visibility: TimelineVisibility::Public,
        last_modified: datetime!(2024-05-01 12:00 UTC),
        members: vec![],
    }
}

#[derive(Default)]
struct ScriptedApi {
    timelines: Mutex<HashMap<String, Result<HttpTimeline, FetchError>>>,
    payloads: Mutex<HashMap<String, Result<BlobPayload, FetchError>>>,
}

impl ScriptedApi {
    fn with_timeline(self, name: &str, response: Result<HttpTimeline, FetchError>) -> Self {
        self.timelines
            .lock()
            .unwrap()
            .insert(name.to_string(), response);
        self
    }

    fn with_payload(self, key: &str, response: Result<BlobPayload, FetchError>) -> Self {
        self.payloads
            .lock()
            .unwrap()
            .insert(key.to_string(), response);
        self
    }
}

#[async_trait]
impl TimelineApi for ScriptedApi {
    async fn get_timeline(&self, name: &str) -> Result<HttpTimeline, FetchError> {
        self.timelines
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(Err(FetchError::NotFound))
    }

    async fn list_posts(&self, _timeline_name: &str) -> Result<Vec<HttpPost>, FetchError> {
        Ok(vec![])
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

fn build_service(
    api: ScriptedApi,
    store: Arc<MemoryStore>,
    blobs: Arc<BlobRegistry>,
    sweep_interval: Duration,
) -> TimelineService {
    TimelineService::new(Arc::new(api), store, blobs, sweep_interval)
}

#[tokio::test]
async fn offline_flow_emits_loading_then_stale_then_offline() {
    let api = ScriptedApi::default()
        .with_timeline("journal", Err(FetchError::Network("down".to_string())));
    let store = Arc::new(MemoryStore::default());
    write_stored(store.as_ref(), "timeline/journal", &sample_timeline("journal")).await;

    let service = build_service(
        api,
        store,
        Arc::new(BlobRegistry::new()),
        Duration::from_millis(20_000),
    );

    // On a current-thread runtime the fetch task cannot run before the
    // first await, so the emission order is exact.
    let mut stream = service.timeline("journal");

    let first = stream.next().await.expect("loading emission");
    assert_eq!(first.state, SyncState::Loading);
    assert!(first.data.is_none());

    let second = stream.next().await.expect("stale emission");
    assert_eq!(second.state, SyncState::Syncing);
    assert_eq!(second.data.expect("stale data").name, "journal");

    let third = stream.next().await.expect("offline emission");
    assert_eq!(third.state, SyncState::Offline);
    assert_eq!(third.data.expect("stale data").name, "journal");
}

#[tokio::test]
async fn successful_flow_replaces_the_stale_value() {
    let api = ScriptedApi::default().with_timeline("journal", Ok(sample_timeline("journal")));
    let store = Arc::new(MemoryStore::default());
    let mut stale = sample_timeline("journal");
    stale.description = "yesterday".to_string();
    write_stored(store.as_ref(), "timeline/journal", &stale).await;

    let service = build_service(
        api,
        store,
        Arc::new(BlobRegistry::new()),
        Duration::from_millis(20_000),
    );

    let mut stream = service.timeline("journal");
    let synced = loop {
        let snapshot = stream.next().await.expect("stream stays open");
        if snapshot.state == SyncState::Synced {
            break snapshot;
        }
    };
    assert_eq!(synced.data.expect("fresh data").description, "");
}

#[tokio::test]
async fn forbidden_is_terminal_and_keeps_no_data() {
    let api = ScriptedApi::default().with_timeline("secret", Err(FetchError::Forbidden));
    let service = build_service(
        api,
        Arc::new(MemoryStore::default()),
        Arc::new(BlobRegistry::new()),
        Duration::from_millis(20_000),
    );

    let mut stream = service.timeline("secret");
    let snapshot = loop {
        let snapshot = stream.next().await.expect("stream stays open");
        if snapshot.state == SyncState::Forbidden {
            break snapshot;
        }
    };
    assert!(snapshot.data.is_none());
    assert!(snapshot.state.is_terminal());
}

#[tokio::test(start_paused = true)]
async fn evicted_payload_line_revokes_its_blob() {
    let api = ScriptedApi::default().with_payload(
        "journal/1",
        Ok(BlobPayload {
            bytes: Bytes::from_static(b"pixels"),
            mime: "image/png".to_string(),
            etag: "v1".to_string(),
        }),
    );
    let blobs = Arc::new(BlobRegistry::new());
    let sweep = Duration::from_millis(500);
    let service = build_service(
        api,
        Arc::new(MemoryStore::default()),
        blobs.clone(),
        sweep,
    );

    let key = PostKey::new("journal", 1);
    let mut stream = service.observe_post_payload(&key);
    let snapshot = loop {
        let snapshot = stream.next().await.expect("stream stays open");
        if snapshot.state == SyncState::Synced {
            break snapshot;
        }
    };
    let payload = snapshot.data.expect("payload");
    assert_eq!(blobs.len(), 1);
    assert!(blobs.data_url(&payload.handle).is_some());

    // Releasing the only watcher lets the sweep evict the line, whose
    // teardown revokes the blob.
    drop(stream);
    tokio::time::sleep(sweep + Duration::from_millis(100)).await;

    assert!(blobs.is_empty());
    assert!(blobs.data_url(&payload.handle).is_none());
}
