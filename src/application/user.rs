//! User sync service.
//!
//! Profiles and avatars each get their own hub. Avatars carry an ETag so a
//! revalidation round trip can answer "not modified" and keep serving the
//! stored bytes; profile updates flag their progress through a
//! [`SyncStatusHub`] for callers that poll instead of subscribing.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use flusso_api_types::{HttpUser, HttpUserPatchRequest};

use crate::domain::Snapshot;
use crate::hub::{DataHub, DataHubConfig, DataLine, DataStream, HubOptions, SyncStatusHub};
use crate::infra::http::{FetchError, Revalidation, UserApi};
use crate::infra::store::{CacheStore, read_stored, remove_stored, write_stored};

use super::METRIC_SYNC_OFFLINE;

pub type UserSnapshot = Snapshot<HttpUser>;

/// Avatar bytes with their validator and content type.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub bytes: Bytes,
    pub etag: String,
    pub mime: String,
}

pub type AvatarSnapshot = Snapshot<Avatar>;

/// Store representation: the payload travels as base64 inside JSON.
#[derive(Debug, Serialize, Deserialize)]
struct StoredAvatar {
    data: String,
    etag: String,
    mime: String,
}

impl Avatar {
    fn to_stored(&self) -> StoredAvatar {
        StoredAvatar {
            data: BASE64.encode(&self.bytes),
            etag: self.etag.clone(),
            mime: self.mime.clone(),
        }
    }

    fn from_stored(stored: StoredAvatar) -> Option<Self> {
        match BASE64.decode(&stored.data) {
            Ok(bytes) => Some(Self {
                bytes: Bytes::from(bytes),
                etag: stored.etag,
                mime: stored.mime,
            }),
            Err(error) => {
                debug!(%error, "stored avatar payload is not valid base64; ignoring");
                None
            }
        }
    }
}

fn user_store_key(username: &str) -> String {
    format!("user/{username}")
}

fn avatar_store_key(username: &str) -> String {
    format!("avatar/{username}")
}

/// Sync service for user profiles and avatars.
pub struct UserService {
    users: DataHub<String, UserSnapshot>,
    avatars: DataHub<String, AvatarSnapshot>,
    operations: SyncStatusHub<String>,
    client: Arc<dyn UserApi>,
    store: Arc<dyn CacheStore>,
}

impl UserService {
    pub fn new(
        client: Arc<dyn UserApi>,
        store: Arc<dyn CacheStore>,
        sweep_interval: Duration,
    ) -> Self {
        let users = {
            let client = client.clone();
            let store = store.clone();
            DataHub::new(
                DataHubConfig::new(HubOptions {
                    sweep_interval,
                    label: "user",
                })
                .with_setup(move |username: &String, line: &DataLine<UserSnapshot>| {
                    line.next(Snapshot::loading());
                    spawn_user_sync(client.clone(), store.clone(), username.clone(), line.clone());
                }),
            )
        };

        let avatars = {
            let client = client.clone();
            let store = store.clone();
            DataHub::new(
                DataHubConfig::new(HubOptions {
                    sweep_interval,
                    label: "avatar",
                })
                .with_setup(move |username: &String, line: &DataLine<AvatarSnapshot>| {
                    line.next(Snapshot::loading());
                    spawn_avatar_sync(
                        client.clone(),
                        store.clone(),
                        username.clone(),
                        line.clone(),
                    );
                }),
            )
        };

        Self {
            users,
            avatars,
            operations: SyncStatusHub::new(),
            client,
            store,
        }
    }

    /// Snapshot stream for one user profile.
    pub fn user(&self, username: &str) -> DataStream<UserSnapshot> {
        self.users.observe(&username.to_string())
    }

    /// Snapshot stream for one user's avatar.
    pub fn avatar(&self, username: &str) -> DataStream<AvatarSnapshot> {
        self.avatars.observe(&username.to_string())
    }

    /// Whether a profile update for `username` is currently in flight.
    pub fn is_updating(&self, username: &str) -> bool {
        self.operations.is_syncing(&username.to_string())
    }

    /// Change a user's nickname; the fresh profile is pushed into the user
    /// hub and persisted on success.
    pub async fn update_nickname(
        &self,
        username: &str,
        nickname: &str,
    ) -> Result<HttpUser, FetchError> {
        let key = username.to_string();
        self.operations.begin(&key);
        let result = self
            .client
            .patch_user(
                username,
                &HttpUserPatchRequest {
                    nickname: Some(nickname.to_string()),
                },
            )
            .await;
        self.operations.end(&key);

        let user = result?;
        write_stored(self.store.as_ref(), &user_store_key(username), &user).await;
        self.users
            .get_line_or_create_without_setup(&key)
            .next(Snapshot::synced(user.clone()));
        Ok(user)
    }

    /// Force a fresh profile fetch. No-op while a fetch is already in
    /// flight.
    pub fn reload_user(&self, username: &str) {
        let line = self
            .users
            .get_line_or_create_without_setup(&username.to_string());
        if line.is_syncing() {
            return;
        }
        spawn_user_sync(
            self.client.clone(),
            self.store.clone(),
            username.to_string(),
            line,
        );
    }

    /// Force a fresh avatar fetch (revalidating against the stored ETag).
    /// No-op while a fetch is already in flight.
    pub fn reload_avatar(&self, username: &str) {
        let line = self
            .avatars
            .get_line_or_create_without_setup(&username.to_string());
        if line.is_syncing() {
            return;
        }
        spawn_avatar_sync(
            self.client.clone(),
            self.store.clone(),
            username.to_string(),
            line,
        );
    }
}

fn spawn_user_sync(
    client: Arc<dyn UserApi>,
    store: Arc<dyn CacheStore>,
    username: String,
    line: DataLine<UserSnapshot>,
) {
    line.begin_sync();
    tokio::spawn(async move {
        let store_key = user_store_key(&username);
        let saved: Option<HttpUser> = read_stored(store.as_ref(), &store_key).await;
        if let Some(saved) = &saved
            && line.value().is_none_or(|snapshot| snapshot.data.is_none())
        {
            line.next(Snapshot::syncing_with(saved.clone()));
        }

        match client.get_user(&username).await {
            Ok(user) => {
                write_stored(store.as_ref(), &store_key, &user).await;
                line.end_sync_and_next(Snapshot::synced(user));
            }
            Err(FetchError::NotFound) => {
                remove_stored(store.as_ref(), &store_key).await;
                line.end_sync_and_next(Snapshot::not_found());
            }
            Err(FetchError::Forbidden) => {
                line.end_sync_and_next(Snapshot::forbidden());
            }
            Err(error) => {
                warn!(user = %username, %error, "user fetch failed; serving cached data");
                counter!(METRIC_SYNC_OFFLINE, "entity" => "user").increment(1);
                line.end_sync_and_next(Snapshot::offline(saved));
            }
        }
    });
}

fn spawn_avatar_sync(
    client: Arc<dyn UserApi>,
    store: Arc<dyn CacheStore>,
    username: String,
    line: DataLine<AvatarSnapshot>,
) {
    line.begin_sync();
    tokio::spawn(async move {
        let store_key = avatar_store_key(&username);
        let saved: Option<Avatar> = read_stored::<StoredAvatar>(store.as_ref(), &store_key)
            .await
            .and_then(Avatar::from_stored);
        if let Some(saved) = &saved
            && line.value().is_none_or(|snapshot| snapshot.data.is_none())
        {
            line.next(Snapshot::syncing_with(saved.clone()));
        }

        let etag = saved.as_ref().map(|avatar| avatar.etag.clone());
        match client.get_avatar(&username, etag.as_deref()).await {
            Ok(Revalidation::NotModified) => match saved {
                Some(avatar) => line.end_sync_and_next(Snapshot::synced(avatar)),
                None => {
                    // Only reachable when the server answers 304 to an
                    // unconditional request.
                    warn!(user = %username, "not-modified answer without a cached avatar");
                    line.end_sync_and_next(Snapshot::offline(None));
                }
            },
            Ok(Revalidation::Fresh(payload)) => {
                let avatar = Avatar {
                    bytes: payload.bytes,
                    etag: payload.etag,
                    mime: payload.mime,
                };
                write_stored(store.as_ref(), &store_key, &avatar.to_stored()).await;
                line.end_sync_and_next(Snapshot::synced(avatar));
            }
            Err(FetchError::NotFound) => {
                remove_stored(store.as_ref(), &store_key).await;
                line.end_sync_and_next(Snapshot::not_found());
            }
            Err(FetchError::Forbidden) => {
                line.end_sync_and_next(Snapshot::forbidden());
            }
            Err(error) => {
                warn!(user = %username, %error, "avatar fetch failed; serving cached data");
                counter!(METRIC_SYNC_OFFLINE, "entity" => "avatar").increment(1);
                line.end_sync_and_next(Snapshot::offline(saved));
            }
        }
    });
}
