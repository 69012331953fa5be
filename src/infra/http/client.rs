//! Remote API seam.
//!
//! The sync services fetch through these traits; production wires in the
//! HTTP implementation, tests substitute scripted fakes. Failures are typed:
//! the services treat [`FetchError::NotFound`] and [`FetchError::Forbidden`]
//! as authoritative answers and everything else as a reason to fall back to
//! cached data.

use async_trait::async_trait;
use bytes::Bytes;
use flusso_api_types::{HttpPost, HttpTimeline, HttpUser, HttpUserPatchRequest};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("resource not found")]
    NotFound,
    #[error("access forbidden")]
    Forbidden,
    #[error("network unreachable: {0}")]
    Network(String),
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    Url(String),
}

impl FetchError {
    /// Authoritative answers are terminal: the entity is gone or off limits,
    /// and retrying will not change that.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, FetchError::NotFound | FetchError::Forbidden)
    }
}

/// A binary payload with its content type and validator.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobPayload {
    pub bytes: Bytes,
    pub mime: String,
    pub etag: String,
}

/// Outcome of a conditional fetch against a cached validator.
#[derive(Debug, Clone, PartialEq)]
pub enum Revalidation<T> {
    /// The server sent a fresh payload.
    Fresh(T),
    /// The cached copy is still current.
    NotModified,
}

/// Timeline reads used by the timeline sync service.
#[async_trait]
pub trait TimelineApi: Send + Sync {
    async fn get_timeline(&self, name: &str) -> Result<HttpTimeline, FetchError>;

    async fn list_posts(&self, timeline_name: &str) -> Result<Vec<HttpPost>, FetchError>;

    async fn get_post_data(
        &self,
        timeline_name: &str,
        post_id: i64,
    ) -> Result<BlobPayload, FetchError>;
}

/// User reads and the profile update used by the user sync service.
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn get_user(&self, username: &str) -> Result<HttpUser, FetchError>;

    /// Fetch an avatar, revalidating against `etag` when one is cached.
    async fn get_avatar(
        &self,
        username: &str,
        etag: Option<&str>,
    ) -> Result<Revalidation<BlobPayload>, FetchError>;

    async fn patch_user(
        &self,
        username: &str,
        request: &HttpUserPatchRequest,
    ) -> Result<HttpUser, FetchError>;
}
