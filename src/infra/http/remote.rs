//! HTTP implementation of the remote API seam.
//!
//! Maps backend status codes onto [`FetchError`] variants (404 → not found,
//! 403 → forbidden, transport failures → network) and handles conditional
//! avatar fetches with `If-None-Match`. Payloads whose response lacks an
//! `ETag` get a content digest instead so revalidation still works.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use flusso_api_types::{HttpPost, HttpTimeline, HttpUser, HttpUserPatchRequest};

use crate::config::ApiSettings;
use crate::infra::error::InfraError;

use super::client::{BlobPayload, FetchError, Revalidation, TimelineApi, UserApi};

const DEFAULT_MIME: &str = "application/octet-stream";

/// Reqwest-backed client for the Flusso backend.
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::endpoint(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            token: settings.token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|err| FetchError::Url(format!("{path}: {err}")))
    }

    fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let response = request.send().await.map_err(network_error)?;
        match classify_status(response.status()) {
            Some(error) => Err(error),
            None => Ok(response),
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }

    async fn fetch_blob(&self, response: Response) -> Result<BlobPayload, FetchError> {
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_MIME)
            .to_string();
        let header_etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(network_error)?;
        let etag = match header_etag {
            Some(etag) => etag,
            None => content_digest(&bytes),
        };

        debug!(size = bytes.len(), %etag, "fetched binary payload");
        Ok(BlobPayload { bytes, mime, etag })
    }
}

/// Success statuses pass through; everything else becomes a typed failure.
fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => FetchError::NotFound,
        StatusCode::FORBIDDEN => FetchError::Forbidden,
        other => FetchError::Status {
            status: other.as_u16(),
        },
    })
}

fn network_error(error: reqwest::Error) -> FetchError {
    FetchError::Network(error.to_string())
}

/// Stand-in validator for responses without an `ETag` header.
fn content_digest(bytes: &Bytes) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl TimelineApi for HttpApiClient {
    async fn get_timeline(&self, name: &str) -> Result<HttpTimeline, FetchError> {
        let url = self.endpoint(&format!("timelines/{name}"))?;
        self.fetch_json(self.get(url)).await
    }

    async fn list_posts(&self, timeline_name: &str) -> Result<Vec<HttpPost>, FetchError> {
        let url = self.endpoint(&format!("timelines/{timeline_name}/posts"))?;
        self.fetch_json(self.get(url)).await
    }

    async fn get_post_data(
        &self,
        timeline_name: &str,
        post_id: i64,
    ) -> Result<BlobPayload, FetchError> {
        let url = self.endpoint(&format!("timelines/{timeline_name}/posts/{post_id}/data"))?;
        let response = self.send(self.get(url)).await?;
        self.fetch_blob(response).await
    }
}

#[async_trait]
impl UserApi for HttpApiClient {
    async fn get_user(&self, username: &str) -> Result<HttpUser, FetchError> {
        let url = self.endpoint(&format!("users/{username}"))?;
        self.fetch_json(self.get(url)).await
    }

    async fn get_avatar(
        &self,
        username: &str,
        etag: Option<&str>,
    ) -> Result<Revalidation<BlobPayload>, FetchError> {
        let url = self.endpoint(&format!("users/{username}/avatar"))?;
        let mut request = self.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(network_error)?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(Revalidation::NotModified);
        }
        if let Some(error) = classify_status(response.status()) {
            return Err(error);
        }
        Ok(Revalidation::Fresh(self.fetch_blob(response).await?))
    }

    async fn patch_user(
        &self,
        username: &str,
        request: &HttpUserPatchRequest,
    ) -> Result<HttpUser, FetchError> {
        let url = self.endpoint(&format!("users/{username}"))?;
        let builder = self.authorize(self.http.patch(url)).json(request);
        self.fetch_json(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_the_authoritative_codes() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(classify_status(StatusCode::CREATED).is_none());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            Some(FetchError::NotFound)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            Some(FetchError::Forbidden)
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(FetchError::Status { status: 500 })
        ));
    }

    #[test]
    fn content_digest_is_stable_and_hex() {
        let first = content_digest(&Bytes::from_static(b"abc"));
        let second = content_digest(&Bytes::from_static(b"abc"));
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

        let other = content_digest(&Bytes::from_static(b"abd"));
        assert_ne!(first, other);
    }
}
