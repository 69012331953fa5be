//! In-process blob registry.
//!
//! Binary payloads (post images, avatars) are registered here under opaque
//! handles. The UI resolves a handle to a data URL; the SubscriptionHub line
//! teardown revokes the handle when the line is evicted, releasing the
//! bytes. The registry never expires entries on its own — a handle lives
//! until someone revokes it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use dashmap::DashMap;
use metrics::{counter, gauge};
use tracing::debug;
use uuid::Uuid;

pub(crate) const METRIC_BLOB_REGISTERED: &str = "flusso_blob_registered_total";
pub(crate) const METRIC_BLOB_REVOKED: &str = "flusso_blob_revoked_total";
pub(crate) const METRIC_BLOB_BYTES: &str = "flusso_blob_bytes";

/// Opaque reference to one registered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobHandle(Uuid);

struct BlobEntry {
    bytes: Bytes,
    mime: String,
}

/// Registry of binary payloads keyed by handle.
#[derive(Default)]
pub struct BlobRegistry {
    entries: DashMap<Uuid, BlobEntry>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload and return its handle.
    pub fn register(&self, bytes: Bytes, mime: impl Into<String>) -> BlobHandle {
        let id = Uuid::new_v4();
        let mime = mime.into();
        let size = bytes.len();

        self.entries.insert(id, BlobEntry { bytes, mime });

        counter!(METRIC_BLOB_REGISTERED).increment(1);
        gauge!(METRIC_BLOB_BYTES).increment(size as f64);
        debug!(handle = %id, size, "registered blob");

        BlobHandle(id)
    }

    /// The raw bytes behind a handle, if it is still registered.
    pub fn bytes(&self, handle: &BlobHandle) -> Option<Bytes> {
        self.entries.get(&handle.0).map(|entry| entry.bytes.clone())
    }

    /// The payload as a `data:` URL, if the handle is still registered.
    pub fn data_url(&self, handle: &BlobHandle) -> Option<String> {
        self.entries.get(&handle.0).map(|entry| {
            format!(
                "data:{};base64,{}",
                entry.mime,
                BASE64.encode(&entry.bytes)
            )
        })
    }

    /// Release a handle. Returns false when it was already gone.
    pub fn revoke(&self, handle: &BlobHandle) -> bool {
        match self.entries.remove(&handle.0) {
            Some((id, entry)) => {
                counter!(METRIC_BLOB_REVOKED).increment(1);
                gauge!(METRIC_BLOB_BYTES).decrement(entry.bytes.len() as f64);
                debug!(handle = %id, size = entry.bytes.len(), "revoked blob");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let registry = BlobRegistry::new();
        let handle = registry.register(Bytes::from_static(b"abc"), "text/plain");

        assert_eq!(registry.bytes(&handle), Some(Bytes::from_static(b"abc")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn data_url_encodes_mime_and_payload() {
        let registry = BlobRegistry::new();
        let handle = registry.register(Bytes::from_static(b"abc"), "image/png");

        let url = registry.data_url(&handle).expect("registered handle");
        assert_eq!(url, "data:image/png;base64,YWJj");
    }

    #[test]
    fn revoke_is_idempotent() {
        let registry = BlobRegistry::new();
        let handle = registry.register(Bytes::from_static(b"abc"), "text/plain");

        assert!(registry.revoke(&handle));
        assert!(!registry.revoke(&handle));
        assert!(registry.bytes(&handle).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn handles_are_unique_per_registration() {
        let registry = BlobRegistry::new();
        let first = registry.register(Bytes::from_static(b"a"), "text/plain");
        let second = registry.register(Bytes::from_static(b"a"), "text/plain");
        assert_ne!(first, second);
    }
}
