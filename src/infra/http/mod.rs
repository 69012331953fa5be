//! Remote API client layer.
//!
//! [`client`] defines the seam the sync services fetch through;
//! [`remote`] is the HTTP implementation against the Flusso backend.

mod client;
mod remote;

pub use client::{BlobPayload, FetchError, Revalidation, TimelineApi, UserApi};
pub use remote::HttpApiClient;
