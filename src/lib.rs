//! Flusso client data engine.
//!
//! The data layer of the Flusso timeline client: every piece of
//! remotely-fetched state (timelines, post lists, post payloads, user
//! profiles, avatars) is routed through a reactive cache hub and surfaced to
//! the UI as snapshot streams.
//!
//! ## Layers
//!
//! - [`hub`] — the cache core: keyed lines with replay-latest subscription,
//!   per-line sync flags, and timer-driven eviction of unwatched lines.
//! - [`domain`] — snapshot and key types shared by the services.
//! - [`application`] — entity sync services implementing the cache-first
//!   flow (stored value now, network value when it arrives, stale value when
//!   the network fails).
//! - [`infra`] — the collaborator seams: remote API client, local store,
//!   blob registry, telemetry bootstrap.
//! - [`config`] — layered settings (file → environment).
//!
//! ## Wiring
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use flusso::application::{TimelineService, UserService};
//! use flusso::infra::blob::BlobRegistry;
//! use flusso::infra::http::HttpApiClient;
//! use flusso::infra::store::MemoryStore;
//! use flusso::infra::telemetry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = flusso::config::load(None)?;
//! telemetry::init(&settings.logging)?;
//!
//! let client = Arc::new(HttpApiClient::new(&settings.api)?);
//! let store = Arc::new(MemoryStore::new(settings.hub.store_capacity));
//! let blobs = Arc::new(BlobRegistry::new());
//!
//! let timelines = TimelineService::new(
//!     client.clone(),
//!     store.clone(),
//!     blobs.clone(),
//!     settings.hub.sweep_interval,
//! );
//! let users = UserService::new(client, store, settings.hub.sweep_interval);
//! # let _ = (timelines, users);
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod hub;
pub mod infra;

pub use flusso_api_types as api_types;
