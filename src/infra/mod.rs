//! Infrastructure adapters: remote client, local store, blob registry,
//! telemetry bootstrap.

pub mod blob;
pub mod error;
pub mod http;
pub mod store;
pub mod telemetry;
