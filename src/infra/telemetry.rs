use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "flusso_hub_line_created_total",
            Unit::Count,
            "Total number of cache lines created, labeled by hub."
        );
        describe_counter!(
            "flusso_hub_line_evicted_total",
            Unit::Count,
            "Total number of cache lines evicted by the sweep, labeled by hub."
        );
        describe_histogram!(
            "flusso_hub_sweep_ms",
            Unit::Milliseconds,
            "Sweep pass latency in milliseconds, labeled by hub."
        );
        describe_counter!(
            "flusso_sync_offline_total",
            Unit::Count,
            "Total number of fetches that fell back to cached data, labeled by entity."
        );
        describe_counter!(
            "flusso_blob_registered_total",
            Unit::Count,
            "Total number of binary payloads registered in the blob registry."
        );
        describe_counter!(
            "flusso_blob_revoked_total",
            Unit::Count,
            "Total number of binary payloads revoked from the blob registry."
        );
        describe_gauge!(
            "flusso_blob_bytes",
            Unit::Bytes,
            "Bytes currently held by the blob registry."
        );
    });
}
