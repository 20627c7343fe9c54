//! Metrics initialization for the Prometheus exporter.

use metrics::{Unit, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::{Error, Result};

/// Initialize the metrics system based on configuration.
///
/// When enabled, an HTTP listener serves the `/metrics` endpoint. When
/// disabled this is a no-op and the counters recorded by the frame loop
/// go nowhere.
pub fn init(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()
        .map_err(|err| Error::Metrics(err.to_string()))?;

    describe();
    Ok(())
}

fn describe() {
    describe_counter!(
        "taplink_frames_received_total",
        Unit::Count,
        "Frames read from the device"
    );
    describe_counter!(
        "taplink_frames_sent_total",
        Unit::Count,
        "Frames fully written to the device"
    );
    describe_counter!(
        "taplink_frames_dropped_total",
        Unit::Count,
        "Frames rejected by the parser"
    );
    describe_counter!(
        "taplink_arp_replies_total",
        Unit::Count,
        "ARP replies sent for the local address"
    );
    describe_counter!(
        "taplink_arp_rebroadcasts_total",
        Unit::Count,
        "ARP broadcasts written back to the device"
    );
    describe_counter!(
        "taplink_arp_suppressed_total",
        Unit::Count,
        "ARP broadcasts dropped inside the cooldown window"
    );
}
