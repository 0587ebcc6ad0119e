//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::notification::Channel;
use crate::preferences::ResolutionOutcome;

use super::{
    ACKS_RECEIVED_TOTAL, DELIVERIES_TOTAL, DELIVERY_FAILURES_TOTAL, DIGEST_BUCKETS_OPENED,
    DIGEST_FLUSHED_TOTAL, DIGEST_FLUSH_FAILURES, DIGEST_QUEUED_TOTAL, HEARTBEAT_DURATION_MS,
    PUSHES_DELIVERED_TOTAL, RESOLUTIONS_TOTAL, STALE_CONNECTIONS_REMOVED, WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording resolution metrics
pub struct ResolutionMetrics;

impl ResolutionMetrics {
    pub fn record(outcome: ResolutionOutcome) {
        RESOLUTIONS_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record an attempted delivery on a channel
    pub fn record_attempt(channel: Channel) {
        DELIVERIES_TOTAL.with_label_values(&[channel.as_str()]).inc();
    }

    /// Record a failed delivery on a channel
    pub fn record_failure(channel: Channel) {
        DELIVERY_FAILURES_TOTAL
            .with_label_values(&[channel.as_str()])
            .inc();
    }

    /// Record in-app pushes that reached live sessions
    pub fn record_pushed(count: u64) {
        PUSHES_DELIVERED_TOTAL.inc_by(count);
    }

    /// Record a delivery acknowledgment
    pub fn record_ack() {
        ACKS_RECEIVED_TOTAL.inc();
    }
}

/// Helper struct for recording digest metrics
pub struct DigestMetrics;

impl DigestMetrics {
    pub fn record_bucket_opened() {
        DIGEST_BUCKETS_OPENED.inc();
    }

    pub fn record_queued() {
        DIGEST_QUEUED_TOTAL.inc();
    }

    pub fn record_flushed() {
        DIGEST_FLUSHED_TOTAL.inc();
    }

    pub fn record_flush_failure() {
        DIGEST_FLUSH_FAILURES.inc();
    }
}

/// Helper struct for recording WebSocket message metrics
pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_authenticate() {
        WS_MESSAGES_RECEIVED.with_label_values(&["authenticate"]).inc();
    }

    pub fn record_ack() {
        WS_MESSAGES_RECEIVED
            .with_label_values(&["notification:read"])
            .inc();
    }

    pub fn record_ping() {
        WS_MESSAGES_RECEIVED.with_label_values(&["ping"]).inc();
    }
}

/// Helper struct for recording heartbeat metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_duration_ms(ms: u64) {
        HEARTBEAT_DURATION_MS.observe(ms as f64);
    }

    pub fn record_stale_removed(count: u64) {
        STALE_CONNECTIONS_REMOVED.inc_by(count);
    }
}
