//! Prometheus metrics for the notification engine.
//!
//! - Resolution metrics (decisions by outcome)
//! - Delivery metrics (per channel, dispatcher totals)
//! - Digest metrics (buckets opened, queued, flushed)
//! - WebSocket metrics (connections, messages, delivery acks)

mod helpers;

pub use helpers::{
    encode_metrics, DeliveryMetrics, DigestMetrics, HeartbeatMetrics, ResolutionMetrics,
    WsMessageMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Total number of authenticated WebSocket connections
    pub static ref CONNECTIONS_TOTAL: IntGauge = register_int_gauge!(
        format!("{}_connections_total", METRIC_PREFIX),
        "Total number of authenticated WebSocket connections"
    ).unwrap();

    /// Number of unique connected users
    pub static ref USERS_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_users_connected", METRIC_PREFIX),
        "Number of unique connected users"
    ).unwrap();

    /// WebSocket connections opened
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    /// WebSocket connections closed
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// WebSocket connection lifetime
    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 14400.0]
    ).unwrap();

    /// Client messages received by type
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total WebSocket messages received from clients",
        &["type"]
    ).unwrap();

    // ============================================================================
    // Resolution Metrics
    // ============================================================================

    /// Preference resolutions by outcome
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_resolutions_total", METRIC_PREFIX),
        "Preference resolutions by outcome",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Deliveries attempted by channel
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Deliveries attempted by channel",
        &["channel"]
    ).unwrap();

    /// Delivery failures by channel
    pub static ref DELIVERY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Delivery failures by channel",
        &["channel"]
    ).unwrap();

    /// In-app pushes that reached a live session
    pub static ref PUSHES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_pushes_delivered_total", METRIC_PREFIX),
        "In-app pushes delivered to live sessions"
    ).unwrap();

    /// Delivery acknowledgments received from clients
    pub static ref ACKS_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_acks_received_total", METRIC_PREFIX),
        "Delivery acknowledgments received from clients"
    ).unwrap();

    // ============================================================================
    // Digest Metrics
    // ============================================================================

    /// Digest buckets opened
    pub static ref DIGEST_BUCKETS_OPENED: IntCounter = register_int_counter!(
        format!("{}_digest_buckets_opened_total", METRIC_PREFIX),
        "Digest buckets opened"
    ).unwrap();

    /// Notifications queued for a digest
    pub static ref DIGEST_QUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_digest_queued_total", METRIC_PREFIX),
        "Notifications queued for a digest"
    ).unwrap();

    /// Digests sent
    pub static ref DIGEST_FLUSHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_digest_flushed_total", METRIC_PREFIX),
        "Digest emails handed to the outbound sender"
    ).unwrap();

    /// Digest sends that failed
    pub static ref DIGEST_FLUSH_FAILURES: IntCounter = register_int_counter!(
        format!("{}_digest_flush_failures_total", METRIC_PREFIX),
        "Digest emails the outbound sender rejected"
    ).unwrap();

    /// Buckets currently waiting
    pub static ref DIGEST_PENDING_BUCKETS: IntGauge = register_int_gauge!(
        format!("{}_digest_pending_buckets", METRIC_PREFIX),
        "Digest buckets waiting for their fire time"
    ).unwrap();

    // ============================================================================
    // Heartbeat Metrics
    // ============================================================================

    /// Heartbeat round duration
    pub static ref HEARTBEAT_DURATION_MS: Histogram = register_histogram!(
        format!("{}_heartbeat_duration_ms", METRIC_PREFIX),
        "Heartbeat round duration in milliseconds",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    ).unwrap();

    /// Stale connections removed
    pub static ref STALE_CONNECTIONS_REMOVED: IntCounter = register_int_counter!(
        format!("{}_stale_connections_removed_total", METRIC_PREFIX),
        "Connections removed after the inactivity timeout"
    ).unwrap();
}
