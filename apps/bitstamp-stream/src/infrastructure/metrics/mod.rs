//! Prometheus Metrics Module
//!
//! Exposes stream client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: inbound frames by channel family, decode failures by kind
//! - **Control**: subscribe/unsubscribe frames written and failed
//! - **Subscriptions**: active subscription count
//! - **Streams**: connection state and stream terminations by reason
//! - **Latency**: time spent waiting for the consumer to accept an envelope
//!
//! # Integration
//!
//! Recording functions are no-ops until [`init_metrics`] installs the
//! exporter, which serves `/metrics` on its own listener.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::channel::ChannelFamily;

// =============================================================================
// Exporter
// =============================================================================

static EXPORTER_ADDR: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus exporter on `0.0.0.0:port`.
///
/// Port `0` leaves metrics disabled. Calling again after a successful install
/// returns the address already in use.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a recorder is already
/// installed.
pub fn init_metrics(port: u16) -> Result<Option<SocketAddr>, BuildError> {
    if port == 0 {
        return Ok(None);
    }
    if let Some(addr) = EXPORTER_ADDR.get() {
        return Ok(Some(*addr));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(Some(*EXPORTER_ADDR.get_or_init(|| addr)))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frame counters
    describe_counter!(
        "bitstamp_stream_frames_received_total",
        "Total inbound frames by channel family"
    );
    describe_counter!(
        "bitstamp_stream_frame_errors_total",
        "Total inbound frames that failed to decode or carried a server error"
    );

    // Control frames
    describe_counter!(
        "bitstamp_stream_control_frames_total",
        "Total subscribe/unsubscribe frames written"
    );
    describe_counter!(
        "bitstamp_stream_control_failures_total",
        "Total subscribe/unsubscribe frames the transport rejected"
    );

    // Gauges
    describe_gauge!(
        "bitstamp_stream_subscriptions",
        "Number of active channel subscriptions"
    );
    describe_gauge!(
        "bitstamp_stream_connected",
        "1 while a session is streaming, 0 otherwise"
    );

    describe_counter!(
        "bitstamp_stream_terminations_total",
        "Total streams ended, by reason"
    );

    describe_histogram!(
        "bitstamp_stream_publish_wait_seconds",
        "Time an envelope waited for buffer space"
    );
}

// =============================================================================
// Labels
// =============================================================================

/// Family label of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyLabel {
    /// Frame on a catalog channel.
    Family(ChannelFamily),
    /// Frame without a catalog channel (server events, unknown names).
    Uncatalogued,
}

impl FamilyLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Family(family) => family.as_str(),
            Self::Uncatalogued => "none",
        }
    }
}

impl From<Option<ChannelFamily>> for FamilyLabel {
    fn from(family: Option<ChannelFamily>) -> Self {
        family.map_or(Self::Uncatalogued, Self::Family)
    }
}

/// Kind of decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErrorKind {
    /// Outer envelope unparseable.
    Malformed,
    /// Payload did not match the family shape.
    PayloadDecode,
    /// Server answered with `bts:error`.
    ServerError,
}

impl FrameErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::PayloadDecode => "payload_decode",
            Self::ServerError => "server_error",
        }
    }
}

/// Why a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Context cancelled.
    Cancelled,
    /// Server reconnect request.
    Maintenance,
    /// Peer closed the connection.
    TransportClosed,
    /// Read failure.
    TransportError,
    /// Consumer dropped the stream.
    ConsumerGone,
}

impl TerminationReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Maintenance => "maintenance",
            Self::TransportClosed => "transport_closed",
            Self::TransportError => "transport_error",
            Self::ConsumerGone => "consumer_gone",
        }
    }
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an inbound frame.
pub fn record_frame_received(family: FamilyLabel) {
    counter!(
        "bitstamp_stream_frames_received_total",
        "family" => family.as_str()
    )
    .increment(1);
}

/// Record a frame that failed to decode.
pub fn record_frame_error(kind: FrameErrorKind) {
    counter!(
        "bitstamp_stream_frame_errors_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a control frame written. `action` is `subscribe` or `unsubscribe`.
pub fn record_control_frame(action: &'static str) {
    counter!(
        "bitstamp_stream_control_frames_total",
        "action" => action
    )
    .increment(1);
}

/// Record a control frame the transport rejected.
pub fn record_control_failure(action: &'static str) {
    counter!(
        "bitstamp_stream_control_failures_total",
        "action" => action
    )
    .increment(1);
}

/// Update the active subscription count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(count: usize) {
    gauge!("bitstamp_stream_subscriptions").set(count as f64);
}

/// Update the connection state.
pub fn set_connected(connected: bool) {
    gauge!("bitstamp_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record the end of a stream.
pub fn record_termination(reason: TerminationReason) {
    counter!(
        "bitstamp_stream_terminations_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record how long an envelope waited for buffer space.
pub fn record_publish_wait(duration: Duration) {
    histogram!("bitstamp_stream_publish_wait_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
