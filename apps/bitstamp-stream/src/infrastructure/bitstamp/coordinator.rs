//! Stream Coordinator
//!
//! Public entry point of the client. One coordinator drives one session:
//!
//! ```text
//! Idle ──consume──▶ Connecting ──subscribed──▶ Streaming ──▶ Draining ──▶ Closed
//!                       │
//!                       └── connect or subscribe failure ──▶ Failed
//! ```
//!
//! [`StreamCoordinator::consume`] connects, subscribes to the initial
//! channels and spawns a read loop that turns every inbound frame into one
//! [`Envelope`] on a bounded channel. A full channel blocks the read loop, so
//! a slow consumer slows the socket down instead of losing envelopes.
//!
//! The stream ends after one terminal envelope: maintenance, transport
//! closure or failure, or cancellation of the token passed to `consume`.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::catalog::StaticCatalog;
use super::codec::{CodecError, FrameCodec};
use super::messages::{ERROR_EVENT, SUBSCRIPTION_SUCCEEDED_EVENT, UNSUBSCRIPTION_SUCCEEDED_EVENT};
use super::session::{ConnectionSession, SessionConfig, SessionError};
use super::websocket::WebSocketTransport;
use crate::application::ports::{ChannelCatalog, Transport};
use crate::domain::channel::Channel;
use crate::domain::streaming::{Envelope, EnvelopeError};
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::config::{DEFAULT_BUFFER_CAPACITY, DEFAULT_WS_URL, StreamSettings};
use crate::infrastructure::metrics::{self, FamilyLabel, FrameErrorKind, TerminationReason};

// =============================================================================
// Configuration
// =============================================================================

/// Coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Envelope buffer capacity. Zero is treated as 1.
    pub buffer_capacity: usize,
    /// Session timeouts.
    pub session: SessionConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            session: SessionConfig::default(),
        }
    }
}

impl From<&StreamSettings> for StreamConfig {
    fn from(settings: &StreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            buffer_capacity: settings.buffer_capacity,
            session: SessionConfig {
                connect_timeout: settings.timeouts.connect,
                write_timeout: settings.timeouts.write,
                close_grace: settings.timeouts.close_grace,
            },
        }
    }
}

// =============================================================================
// State and Errors
// =============================================================================

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not started.
    Idle,
    /// Connecting and sending the initial subscriptions.
    Connecting,
    /// Delivering envelopes.
    Streaming,
    /// Terminal condition seen, shutting the session down.
    Draining,
    /// Stream ended.
    Closed,
    /// Start-up failed.
    Failed,
}

impl StreamState {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscribe or unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// `bts:subscribe`.
    Subscribe,
    /// `bts:unsubscribe`.
    Unsubscribe,
}

impl ControlAction {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator errors.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// `consume` was already called on this coordinator.
    #[error("stream already consumed")]
    AlreadyConsuming,

    /// Operation needs a streaming session.
    #[error("stream is not active (state: {0})")]
    NotStreaming(StreamState),

    /// Session could not be opened.
    #[error("connect failed: {0}")]
    Connect(#[source] SessionError),

    /// A control batch stopped early, on a write failure or on cancellation
    /// of the caller's token. Channels in `sent` were requested and recorded;
    /// `pending` were not requested.
    #[error("{action} failed after {} of {} channels: {source}", .sent.len(), batch_len(.sent, .pending))]
    Control {
        /// Subscribe or unsubscribe.
        action: ControlAction,
        /// Channels requested before the failure.
        sent: Vec<Channel>,
        /// Channels not requested, starting with the one that failed.
        pending: Vec<Channel>,
        /// Send failure, or [`SessionError::Cancelled`].
        #[source]
        source: SessionError,
    },

    /// Control frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Caller's token was cancelled before the operation finished.
    #[error("operation cancelled")]
    Cancelled,
}

const fn batch_len(sent: &[Channel], pending: &[Channel]) -> usize {
    sent.len() + pending.len()
}

// =============================================================================
// Envelope Stream
// =============================================================================

/// Ordered envelopes of one session.
///
/// Ends after the terminal envelope. Dropping it stops the read loop and
/// closes the session.
#[derive(Debug)]
pub struct EnvelopeStream {
    inner: ReceiverStream<Envelope>,
}

impl EnvelopeStream {
    /// Wait for the next envelope. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inner.next().await
    }
}

impl Stream for EnvelopeStream {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Envelope>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Debug)]
struct Shared {
    registry: SubscriptionRegistry,
    state: RwLock<StreamState>,
    session: RwLock<Option<Arc<ConnectionSession>>>,
}

impl Shared {
    fn set_state(&self, next: StreamState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Stream state changed");
        }
        metrics::set_connected(next == StreamState::Streaming);
    }

    /// Record a control frame the server accepted.
    ///
    /// Holds the state lock across the registry update, so nothing is added
    /// once the read loop has started draining. Returns `false` in that case.
    fn apply(&self, action: ControlAction, channel: Channel) -> bool {
        let state = self.state.read();
        if !matches!(*state, StreamState::Connecting | StreamState::Streaming) {
            return false;
        }
        match action {
            ControlAction::Subscribe => self.registry.add(channel),
            ControlAction::Unsubscribe => self.registry.remove(channel),
        };
        metrics::set_subscriptions(self.registry.len());
        true
    }
}

/// Bitstamp market data stream client.
pub struct StreamCoordinator {
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    codec: FrameCodec,
    shared: Arc<Shared>,
    consumed: AtomicBool,
}

impl std::fmt::Debug for StreamCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCoordinator")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl StreamCoordinator {
    /// Create a coordinator over `transport`, resolving channels through
    /// `catalog`.
    #[must_use]
    pub fn new(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        catalog: Arc<dyn ChannelCatalog>,
    ) -> Self {
        Self {
            config,
            transport,
            codec: FrameCodec::new(catalog),
            shared: Arc::new(Shared {
                registry: SubscriptionRegistry::new(),
                state: RwLock::new(StreamState::Idle),
                session: RwLock::new(None),
            }),
            consumed: AtomicBool::new(false),
        }
    }

    /// Coordinator over a real WebSocket with the built-in catalog.
    #[must_use]
    pub fn websocket(config: StreamConfig) -> Self {
        Self::new(
            config,
            Arc::new(WebSocketTransport::new()),
            Arc::new(StaticCatalog::new()),
        )
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.shared.state.read()
    }

    /// Channels currently subscribed, sorted by wire name.
    #[must_use]
    pub fn get_subscriptions(&self) -> Vec<Channel> {
        self.shared.registry.snapshot()
    }

    /// Connect, subscribe to `channels` and start streaming.
    ///
    /// Allowed once per coordinator. Cancelling `ctx` ends the stream with a
    /// [`EnvelopeError::Cancelled`] envelope, delivered if the consumer takes
    /// it within the close grace period.
    ///
    /// # Errors
    ///
    /// - [`StreamError::AlreadyConsuming`] on a second call
    /// - [`StreamError::Connect`] if the session cannot be opened
    /// - [`StreamError::Control`] if a subscribe frame cannot be written; the
    ///   error lists which channels were and were not requested
    /// - [`StreamError::Cancelled`] if `ctx` is cancelled during start-up
    #[tracing::instrument(skip_all, fields(url = %self.config.url, channels = channels.len()))]
    pub async fn consume(
        &self,
        ctx: CancellationToken,
        channels: &[Channel],
    ) -> Result<EnvelopeStream, StreamError> {
        if self.consumed.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyConsuming);
        }

        self.shared.set_state(StreamState::Connecting);
        tracing::info!("Connecting to Bitstamp stream");

        let session = match ConnectionSession::open(
            self.transport.as_ref(),
            &self.config.url,
            ctx.clone(),
            self.config.session,
        )
        .await
        {
            Ok(session) => Arc::new(session),
            Err(SessionError::Cancelled) => {
                self.shared.set_state(StreamState::Failed);
                return Err(StreamError::Cancelled);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect");
                self.shared.set_state(StreamState::Failed);
                return Err(StreamError::Connect(e));
            }
        };

        if let Err(e) = self
            .send_batch(&session, &ctx, ControlAction::Subscribe, channels)
            .await
        {
            tracing::error!(error = %e, "Initial subscription failed");
            session.close().await;
            self.shared.set_state(StreamState::Failed);
            self.shared.registry.clear();
            metrics::set_subscriptions(0);
            return Err(if ctx.is_cancelled() {
                StreamError::Cancelled
            } else {
                e
            });
        }

        let (tx, rx) = mpsc::channel(self.config.buffer_capacity.max(1));
        *self.shared.session.write() = Some(Arc::clone(&session));
        self.shared.set_state(StreamState::Streaming);

        let read_loop = ReadLoop {
            session,
            codec: self.codec.clone(),
            shared: Arc::clone(&self.shared),
            ctx,
            tx,
            grace: self.config.session.close_grace,
        };
        tokio::spawn(read_loop.run());

        tracing::info!(
            subscriptions = self.shared.registry.len(),
            "Streaming started"
        );

        Ok(EnvelopeStream {
            inner: ReceiverStream::new(rx),
        })
    }

    /// Subscribe to more channels on the running session.
    ///
    /// Frames are written in order; every channel written is recorded before
    /// the next one is attempted. `ctx` is checked between frames, so a write
    /// already started always completes or times out.
    ///
    /// # Errors
    ///
    /// - [`StreamError::NotStreaming`] outside the streaming state, or if the
    ///   stream ends while the batch is running
    /// - [`StreamError::Control`] on a write failure, or on cancellation
    ///   after at least one frame was written, listing the channels that
    ///   were and were not requested
    /// - [`StreamError::Cancelled`] if `ctx` is cancelled before any frame is
    ///   written
    pub async fn subscribe_to_channels(
        &self,
        ctx: &CancellationToken,
        channels: &[Channel],
    ) -> Result<(), StreamError> {
        self.control(ctx, ControlAction::Subscribe, channels).await
    }

    /// Unsubscribe from channels on the running session.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe_to_channels`](Self::subscribe_to_channels).
    pub async fn unsubscribe_from_channels(
        &self,
        ctx: &CancellationToken,
        channels: &[Channel],
    ) -> Result<(), StreamError> {
        self.control(ctx, ControlAction::Unsubscribe, channels).await
    }

    async fn control(
        &self,
        ctx: &CancellationToken,
        action: ControlAction,
        channels: &[Channel],
    ) -> Result<(), StreamError> {
        let session = self.active_session()?;
        self.send_batch(&session, ctx, action, channels).await
    }

    fn active_session(&self) -> Result<Arc<ConnectionSession>, StreamError> {
        let state = self.state();
        if state != StreamState::Streaming {
            return Err(StreamError::NotStreaming(state));
        }
        self.shared
            .session
            .read()
            .clone()
            .filter(|session| !session.is_closed())
            .ok_or(StreamError::NotStreaming(state))
    }

    async fn send_batch(
        &self,
        session: &ConnectionSession,
        ctx: &CancellationToken,
        action: ControlAction,
        channels: &[Channel],
    ) -> Result<(), StreamError> {
        for (index, channel) in channels.iter().enumerate() {
            if ctx.is_cancelled() {
                if index == 0 {
                    return Err(StreamError::Cancelled);
                }
                tracing::debug!(action = %action, sent = index, "Control batch cancelled");
                return Err(StreamError::Control {
                    action,
                    sent: channels[..index].to_vec(),
                    pending: channels[index..].to_vec(),
                    source: SessionError::Cancelled,
                });
            }

            let frame = match action {
                ControlAction::Subscribe => self.codec.encode_subscribe(*channel)?,
                ControlAction::Unsubscribe => self.codec.encode_unsubscribe(*channel)?,
            };

            if let Err(source) = session.send(frame).await {
                metrics::record_control_failure(action.as_str());
                tracing::warn!(
                    action = %action,
                    channel = %channel,
                    error = %source,
                    "Control frame rejected"
                );
                return Err(StreamError::Control {
                    action,
                    sent: channels[..index].to_vec(),
                    pending: channels[index..].to_vec(),
                    source,
                });
            }

            metrics::record_control_frame(action.as_str());
            if !self.shared.apply(action, *channel) {
                return Err(StreamError::NotStreaming(self.state()));
            }
            tracing::debug!(action = %action, channel = %channel, "Control frame sent");
        }

        Ok(())
    }
}

// =============================================================================
// Read Loop
// =============================================================================

enum Exit {
    Cancelled,
    Closed,
    Transport(String),
    Maintenance,
    ConsumerGone,
}

struct ReadLoop {
    session: Arc<ConnectionSession>,
    codec: FrameCodec,
    shared: Arc<Shared>,
    ctx: CancellationToken,
    tx: mpsc::Sender<Envelope>,
    grace: Duration,
}

impl ReadLoop {
    async fn run(self) {
        // Set once cancellation is observed; bounds every later publish.
        let mut deadline = None;

        let exit = loop {
            let raw = tokio::select! {
                biased;
                () = self.tx.closed() => break Exit::ConsumerGone,
                received = self.session.receive() => match received {
                    Ok(raw) => raw,
                    Err(SessionError::Cancelled) => break Exit::Cancelled,
                    Err(SessionError::Closed) => break Exit::Closed,
                    Err(e) => break Exit::Transport(e.to_string()),
                },
            };

            let envelope = self.codec.envelope(raw);
            record_envelope(&envelope);

            let maintenance = envelope.is_maintenance();
            if maintenance {
                tracing::warn!("Server requested reconnect for maintenance");
            }

            if !self.publish(envelope, &mut deadline).await {
                break if self.ctx.is_cancelled() {
                    Exit::Cancelled
                } else {
                    Exit::ConsumerGone
                };
            }
            if maintenance {
                break Exit::Maintenance;
            }
        };

        self.shared.set_state(StreamState::Draining);
        self.session.close().await;

        let (reason, last) = match exit {
            Exit::Cancelled => (TerminationReason::Cancelled, Some(EnvelopeError::Cancelled)),
            Exit::Closed => (
                TerminationReason::TransportClosed,
                Some(EnvelopeError::TransportClosed),
            ),
            Exit::Transport(message) => (
                TerminationReason::TransportError,
                Some(EnvelopeError::Transport(message)),
            ),
            Exit::Maintenance => (TerminationReason::Maintenance, None),
            Exit::ConsumerGone => (TerminationReason::ConsumerGone, None),
        };

        if let Some(error) = last {
            tracing::info!(reason = %error, "Stream ending");
            if !self.publish(Envelope::terminal(error), &mut deadline).await {
                tracing::debug!("Final envelope not delivered");
            }
        }

        metrics::record_termination(reason);
        self.shared.registry.clear();
        metrics::set_subscriptions(0);
        self.shared.set_state(StreamState::Closed);
        tracing::info!("Stream closed");
    }

    /// Hand one envelope to the consumer, waiting for buffer space.
    ///
    /// After cancellation the wait is bounded by the close grace period.
    /// Returns `false` if the envelope was not delivered.
    async fn publish(&self, envelope: Envelope, deadline: &mut Option<Instant>) -> bool {
        let started = Instant::now();

        if deadline.is_none() {
            tokio::select! {
                biased;
                permit = self.tx.reserve() => {
                    metrics::record_publish_wait(started.elapsed());
                    return match permit {
                        Ok(permit) => {
                            permit.send(envelope);
                            true
                        }
                        Err(_) => false,
                    };
                }
                () = self.ctx.cancelled() => {
                    *deadline = Some(Instant::now() + self.grace);
                }
            }
        }

        let Some(at) = *deadline else {
            return false;
        };
        match tokio::time::timeout_at(at, self.tx.reserve()).await {
            Ok(Ok(permit)) => {
                permit.send(envelope);
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }
}

fn record_envelope(envelope: &Envelope) {
    metrics::record_frame_received(FamilyLabel::from(envelope.channel.map(|c| c.family())));

    match &envelope.error {
        Some(EnvelopeError::MalformedFrame(message)) => {
            metrics::record_frame_error(FrameErrorKind::Malformed);
            tracing::warn!(error = %message, raw = %envelope.raw, "Malformed frame");
        }
        Some(EnvelopeError::PayloadDecode { family, message }) => {
            metrics::record_frame_error(FrameErrorKind::PayloadDecode);
            tracing::warn!(
                family = family.as_str(),
                channel = %envelope.channel_name,
                error = %message,
                "Payload decode failed"
            );
        }
        Some(_) => {}
        None => match envelope.event.as_str() {
            SUBSCRIPTION_SUCCEEDED_EVENT => {
                tracing::debug!(channel = %envelope.channel_name, "Subscription confirmed");
            }
            UNSUBSCRIPTION_SUCCEEDED_EVENT => {
                tracing::debug!(channel = %envelope.channel_name, "Unsubscription confirmed");
            }
            ERROR_EVENT => {
                metrics::record_frame_error(FrameErrorKind::ServerError);
                match FrameCodec::server_error(envelope) {
                    Some(error) => tracing::warn!(
                        channel = %envelope.channel_name,
                        code = ?error.code,
                        message = %error.message,
                        "Server rejected request"
                    ),
                    None => tracing::warn!(raw = %envelope.raw, "Server error"),
                }
            }
            _ => tracing::trace!(
                channel = %envelope.channel_name,
                event = %envelope.event,
                "Envelope received"
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockTransport, TransportError};
    use crate::domain::channel::Pair;
    use crate::infrastructure::memory::MemoryTransport;

    fn config() -> StreamConfig {
        StreamConfig {
            url: "memory://bitstamp".to_string(),
            buffer_capacity: 8,
            session: SessionConfig {
                connect_timeout: Duration::from_millis(200),
                write_timeout: Duration::from_millis(200),
                close_grace: Duration::from_millis(200),
            },
        }
    }

    fn coordinator(transport: Arc<dyn Transport>) -> StreamCoordinator {
        StreamCoordinator::new(config(), transport, Arc::new(StaticCatalog::new()))
    }

    #[test]
    fn config_from_settings() {
        let settings = StreamSettings {
            buffer_capacity: 4,
            ..StreamSettings::default()
        };
        let config = StreamConfig::from(&settings);
        assert_eq!(config.url, "wss://ws.bitstamp.net");
        assert_eq!(config.buffer_capacity, 4);
        assert_eq!(config.session.close_grace, Duration::from_secs(2));
    }

    #[test]
    fn control_error_reports_progress() {
        let err = StreamError::Control {
            action: ControlAction::Subscribe,
            sent: vec![Channel::live_trades(Pair::BTC_EUR)],
            pending: vec![
                Channel::live_trades(Pair::BTC_USD),
                Channel::live_trades(Pair::ETH_EUR),
            ],
            source: SessionError::Send("write rejected".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "subscribe failed after 1 of 3 channels: send failed: write rejected"
        );
    }

    #[tokio::test]
    async fn connect_failure_moves_to_failed() {
        let mut transport = MockTransport::new();
        transport
            .expect_connect()
            .times(1)
            .returning(|_| Err(TransportError::Connect("refused".to_string())));

        let coordinator = coordinator(Arc::new(transport));
        let err = coordinator
            .consume(CancellationToken::new(), &[Channel::live_trades(Pair::BTC_EUR)])
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::Connect(_)));
        assert_eq!(coordinator.state(), StreamState::Failed);
        assert!(coordinator.get_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let (transport, _peer) = MemoryTransport::pair();
        let coordinator = coordinator(Arc::new(transport));

        let _stream = coordinator
            .consume(CancellationToken::new(), &[])
            .await
            .unwrap();
        assert!(matches!(
            coordinator.consume(CancellationToken::new(), &[]).await,
            Err(StreamError::AlreadyConsuming)
        ));
    }

    #[tokio::test]
    async fn control_before_consume_is_rejected() {
        let (transport, _peer) = MemoryTransport::pair();
        let coordinator = coordinator(Arc::new(transport));

        let err = coordinator
            .subscribe_to_channels(&CancellationToken::new(), &[Channel::order_book(Pair::BTC_USD)])
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::NotStreaming(StreamState::Idle)));
    }

    #[tokio::test]
    async fn cancelled_control_call_returns_cancelled() {
        let (transport, _peer) = MemoryTransport::pair();
        let coordinator = coordinator(Arc::new(transport));
        let _stream = coordinator
            .consume(CancellationToken::new(), &[])
            .await
            .unwrap();

        let ctx = CancellationToken::new();
        ctx.cancel();
        let err = coordinator
            .subscribe_to_channels(&ctx, &[Channel::order_book(Pair::BTC_USD)])
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::Cancelled));
        assert!(coordinator.get_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn stream_waits_for_frames() {
        let (transport, peer) = MemoryTransport::pair();
        let coordinator = coordinator(Arc::new(transport));
        let mut stream = coordinator
            .consume(CancellationToken::new(), &[Channel::live_trades(Pair::BTC_EUR)])
            .await
            .unwrap();

        {
            let mut pending = tokio_test::task::spawn(stream.recv());
            tokio_test::assert_pending!(pending.poll());
        }

        peer.push(r#"{"event":"bts:subscription_succeeded","channel":"live_trades_btceur","data":{}}"#);
        let envelope = stream.recv().await.unwrap();
        assert_eq!(envelope.event, "bts:subscription_succeeded");
        assert_eq!(coordinator.get_subscriptions(), vec![Channel::live_trades(Pair::BTC_EUR)]);
    }

    fn shared(state: StreamState) -> Shared {
        Shared {
            registry: SubscriptionRegistry::new(),
            state: RwLock::new(state),
            session: RwLock::new(None),
        }
    }

    fn gauge_value(rendered: &str, name: &str) -> Option<f64> {
        rendered.lines().find_map(|line| {
            line.strip_prefix(name)?
                .strip_prefix(' ')?
                .trim()
                .parse()
                .ok()
        })
    }

    #[test]
    fn every_applied_frame_updates_subscription_gauge() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let shared = shared(StreamState::Streaming);

        ::metrics::with_local_recorder(&recorder, || {
            assert!(shared.apply(ControlAction::Subscribe, Channel::live_trades(Pair::BTC_EUR)));
            assert!(shared.apply(ControlAction::Subscribe, Channel::order_book(Pair::ETH_USD)));
        });
        assert_eq!(
            gauge_value(&handle.render(), "bitstamp_stream_subscriptions"),
            Some(2.0)
        );

        ::metrics::with_local_recorder(&recorder, || {
            assert!(shared.apply(ControlAction::Unsubscribe, Channel::live_trades(Pair::BTC_EUR)));
        });
        assert_eq!(
            gauge_value(&handle.render(), "bitstamp_stream_subscriptions"),
            Some(1.0)
        );
    }

    #[test]
    fn frames_applied_after_drain_are_not_recorded() {
        let shared = shared(StreamState::Streaming);
        assert!(shared.apply(ControlAction::Subscribe, Channel::live_trades(Pair::BTC_EUR)));

        shared.set_state(StreamState::Draining);
        assert!(!shared.apply(ControlAction::Subscribe, Channel::order_book(Pair::BTC_USD)));

        shared.registry.clear();
        shared.set_state(StreamState::Closed);
        assert!(!shared.apply(ControlAction::Subscribe, Channel::order_book(Pair::BTC_USD)));
        assert!(shared.registry.is_empty());
    }

    #[test]
    fn state_labels() {
        assert_eq!(StreamState::Streaming.to_string(), "streaming");
        assert_eq!(ControlAction::Unsubscribe.to_string(), "unsubscribe");
    }
}
