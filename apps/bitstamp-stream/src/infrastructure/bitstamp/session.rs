//! Connection Session
//!
//! Owns one live connection for its whole lifetime. Writes are serialized
//! through the write half; a single reader pulls frames from the read half.
//! Both halves stop as soon as the caller's token is cancelled or the session
//! is closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FrameSink, FrameSource, Transport, TransportError};

/// Session timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on establishing the connection.
    pub connect_timeout: Duration,
    /// Upper bound on a single frame write.
    pub write_timeout: Duration,
    /// Upper bound on the closing handshake.
    pub close_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            close_grace: Duration::from_secs(2),
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A frame could not be written.
    #[error("send failed: {0}")]
    Send(String),

    /// Caller's token was cancelled.
    #[error("session cancelled")]
    Cancelled,

    /// Session was closed, locally or by the peer.
    #[error("session closed")]
    Closed,

    /// Read failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// One live connection.
pub struct ConnectionSession {
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    source: Mutex<Box<dyn FrameSource>>,
    ctx: CancellationToken,
    shutdown: CancellationToken,
    closed: AtomicBool,
    config: SessionConfig,
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("closed", &self.is_closed())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConnectionSession {
    /// Connect to `url`.
    ///
    /// The session is bound to `ctx`: cancelling it stops every pending and
    /// future read and write.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connect`] if the transport fails or the connect
    /// timeout elapses, and [`SessionError::Cancelled`] if `ctx` is cancelled
    /// first.
    pub async fn open(
        transport: &dyn Transport,
        url: &str,
        ctx: CancellationToken,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        tracing::debug!(url = %url, "Opening connection");

        let connect =
            tokio::time::timeout(config.connect_timeout, async { transport.connect(url).await });
        let connection = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(SessionError::Cancelled),
            result = connect => match result {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => return Err(SessionError::Connect(e.to_string())),
                Err(_) => {
                    return Err(SessionError::Connect(format!(
                        "timed out after {:?}",
                        config.connect_timeout
                    )));
                }
            },
        };

        tracing::info!(url = %url, "Connected");

        let shutdown = ctx.child_token();
        Ok(Self {
            sink: Mutex::new(Some(connection.sink)),
            source: Mutex::new(connection.source),
            ctx,
            shutdown,
            closed: AtomicBool::new(false),
            config,
        })
    }

    /// Write one text frame.
    ///
    /// Concurrent callers are serialized; each write is bounded by the write
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] if the session is closed or cancelled,
    /// the transport rejects the frame, or the write times out.
    pub async fn send(&self, text: String) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Send("session closed".to_string()));
        }

        let write = async {
            let mut guard = self.sink.lock().await;
            let Some(sink) = guard.as_mut() else {
                return Err(SessionError::Send("session closed".to_string()));
            };
            match tokio::time::timeout(self.config.write_timeout, sink.send_text(text)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(SessionError::Send(e.to_string())),
                Err(_) => Err(SessionError::Send(format!(
                    "write timed out after {:?}",
                    self.config.write_timeout
                ))),
            }
        };

        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(SessionError::Send("session closed".to_string())),
            result = write => result,
        }
    }

    /// Wait for the next inbound text frame.
    ///
    /// Meant for a single reader; a second caller waits for the first.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Cancelled`] once the caller's token is cancelled
    /// - [`SessionError::Closed`] after [`close`](Self::close) or when the
    ///   peer ends the connection
    /// - [`SessionError::Transport`] on a read failure
    pub async fn receive(&self) -> Result<String, SessionError> {
        let mut source = self.source.lock().await;

        tokio::select! {
            biased;
            () = self.ctx.cancelled() => Err(SessionError::Cancelled),
            () = self.shutdown.cancelled() => Err(SessionError::Closed),
            frame = source.receive_text() => match frame {
                Ok(Some(text)) => Ok(text),
                Ok(None) | Err(TransportError::Closed) => Err(SessionError::Closed),
                Err(e) => Err(SessionError::Transport(e.to_string())),
            },
        }
    }

    /// Close the connection. Idempotent.
    ///
    /// Pending reads and writes return immediately; the closing handshake is
    /// bounded by the close grace period.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();

        let sink = self.sink.lock().await.take();
        let Some(mut sink) = sink else { return };

        match tokio::time::timeout(self.config.close_grace, sink.close()).await {
            Ok(Ok(())) => tracing::debug!("Connection closed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Close handshake failed"),
            Err(_) => tracing::debug!(
                grace = ?self.config.close_grace,
                "Close handshake timed out"
            ),
        }
    }

    /// Check if the session no longer accepts writes.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.shutdown.is_cancelled()
    }
}
