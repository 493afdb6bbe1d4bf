//! In-Memory Transport
//!
//! A [`Transport`] backed by tokio channels. The [`MemoryPeer`] plays the
//! server side: it pushes frames to the client, reads the frames the client
//! wrote, and can inject connect, write and read failures.
//!
//! Drives the stream client without a network, in unit and integration
//! tests.
//!
//! ```rust
//! use bitstamp_stream::infrastructure::memory::MemoryTransport;
//!
//! let (transport, peer) = MemoryTransport::pair();
//! peer.push(r#"{"event":"bts:request_reconnect","channel":"","data":""}"#);
//! # drop(transport);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::application::ports::{
    Connection, FrameSink, FrameSource, Transport, TransportError,
};

type Inbound = Result<String, TransportError>;

#[derive(Debug)]
struct Controls {
    refuse_connect: AtomicBool,
    send_budget: AtomicUsize,
    write_delay: Mutex<Duration>,
    sink_closed: AtomicBool,
    connected_to: Mutex<Option<String>>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            refuse_connect: AtomicBool::new(false),
            send_budget: AtomicUsize::new(usize::MAX),
            write_delay: Mutex::new(Duration::ZERO),
            sink_closed: AtomicBool::new(false),
            connected_to: Mutex::new(None),
        }
    }
}

struct Halves {
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

// =============================================================================
// Transport
// =============================================================================

/// Client side of an in-memory connection. Connects once.
pub struct MemoryTransport {
    halves: Mutex<Option<Halves>>,
    controls: Arc<Controls>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("controls", &self.controls)
            .finish_non_exhaustive()
    }
}

impl MemoryTransport {
    /// Create a transport and the peer that serves it.
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let controls = Arc::new(Controls::default());

        let transport = Self {
            halves: Mutex::new(Some(Halves {
                inbound_rx,
                outbound_tx,
            })),
            controls: Arc::clone(&controls),
        };

        let peer = MemoryPeer {
            inbound_tx: Mutex::new(Some(inbound_tx)),
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            controls,
        };

        (transport, peer)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        if self.controls.refuse_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!("{url}: connection refused")));
        }

        let halves = self
            .halves
            .lock()
            .take()
            .ok_or_else(|| TransportError::Connect(format!("{url}: already connected")))?;

        *self.controls.connected_to.lock() = Some(url.to_string());

        Ok(Connection {
            sink: Box::new(MemorySink {
                outbound_tx: halves.outbound_tx,
                controls: Arc::clone(&self.controls),
            }),
            source: Box::new(MemorySource {
                inbound_rx: halves.inbound_rx,
            }),
        })
    }
}

struct MemorySink {
    outbound_tx: mpsc::UnboundedSender<String>,
    controls: Arc<Controls>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.controls.sink_closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let delay = *self.controls.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let allowed = self
            .controls
            .send_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| {
                budget.checked_sub(1)
            })
            .is_ok();
        if !allowed {
            return Err(TransportError::Io("write rejected".to_string()));
        }

        self.outbound_tx
            .send(text)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.controls.sink_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemorySource {
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn receive_text(&mut self) -> Result<Option<String>, TransportError> {
        match self.inbound_rx.recv().await {
            Some(Ok(text)) => Ok(Some(text)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Peer
// =============================================================================

/// Server side of an in-memory connection.
pub struct MemoryPeer {
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    controls: Arc<Controls>,
}

impl std::fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPeer")
            .field("controls", &self.controls)
            .finish_non_exhaustive()
    }
}

impl MemoryPeer {
    /// Deliver a text frame to the client. Returns `false` once the
    /// connection has been closed by either side.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(text.into())).is_ok())
    }

    /// Make the client's next read fail with `err`.
    pub fn fail(&self, err: TransportError) -> bool {
        self.inbound_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(Err(err)).is_ok())
    }

    /// Close the server side. The client reads end-of-stream after any
    /// frames already pushed.
    pub fn hang_up(&self) {
        self.inbound_tx.lock().take();
    }

    /// Refuse the next connect attempt.
    pub fn refuse_connect(&self) {
        self.controls.refuse_connect.store(true, Ordering::SeqCst);
    }

    /// Accept `count` more writes, then reject every write after that.
    pub fn reject_writes_after(&self, count: usize) {
        self.controls.send_budget.store(count, Ordering::SeqCst);
    }

    /// Accept writes again.
    pub fn accept_writes(&self) {
        self.controls.send_budget.store(usize::MAX, Ordering::SeqCst);
    }

    /// Hold every following write for `delay` before accepting it.
    pub fn delay_writes(&self, delay: Duration) {
        *self.controls.write_delay.lock() = delay;
    }

    /// Check if the client closed its write half.
    #[must_use]
    pub fn client_closed(&self) -> bool {
        self.controls.sink_closed.load(Ordering::SeqCst)
    }

    /// URL the client connected to.
    #[must_use]
    pub fn connected_url(&self) -> Option<String> {
        self.controls.connected_to.lock().clone()
    }

    /// Wait for the next frame the client wrote.
    pub async fn next_written(&self) -> Option<String> {
        self.outbound_rx.lock().await.recv().await
    }

    /// Drain every frame the client has written so far.
    pub async fn written(&self) -> Vec<String> {
        let mut rx = self.outbound_rx.lock().await;
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}
