//! WebSocket Transport
//!
//! [`Transport`] over tokio-tungstenite with rustls. The socket is split so
//! writes never wait behind a pending read.
//!
//! Ping frames are answered by tungstenite as part of reading, so the read
//! half only surfaces text frames.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{
    Connection, FrameSink, FrameSource, Transport, TransportError,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production WebSocket transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        Ok(Connection {
            sink: Box::new(WebSocketSink {
                write,
                closed: false,
            }),
            source: Box::new(WebSocketSource { read }),
        })
    }
}

struct WebSocketSink {
    write: SplitSink<Socket, Message>,
    closed: bool,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.write
            .send(Message::Text(text.into()))
            .await
            .map_err(map_error)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write.close().await.map_err(map_error)
    }
}

struct WebSocketSource {
    read: SplitStream<Socket>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn receive_text(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(e) => tracing::debug!(error = %e, "Skipping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "Server sent close frame");
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return match map_error(e) {
                        TransportError::Closed => Ok(None),
                        other => Err(other),
                    };
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}

fn map_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        other => TransportError::Io(other.to_string()),
    }
}
