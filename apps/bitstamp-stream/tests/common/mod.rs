//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use bitstamp_stream::infrastructure::bitstamp::SessionConfig;
use bitstamp_stream::infrastructure::memory::{MemoryPeer, MemoryTransport};
use bitstamp_stream::{
    Envelope, EnvelopeStream, StaticCatalog, StreamConfig, StreamCoordinator, StreamState,
};

pub const URL: &str = "memory://ws.bitstamp.net";

/// Upper bound on any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(2);

pub fn config(buffer_capacity: usize) -> StreamConfig {
    StreamConfig {
        url: URL.to_string(),
        buffer_capacity,
        session: SessionConfig {
            connect_timeout: Duration::from_millis(500),
            write_timeout: Duration::from_millis(500),
            close_grace: Duration::from_millis(200),
        },
    }
}

pub fn setup(buffer_capacity: usize) -> (StreamCoordinator, Arc<MemoryPeer>) {
    let (transport, peer) = MemoryTransport::pair();
    let coordinator = StreamCoordinator::new(
        config(buffer_capacity),
        Arc::new(transport),
        Arc::new(StaticCatalog::new()),
    );
    (coordinator, Arc::new(peer))
}

pub async fn next(stream: &mut EnvelopeStream) -> Option<Envelope> {
    tokio::time::timeout(WAIT, stream.recv())
        .await
        .expect("timed out waiting for envelope")
}

pub async fn wait_for_state(coordinator: &StreamCoordinator, state: StreamState) {
    tokio::time::timeout(WAIT, async {
        while coordinator.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("state never reached {state}, stuck at {}", coordinator.state()));
}

pub fn subscribe_frame(channel: &str) -> String {
    format!(r#"{{"event":"bts:subscribe","data":{{"channel":"{channel}"}}}}"#)
}

pub fn unsubscribe_frame(channel: &str) -> String {
    format!(r#"{{"event":"bts:unsubscribe","data":{{"channel":"{channel}"}}}}"#)
}

pub fn trade_frame(channel: &str, id: u64) -> String {
    format!(
        r#"{{"event":"trade","channel":"{channel}","data":{{"id":{id},"timestamp":"1700000000","amount":0.1,"amount_str":"0.1","price":37000,"price_str":"37000","type":1,"microtimestamp":"1700000000000000","buy_order_id":1,"sell_order_id":2}}}}"#
    )
}

pub const RECONNECT_FRAME: &str = r#"{"event":"bts:request_reconnect","channel":"","data":""}"#;
