//! WebSocket Transport Integration Tests
//!
//! Runs the coordinator against a local tungstenite server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use bitstamp_stream::domain::streaming::Payload;
use bitstamp_stream::{Channel, Pair, StreamConfig, StreamCoordinator, StreamState};

use common::{RECONNECT_FRAME, next, subscribe_frame, trade_frame, wait_for_state};

#[tokio::test]
async fn streams_from_a_websocket_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();

        let request = loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                break text.as_str().to_owned();
            }
        };

        ws.send(Message::Ping(vec![1, 2, 3].into())).await.unwrap();
        ws.send(Message::Text(
            r#"{"event":"bts:subscription_succeeded","channel":"live_trades_btcusd","data":{}}"#
                .into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(trade_frame("live_trades_btcusd", 42).into()))
            .await
            .unwrap();
        ws.send(Message::Text(RECONNECT_FRAME.into())).await.unwrap();

        // Drain until the client closes.
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
        request
    });

    let coordinator = StreamCoordinator::websocket(StreamConfig {
        url: format!("ws://{addr}"),
        ..common::config(8)
    });
    let channel = Channel::live_trades(Pair::BTC_USD);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[channel])
        .await
        .unwrap();

    let ack = next(&mut stream).await.unwrap();
    assert_eq!(ack.event, "bts:subscription_succeeded");
    assert_eq!(ack.channel, Some(channel));

    let trade = next(&mut stream).await.unwrap();
    match trade.payload {
        Some(Payload::Ticker(ticker)) => assert_eq!(ticker.id, 42),
        other => panic!("expected Ticker payload, got {other:?}"),
    }

    assert!(next(&mut stream).await.unwrap().is_maintenance());
    assert!(next(&mut stream).await.is_none());
    wait_for_state(&coordinator, StreamState::Closed).await;

    assert_eq!(server.await.unwrap(), subscribe_frame("live_trades_btcusd"));
}
