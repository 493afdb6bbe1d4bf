//! Stream Coordinator Integration Tests
//!
//! Drives the coordinator end to end over the in-memory transport: frame
//! ordering, decode failures, terminal conditions and backpressure.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use bitstamp_stream::application::ports::TransportError;
use bitstamp_stream::domain::streaming::Payload;
use bitstamp_stream::{Channel, EnvelopeError, Pair, StreamError, StreamState};

use common::{RECONNECT_FRAME, WAIT, next, setup, subscribe_frame, trade_frame, wait_for_state};

fn btceur() -> Channel {
    Channel::live_trades(Pair::BTC_EUR)
}

#[tokio::test]
async fn consume_subscribes_then_streams_in_order() {
    let (coordinator, peer) = setup(16);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    assert_eq!(coordinator.state(), StreamState::Streaming);
    assert_eq!(peer.connected_url().as_deref(), Some(common::URL));
    assert_eq!(peer.written().await, vec![subscribe_frame("live_trades_btceur")]);

    let frames = [
        r#"{"event":"bts:subscription_succeeded","channel":"live_trades_btceur","data":{}}"#
            .to_string(),
        trade_frame("live_trades_btceur", 1),
        trade_frame("live_trades_btceur", 2),
        trade_frame("live_trades_btceur", 3),
    ];
    for frame in &frames {
        assert!(peer.push(frame.clone()));
    }

    for frame in &frames {
        let envelope = next(&mut stream).await.unwrap();
        assert_eq!(&envelope.raw, frame);
        assert_eq!(envelope.channel, Some(btceur()));
        assert!(envelope.error.is_none());
    }
}

#[tokio::test]
async fn every_frame_yields_one_envelope() {
    let (coordinator, peer) = setup(16);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    let malformed = "{not json";
    let bad_payload = r#"{"event":"trade","channel":"live_trades_btceur","data":{"id":"x"}}"#;
    let unknown = r#"{"event":"trade","channel":"live_trades_dogeeur","data":{"id":1}}"#;
    let good = trade_frame("live_trades_btceur", 9);

    peer.push(malformed);
    peer.push(bad_payload);
    peer.push(unknown);
    peer.push(good.clone());

    let first = next(&mut stream).await.unwrap();
    assert_eq!(first.raw, malformed);
    assert!(matches!(first.error, Some(EnvelopeError::MalformedFrame(_))));
    assert!(!first.is_terminal());

    let second = next(&mut stream).await.unwrap();
    assert_eq!(second.raw, bad_payload);
    assert!(matches!(second.error, Some(EnvelopeError::PayloadDecode { .. })));
    assert!(second.payload.is_none());

    let third = next(&mut stream).await.unwrap();
    assert_eq!(third.channel, None);
    assert_eq!(third.channel_name, "live_trades_dogeeur");
    assert!(matches!(third.payload, Some(Payload::Event(_))));

    let fourth = next(&mut stream).await.unwrap();
    assert_eq!(fourth.raw, good);
    match fourth.payload {
        Some(Payload::Ticker(ticker)) => assert_eq!(ticker.id, 9),
        other => panic!("expected Ticker payload, got {other:?}"),
    }

    assert_eq!(coordinator.state(), StreamState::Streaming);
}

#[tokio::test]
async fn maintenance_ends_the_stream() {
    let (coordinator, peer) = setup(16);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    peer.push(trade_frame("live_trades_btceur", 1));
    peer.push(RECONNECT_FRAME);
    peer.push(trade_frame("live_trades_btceur", 2));

    let trade = next(&mut stream).await.unwrap();
    assert!(trade.error.is_none());

    let maintenance = next(&mut stream).await.unwrap();
    assert!(maintenance.is_maintenance());
    assert!(maintenance.is_terminal());
    assert_eq!(maintenance.raw, RECONNECT_FRAME);

    assert!(next(&mut stream).await.is_none());
    wait_for_state(&coordinator, StreamState::Closed).await;
    assert!(peer.client_closed());
    assert!(coordinator.get_subscriptions().is_empty());
}

#[tokio::test]
async fn cancellation_closes_stream_and_rejects_sends() {
    let (coordinator, peer) = setup(16);
    let ctx = CancellationToken::new();
    let mut stream = coordinator.consume(ctx.clone(), &[btceur()]).await.unwrap();

    ctx.cancel();

    let last = next(&mut stream).await.unwrap();
    assert_eq!(last.error, Some(EnvelopeError::Cancelled));
    assert!(next(&mut stream).await.is_none());

    assert_eq!(coordinator.state(), StreamState::Closed);
    assert!(peer.client_closed());

    let err = coordinator
        .subscribe_to_channels(&CancellationToken::new(), &[Channel::order_book(Pair::BTC_USD)])
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::NotStreaming(StreamState::Closed)));
}

#[tokio::test]
async fn cancellation_with_idle_consumer_finishes_within_grace() {
    let (coordinator, peer) = setup(1);
    let ctx = CancellationToken::new();
    let mut stream = coordinator.consume(ctx.clone(), &[btceur()]).await.unwrap();

    for id in 0..4 {
        peer.push(trade_frame("live_trades_btceur", id));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    ctx.cancel();
    tokio::time::timeout(WAIT, wait_for_state(&coordinator, StreamState::Closed))
        .await
        .unwrap();

    let drained: Vec<_> = stream.by_ref().collect().await;
    assert!(!drained.is_empty());
    assert!(drained.iter().rev().skip(1).all(|e| !e.is_terminal()));
}

#[tokio::test]
async fn peer_hang_up_reports_transport_closed() {
    let (coordinator, peer) = setup(16);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    peer.push(trade_frame("live_trades_btceur", 1));
    peer.hang_up();

    assert!(next(&mut stream).await.unwrap().error.is_none());
    let last = next(&mut stream).await.unwrap();
    assert_eq!(last.error, Some(EnvelopeError::TransportClosed));
    assert!(next(&mut stream).await.is_none());
    wait_for_state(&coordinator, StreamState::Closed).await;
}

#[tokio::test]
async fn read_failure_reports_transport_error() {
    let (coordinator, peer) = setup(16);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    peer.fail(TransportError::Io("connection reset".to_string()));

    let last = next(&mut stream).await.unwrap();
    assert!(matches!(
        last.error,
        Some(EnvelopeError::Transport(ref msg)) if msg.contains("connection reset")
    ));
    assert!(last.is_terminal());
    assert!(next(&mut stream).await.is_none());
}

#[tokio::test]
async fn slow_consumer_loses_nothing() {
    let (coordinator, peer) = setup(1);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    for id in 0..50 {
        peer.push(trade_frame("live_trades_btceur", id));
    }

    for expected in 0..50 {
        tokio::time::sleep(Duration::from_millis(1)).await;
        match next(&mut stream).await.unwrap().payload {
            Some(Payload::Ticker(ticker)) => assert_eq!(ticker.id, expected),
            other => panic!("expected Ticker payload, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn dropping_the_stream_closes_the_session() {
    let (coordinator, peer) = setup(4);
    let stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    drop(stream);

    wait_for_state(&coordinator, StreamState::Closed).await;
    assert!(peer.client_closed());
}

#[tokio::test]
async fn refused_connection_fails_consume() {
    let (coordinator, peer) = setup(4);
    peer.refuse_connect();

    let err = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::Connect(_)));
    assert_eq!(coordinator.state(), StreamState::Failed);
}

#[tokio::test]
async fn second_consume_is_rejected() {
    let (coordinator, _peer) = setup(4);
    let _stream = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap();

    let err = coordinator
        .consume(CancellationToken::new(), &[btceur()])
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::AlreadyConsuming));
    assert_eq!(coordinator.state(), StreamState::Streaming);
}

#[tokio::test]
async fn frame_for_first_channel_arrives_before_second() {
    let (coordinator, peer) = setup(8);
    let eth = Channel::live_trades(Pair::ETH_EUR);
    let mut stream = coordinator
        .consume(CancellationToken::new(), &[btceur(), eth])
        .await
        .unwrap();
    assert_eq!(coordinator.get_subscriptions(), vec![btceur(), eth]);

    peer.push(trade_frame("live_trades_btceur", 1));
    peer.push(trade_frame("live_trades_etheur", 2));

    let first = next(&mut stream).await.unwrap();
    assert_eq!(first.channel, Some(btceur()));
    assert!(matches!(first.payload, Some(Payload::Ticker(_))));

    let second = next(&mut stream).await.unwrap();
    assert_eq!(second.channel, Some(eth));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn envelope_order_holds_under_concurrent_control_calls() {
    const FRAMES: u64 = 300;

    let (coordinator, peer) = setup(2);
    let coordinator = Arc::new(coordinator);
    let ctx = CancellationToken::new();
    let mut stream = coordinator.consume(ctx.clone(), &[btceur()]).await.unwrap();

    let producer = tokio::spawn({
        let peer = Arc::clone(&peer);
        async move {
            for id in 0..FRAMES {
                assert!(peer.push(trade_frame("live_trades_btceur", id)));
                tokio::task::yield_now().await;
            }
        }
    });

    let book = Channel::order_book(Pair::ETH_USD);
    let churn: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    coordinator.subscribe_to_channels(&ctx, &[book]).await.unwrap();
                    coordinator.unsubscribe_from_channels(&ctx, &[book]).await.unwrap();
                }
            })
        })
        .collect();

    for expected in 0..FRAMES {
        match next(&mut stream).await.unwrap().payload {
            Some(Payload::Ticker(ticker)) => assert_eq!(ticker.id, expected),
            other => panic!("expected Ticker payload, got {other:?}"),
        }
    }

    producer.await.unwrap();
    for task in churn {
        task.await.unwrap();
    }
    assert_eq!(coordinator.get_subscriptions(), vec![btceur()]);
    assert_eq!(coordinator.state(), StreamState::Streaming);
}
