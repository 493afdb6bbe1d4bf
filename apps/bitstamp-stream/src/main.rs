//! Bitstamp Stream Binary
//!
//! Subscribes to the configured channels and logs every envelope until
//! shutdown or the end of the stream.
//!
//! # Usage
//!
//! ```bash
//! BITSTAMP_CHANNELS=live_trades_btcusd,order_book_btcusd cargo run --bin bitstamp-stream
//! ```
//!
//! # Environment Variables
//!
//! - `BITSTAMP_WS_URL`: WebSocket endpoint (default: wss://ws.bitstamp.net)
//! - `BITSTAMP_CHANNELS`: comma separated channel names (default: live_trades_btceur)
//! - `BITSTAMP_STREAM_BUFFER`: envelope buffer capacity (default: 1024)
//! - `BITSTAMP_CONNECT_TIMEOUT_SECS`: connect timeout (default: 10)
//! - `BITSTAMP_WRITE_TIMEOUT_SECS`: per-frame write timeout (default: 5)
//! - `BITSTAMP_CLOSE_GRACE_MS`: close and final delivery grace (default: 2000)
//! - `BITSTAMP_STREAM_METRICS_PORT`: Prometheus port, 0 disables (default: 0)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: bitstamp-stream)
//! - `RUST_LOG`: Log filter (default: info)

use bitstamp_stream::domain::streaming::Payload;
use bitstamp_stream::infrastructure::telemetry;
use bitstamp_stream::{
    Envelope, EnvelopeError, StreamConfig, StreamCoordinator, StreamSettings, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Bitstamp stream");

    let settings = StreamSettings::from_env()?;
    log_config(&settings);

    if let Some(addr) = init_metrics(settings.metrics_port)? {
        tracing::info!(addr = %addr, "Prometheus exporter listening");
    }

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let coordinator = StreamCoordinator::websocket(StreamConfig::from(&settings));
    let mut stream = coordinator
        .consume(shutdown_token.clone(), &settings.channels)
        .await?;

    let mut delivered: u64 = 0;
    while let Some(envelope) = stream.recv().await {
        delivered += 1;
        match &envelope.error {
            Some(EnvelopeError::Maintenance) => {
                tracing::warn!("Bitstamp requested reconnect for maintenance; exiting");
            }
            Some(err) if err.is_terminal() => {
                tracing::info!(reason = %err, "Stream ended");
            }
            Some(err) => {
                tracing::warn!(error = %err, raw = %envelope.raw, "Undecodable frame");
            }
            None => log_envelope(&envelope),
        }
    }

    tracing::info!(
        delivered,
        state = %coordinator.state(),
        "Bitstamp stream stopped"
    );
    Ok(())
}

/// Log one decoded envelope.
fn log_envelope(envelope: &Envelope) {
    match &envelope.payload {
        Some(Payload::Ticker(ticker)) => tracing::info!(
            channel = %envelope.channel_name,
            id = ticker.id,
            price = %ticker.price,
            amount = %ticker.amount,
            side = ?ticker.side,
            "Trade"
        ),
        Some(Payload::Order { event, order }) => tracing::info!(
            channel = %envelope.channel_name,
            event = event.as_str(),
            id = order.id,
            price = %order.price,
            amount = %order.amount,
            "Order"
        ),
        Some(Payload::OrderBookSnapshot(book) | Payload::OrderBookDiff(book)) => tracing::info!(
            channel = %envelope.channel_name,
            bids = book.bids.len(),
            asks = book.asks.len(),
            best_bid = ?book.best_bid().map(|level| level.price),
            best_ask = ?book.best_ask().map(|level| level.price),
            "Order book"
        ),
        Some(Payload::FullOrderBook(book)) => tracing::info!(
            channel = %envelope.channel_name,
            bids = book.bids.len(),
            asks = book.asks.len(),
            "Detail order book"
        ),
        Some(Payload::Event(_)) | None => tracing::debug!(
            channel = %envelope.channel_name,
            event = %envelope.event,
            "Event"
        ),
    }
}

/// Log the parsed configuration.
fn log_config(settings: &StreamSettings) {
    let channels: Vec<String> = settings.channels.iter().map(ToString::to_string).collect();
    tracing::info!(
        url = %settings.url,
        buffer = settings.buffer_capacity,
        metrics_port = settings.metrics_port,
        channels = ?channels,
        "Configuration loaded"
    );
    tracing::debug!(
        connect_timeout = ?settings.timeouts.connect,
        write_timeout = ?settings.timeouts.write,
        close_grace = ?settings.timeouts.close_grace,
        "Timeouts"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT) and cancel the stream.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
