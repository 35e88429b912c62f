//! Crypto spot ticker WebSocket worker.
//!
//! Connects to the exchange's combined stream endpoint and forwards
//! mini-ticker updates as [`CryptoPriceUpdate`]s. The combined stream wraps
//! every payload as `{"stream": "...", "data": {...}}`.
//!
//! The worker reconnects with a fixed delay on any error and exits cleanly
//! on the shutdown signal.

use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, protocol::Message},
};
use tracing::{debug, info, warn};

use scout_common::{CryptoPriceUpdate, CryptoSymbol};

/// Errors that can occur on the ticker stream.
#[derive(Debug, Error)]
pub enum CryptoTickerError {
    #[error("WebSocket connection failed: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("Connection timeout")]
    Timeout,

    #[error("Stream ended unexpectedly")]
    StreamEnded,

    #[error("Consumer channel closed")]
    ChannelClosed,
}

/// Configuration for the ticker worker.
#[derive(Debug, Clone)]
pub struct CryptoTickerConfig {
    /// Combined-stream endpoint base (e.g., `wss://stream.binance.com:9443/stream`).
    pub ws_url: String,
    /// Symbols to subscribe.
    pub symbols: Vec<CryptoSymbol>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Fixed delay before reconnecting after an error.
    pub reconnect_delay: Duration,
}

impl Default for CryptoTickerConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://stream.binance.com:9443/stream".to_string(),
            symbols: CryptoSymbol::all().to_vec(),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Envelope of the combined stream.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    #[serde(rename = "stream")]
    _stream: String,
    data: MiniTicker,
}

/// Mini-ticker payload.
#[derive(Debug, Deserialize)]
struct MiniTicker {
    /// Symbol (e.g., "BTCUSDT").
    #[serde(rename = "s")]
    symbol: String,
    /// Latest close price as string.
    #[serde(rename = "c")]
    close: String,
    /// Open price 24h ago as string.
    #[serde(rename = "o", default)]
    open: Option<String>,
}

/// Rough annualised volatility per asset for the fair-value model.
///
/// The divergence detector clamps volatility to [0.10, 2.0] regardless, so
/// these only need to be in the right neighbourhood.
pub fn annual_volatility_estimate(symbol: CryptoSymbol) -> f64 {
    match symbol {
        CryptoSymbol::Btc => 0.55,
        CryptoSymbol::Eth => 0.70,
        CryptoSymbol::Sol => 0.95,
        CryptoSymbol::Doge => 1.10,
        CryptoSymbol::Xrp => 0.90,
        CryptoSymbol::Matic => 1.00,
        CryptoSymbol::Sui => 1.10,
    }
}

/// Crypto ticker WebSocket worker.
pub struct CryptoTickerWorker {
    config: CryptoTickerConfig,
    sink: mpsc::Sender<CryptoPriceUpdate>,
}

impl CryptoTickerWorker {
    /// Create a new worker that forwards updates into `sink`.
    pub fn new(config: CryptoTickerConfig, sink: mpsc::Sender<CryptoPriceUpdate>) -> Self {
        Self { config, sink }
    }

    /// Runs the stream with automatic reconnection until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), CryptoTickerError> {
        loop {
            if shutdown.try_recv().is_ok() {
                info!("Crypto ticker: shutdown signal received");
                return Ok(());
            }

            match self.run_connection(&mut shutdown).await {
                Ok(()) => {
                    info!("Crypto ticker: clean shutdown");
                    return Ok(());
                }
                Err(CryptoTickerError::ChannelClosed) => {
                    // Nobody is listening; nothing left to do.
                    return Err(CryptoTickerError::ChannelClosed);
                }
                Err(e) => {
                    warn!(
                        "Crypto ticker error: {e}, reconnecting in {:?}",
                        self.config.reconnect_delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                        _ = shutdown.recv() => {
                            info!("Crypto ticker: shutdown during reconnect delay");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Runs a single connection until error or shutdown.
    async fn run_connection(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), CryptoTickerError> {
        let url = self.combined_url();
        info!("Connecting to crypto ticker stream at {url}");

        let connect_result = timeout(self.config.connect_timeout, connect_async(&url)).await;
        let (ws_stream, _response) = match connect_result {
            Ok(Ok(ok)) => ok,
            Ok(Err(e)) => return Err(CryptoTickerError::Connection(e.to_string())),
            Err(_) => return Err(CryptoTickerError::Timeout),
        };

        info!("Connected to crypto ticker stream");
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(update) = self.parse_ticker(&text) {
                                if self.sink.send(update).await.is_err() {
                                    return Err(CryptoTickerError::ChannelClosed);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("Ticker stream closed by server: {:?}", frame);
                            return Err(CryptoTickerError::StreamEnded);
                        }
                        Some(Err(e)) => return Err(CryptoTickerError::WebSocket(e)),
                        None => return Err(CryptoTickerError::StreamEnded),
                        _ => {}
                    }
                }
                _ = shutdown.recv() => {
                    info!("Crypto ticker: shutdown signal received");
                    return Ok(());
                }
            }
        }
    }

    /// Builds the combined-stream URL for the configured symbols.
    fn combined_url(&self) -> String {
        let streams: Vec<String> = self
            .config
            .symbols
            .iter()
            .map(|s| format!("{}@miniTicker", s.ticker_pair().to_lowercase()))
            .collect();
        format!("{}?streams={}", self.config.ws_url, streams.join("/"))
    }

    /// Parses one combined-stream message; unknown payloads are skipped.
    fn parse_ticker(&self, text: &str) -> Option<CryptoPriceUpdate> {
        let envelope: StreamEnvelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping non-ticker message: {e}");
                return None;
            }
        };

        let symbol = CryptoSymbol::from_ticker_pair(&envelope.data.symbol)?;
        let current_price: Decimal = match envelope.data.close.parse() {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to parse price '{}': {e}", envelope.data.close);
                return None;
            }
        };
        let price_24h_ago = envelope
            .data
            .open
            .as_deref()
            .and_then(|o| o.parse::<Decimal>().ok());

        Some(CryptoPriceUpdate {
            symbol,
            current_price,
            price_24h_ago,
            annual_volatility: annual_volatility_estimate(symbol),
            ts: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn worker() -> (CryptoTickerWorker, mpsc::Receiver<CryptoPriceUpdate>) {
        let (tx, rx) = mpsc::channel(16);
        let worker = CryptoTickerWorker::new(CryptoTickerConfig::default(), tx);
        (worker, rx)
    }

    #[test]
    fn test_combined_url() {
        let (tx, _rx) = mpsc::channel(1);
        let config = CryptoTickerConfig {
            symbols: vec![CryptoSymbol::Btc, CryptoSymbol::Eth],
            ..Default::default()
        };
        let worker = CryptoTickerWorker::new(config, tx);
        assert_eq!(
            worker.combined_url(),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@miniTicker/ethusdt@miniTicker"
        );
    }

    #[test]
    fn test_parse_ticker() {
        let (worker, _rx) = worker();
        let msg = r#"{
            "stream": "btcusdt@miniTicker",
            "data": {"e":"24hrMiniTicker","E":1704067200000,"s":"BTCUSDT","c":"108000.10","o":"105500.00","h":"109000","l":"105000","v":"1000","q":"108000000"}
        }"#;

        let update = worker.parse_ticker(msg).unwrap();
        assert_eq!(update.symbol, CryptoSymbol::Btc);
        assert_eq!(update.current_price, dec!(108000.10));
        assert_eq!(update.price_24h_ago, Some(dec!(105500.00)));
        assert!(update.annual_volatility > 0.0);
    }

    #[test]
    fn test_parse_ticker_ignores_other_messages() {
        let (worker, _rx) = worker();
        assert!(worker.parse_ticker(r#"{"result":null,"id":1}"#).is_none());
        assert!(worker.parse_ticker("not json").is_none());

        // Unknown symbol
        let msg = r#"{"stream":"x","data":{"s":"SPXUSDT","c":"6000"}}"#;
        assert!(worker.parse_ticker(msg).is_none());
    }

    #[test]
    fn test_volatility_estimates_in_model_range() {
        for symbol in CryptoSymbol::all() {
            let vol = annual_volatility_estimate(*symbol);
            assert!((0.10..=2.0).contains(&vol));
        }
    }
}
