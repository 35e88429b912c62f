//! Order-book client.
//!
//! Fetches the resting book for a market's YES token from the CLOB REST
//! API and reduces it to the top-of-book update the imbalance and spread
//! detectors consume.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use scout_common::OrderBookUpdate;

use crate::retry::with_backoff;

/// Errors from the order-book service.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Empty book for token {0}")]
    EmptyBook(String),
}

/// Configuration for the book client.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Base URL of the CLOB REST API.
    pub base_url: String,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            base_url: "https://clob.polymarket.com".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// One price level in the raw book.
#[derive(Debug, Clone, Deserialize)]
struct RawLevel {
    price: String,
    size: String,
}

/// Raw book response.
#[derive(Debug, Clone, Deserialize)]
struct RawBook {
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
}

/// Order-book client.
pub struct BookClient {
    http: Client,
    config: BookConfig,
}

impl BookClient {
    /// Create a new book client.
    pub fn new(config: BookConfig) -> Self {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, config }
    }

    /// Fetch the book for a token and reduce it to a top-of-book update.
    pub async fn fetch_book(
        &self,
        market_id: &str,
        token_id: &str,
    ) -> Result<OrderBookUpdate, BookError> {
        let url = format!("{}/book?token_id={}", self.config.base_url, token_id);

        let raw: RawBook = with_backoff("order book", || async {
            self.http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        })
        .await?;

        reduce_book(market_id, raw).ok_or_else(|| BookError::EmptyBook(token_id.to_string()))
    }
}

/// Reduce raw levels to best bid/ask and summed depth.
fn reduce_book(market_id: &str, raw: RawBook) -> Option<OrderBookUpdate> {
    let bids = parse_levels(&raw.bids);
    let asks = parse_levels(&raw.asks);

    let best_bid = bids.iter().map(|(price, _)| *price).max()?;
    let best_ask = asks.iter().map(|(price, _)| *price).min()?;
    let bid_depth: Decimal = bids.iter().map(|(_, size)| *size).sum();
    let ask_depth: Decimal = asks.iter().map(|(_, size)| *size).sum();

    Some(OrderBookUpdate::derive(
        market_id.to_string(),
        best_bid,
        best_ask,
        bid_depth,
        ask_depth,
        Utc::now(),
    ))
}

fn parse_levels(levels: &[RawLevel]) -> Vec<(Decimal, Decimal)> {
    levels
        .iter()
        .filter_map(|level| {
            let price = level.price.parse::<Decimal>().ok()?;
            let size = level.size.parse::<Decimal>().ok()?;
            Some((price, size))
        })
        .collect()
}
