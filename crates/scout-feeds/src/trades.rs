//! Recent-trade history client.
//!
//! Pulls the latest trades for a market from the public data API. The whale
//! tracker in `scout-bot` filters by notional value and dedups by trade id.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use scout_common::{LargeTrade, Side};

use crate::retry::with_backoff;

/// Errors from the trade-history service.
#[derive(Debug, Error)]
pub enum TradesError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration for the trades client.
#[derive(Debug, Clone)]
pub struct TradesConfig {
    /// Base URL of the data API.
    pub base_url: String,
    /// Trades to pull per market per poll.
    pub limit: usize,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for TradesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data-api.polymarket.com".to_string(),
            limit: 100,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Raw trade record from the data API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrade {
    #[serde(default)]
    proxy_wallet: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    size: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    transaction_hash: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    timestamp: Option<i64>,
}

/// A trade with its venue-unique id, for dedup upstream.
#[derive(Debug, Clone)]
pub struct RecentTrade {
    /// Transaction hash; unique per fill.
    pub trade_id: String,
    pub trade: LargeTrade,
}

/// Trade-history client.
pub struct TradesClient {
    http: Client,
    config: TradesConfig,
}

impl TradesClient {
    /// Create a new trades client.
    pub fn new(config: TradesConfig) -> Self {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, config }
    }

    /// Fetch the most recent trades for a market.
    pub async fn recent_trades(&self, market_id: &str) -> Result<Vec<RecentTrade>, TradesError> {
        let url = format!(
            "{}/trades?market={}&limit={}",
            self.config.base_url, market_id, self.config.limit
        );

        let raw: Vec<RawTrade> = with_backoff("trade history", || async {
            self.http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        })
        .await?;

        let trades = raw
            .into_iter()
            .filter_map(|r| convert_trade(market_id, r))
            .collect();
        Ok(trades)
    }
}

fn convert_trade(market_id: &str, raw: RawTrade) -> Option<RecentTrade> {
    let trade_id = raw.transaction_hash?;
    let side: Side = raw.side.as_deref()?.parse().ok()?;
    let size = Decimal::from_f64(raw.size?)?;
    let price = Decimal::from_f64(raw.price?)?;
    let ts = raw.timestamp.and_then(parse_unix_seconds)?;

    if size <= Decimal::ZERO || price <= Decimal::ZERO {
        debug!("Skipping trade with non-positive size/price");
        return None;
    }

    Some(RecentTrade {
        trade_id,
        trade: LargeTrade {
            market_id: market_id.to_string(),
            trader_address: raw.proxy_wallet.unwrap_or_default(),
            side,
            size,
            price,
            ts,
        },
    })
}

fn parse_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw_trade() -> RawTrade {
        RawTrade {
            proxy_wallet: Some("0xabc".to_string()),
            side: Some("BUY".to_string()),
            size: Some(20000.0),
            price: Some(0.8),
            transaction_hash: Some("0xhash1".to_string()),
            timestamp: Some(1_750_000_000),
        }
    }

    #[test]
    fn test_convert_trade() {
        let recent = convert_trade("m1", raw_trade()).unwrap();
        assert_eq!(recent.trade_id, "0xhash1");
        assert_eq!(recent.trade.side, Side::Buy);
        assert_eq!(recent.trade.size, dec!(20000));
        assert_eq!(recent.trade.trade_value(), dec!(16000.0));
    }

    #[test]
    fn test_convert_trade_rejects_bad_records() {
        let mut r = raw_trade();
        r.side = Some("HOLD".to_string());
        assert!(convert_trade("m1", r).is_none());

        let mut r = raw_trade();
        r.transaction_hash = None;
        assert!(convert_trade("m1", r).is_none());

        let mut r = raw_trade();
        r.size = Some(0.0);
        assert!(convert_trade("m1", r).is_none());
    }
}
