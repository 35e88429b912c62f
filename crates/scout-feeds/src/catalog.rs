//! Market catalog client.
//!
//! Fetches active binary markets from the venue's metadata API: a paginated
//! listing for the sync loop and a single lookup by condition id for the
//! name resolver. Raw records are converted into [`MarketSnapshot`]s;
//! records that fail conversion are skipped with a warning so one bad
//! market never stalls the sync.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use scout_common::MarketSnapshot;

use crate::retry::with_backoff;

/// Errors that can occur while talking to the catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Market not found: {0}")]
    NotFound(String),
}

/// Configuration for the catalog client.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL of the metadata API.
    pub base_url: String,
    /// Page size for the active-market listing.
    pub page_size: usize,
    /// Maximum markets to pull per sync.
    pub max_markets: usize,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gamma-api.polymarket.com".to_string(),
            page_size: 100,
            max_markets: 500,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Raw market record from the catalog API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    pub condition_id: Option<String>,
    pub question: Option<String>,
    /// Outcome prices as a JSON string array: `["0.35", "0.65"]`.
    pub outcome_prices: Option<String>,
    /// Token ids as a JSON string array: `["123", "456"]` (YES first).
    pub clob_token_ids: Option<String>,
    #[serde(default)]
    pub volume24hr: Option<f64>,
    #[serde(default)]
    pub liquidity: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<RawEvent>>,
}

/// Raw event wrapper carrying the slug used for venue URLs.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub slug: Option<String>,
}

/// Market catalog client.
pub struct CatalogClient {
    http: Client,
    config: CatalogConfig,
}

impl CatalogClient {
    /// Create a new catalog client.
    pub fn new(config: CatalogConfig) -> Self {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, config }
    }

    /// Fetch all active markets, paging until the API runs dry or the
    /// configured cap is reached.
    pub async fn list_active_markets(&self) -> Result<Vec<MarketSnapshot>, CatalogError> {
        let mut snapshots = Vec::new();
        let mut offset = 0usize;

        while snapshots.len() < self.config.max_markets {
            let page = self.fetch_page(offset).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            for raw in page {
                match convert_market(raw) {
                    Some(snapshot) => snapshots.push(snapshot),
                    None => debug!("Skipping catalog record with missing fields"),
                }
            }

            if page_len < self.config.page_size {
                break;
            }
            offset += self.config.page_size;
        }

        snapshots.truncate(self.config.max_markets);
        Ok(snapshots)
    }

    /// Look up a single market by condition id.
    pub async fn fetch_market(&self, condition_id: &str) -> Result<MarketSnapshot, CatalogError> {
        let url = format!(
            "{}/markets?condition_ids={}",
            self.config.base_url, condition_id
        );

        let markets: Vec<RawMarket> = with_backoff("catalog lookup", || async {
            self.http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        })
        .await?;

        markets
            .into_iter()
            .find_map(convert_market)
            .ok_or_else(|| CatalogError::NotFound(condition_id.to_string()))
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<RawMarket>, CatalogError> {
        let url = format!(
            "{}/markets?active=true&closed=false&limit={}&offset={}",
            self.config.base_url, self.config.page_size, offset
        );

        let page = with_backoff("catalog page", || async {
            self.http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json::<Vec<RawMarket>>()
                .await
        })
        .await?;

        Ok(page)
    }
}

/// Convert a raw catalog record into a domain snapshot.
///
/// Returns `None` when required fields are missing or unparsable; the
/// caller logs and moves on (malformed payloads must not kill the stream).
fn convert_market(raw: RawMarket) -> Option<MarketSnapshot> {
    let market_id = raw.condition_id?;
    let question = raw.question?;
    let (yes_price, no_price) = parse_outcome_prices(raw.outcome_prices.as_deref()?)?;

    let volume_24h = raw
        .volume24hr
        .and_then(Decimal::from_f64)
        .unwrap_or(Decimal::ZERO);
    let liquidity = raw
        .liquidity
        .as_deref()
        .and_then(|s| s.parse::<Decimal>().ok())
        .unwrap_or(Decimal::ZERO);

    let end_date = raw.end_date.as_deref().and_then(parse_end_date);
    let event_slug = raw
        .events
        .as_ref()
        .and_then(|events| events.first())
        .and_then(|e| e.slug.clone());
    let yes_token_id = raw
        .clob_token_ids
        .as_deref()
        .and_then(parse_first_token_id);

    Some(MarketSnapshot {
        market_id,
        question,
        yes_price,
        no_price,
        volume_24h,
        liquidity,
        end_date,
        category: raw.category,
        event_slug,
        yes_token_id,
        ts: Utc::now(),
    })
}

/// Parse the `["123", "456"]` token-id encoding; the YES token comes first.
fn parse_first_token_id(encoded: &str) -> Option<String> {
    let ids: Vec<String> = serde_json::from_str(encoded).ok()?;
    ids.into_iter().next()
}

/// Parse the `["0.35", "0.65"]` outcome-price encoding.
fn parse_outcome_prices(encoded: &str) -> Option<(Decimal, Decimal)> {
    let prices: Vec<String> = match serde_json::from_str(encoded) {
        Ok(p) => p,
        Err(e) => {
            warn!("Unparsable outcome prices {:?}: {}", encoded, e);
            return None;
        }
    };
    if prices.len() < 2 {
        return None;
    }
    let yes = prices[0].parse::<Decimal>().ok()?;
    let no = prices[1].parse::<Decimal>().ok()?;
    Some((yes, no))
}

/// Parse the catalog's end-date formats (RFC3339, with or without millis).
fn parse_end_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(condition_id: &str, prices: &str) -> RawMarket {
        RawMarket {
            condition_id: Some(condition_id.to_string()),
            question: Some("Will BTC be above $110,000 on March 31, 2026?".to_string()),
            outcome_prices: Some(prices.to_string()),
            clob_token_ids: Some(r#"["tok-yes", "tok-no"]"#.to_string()),
            volume24hr: Some(800000.0),
            liquidity: Some("50000".to_string()),
            end_date: Some("2026-03-31T12:00:00Z".to_string()),
            category: Some("crypto".to_string()),
            events: Some(vec![RawEvent {
                slug: Some("btc-110k".to_string()),
            }]),
        }
    }

    #[test]
    fn test_convert_market() {
        let snapshot = convert_market(raw("cond1", r#"["0.35", "0.65"]"#)).unwrap();
        assert_eq!(snapshot.market_id, "cond1");
        assert_eq!(snapshot.yes_price, dec!(0.35));
        assert_eq!(snapshot.no_price, dec!(0.65));
        assert_eq!(snapshot.volume_24h, dec!(800000));
        assert!(snapshot.end_date.is_some());
        assert_eq!(snapshot.event_slug.as_deref(), Some("btc-110k"));
        assert_eq!(snapshot.yes_token_id.as_deref(), Some("tok-yes"));
    }

    #[test]
    fn test_convert_market_missing_fields() {
        let mut record = raw("cond1", r#"["0.35", "0.65"]"#);
        record.question = None;
        assert!(convert_market(record).is_none());

        let record = raw("cond1", "not json");
        assert!(convert_market(record).is_none());
    }

    #[test]
    fn test_parse_outcome_prices() {
        assert_eq!(
            parse_outcome_prices(r#"["0.35", "0.65"]"#),
            Some((dec!(0.35), dec!(0.65)))
        );
        assert_eq!(parse_outcome_prices(r#"["0.35"]"#), None);
        assert_eq!(parse_outcome_prices("garbage"), None);
    }

    #[test]
    fn test_parse_end_date() {
        assert!(parse_end_date("2026-03-31T12:00:00Z").is_some());
        assert!(parse_end_date("2026-03-31T12:00:00.123Z").is_some());
        assert!(parse_end_date("March 31").is_none());
    }

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.page_size, 100);
        assert!(config.base_url.starts_with("https://"));
    }
}
