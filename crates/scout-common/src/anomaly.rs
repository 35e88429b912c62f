//! Anomaly event types published by the detector suite.
//!
//! Every detector emits `AnomalyDetected`. The per-anomaly payload is a
//! tagged union (`AnomalyDetails`) so downstream consumers get strongly
//! typed fields; the historical string-keyed `details` map is rendered only
//! at the serialization boundary via [`AnomalyDetected::details_map`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{CryptoSymbol, Side};

/// Types of anomalies the detector suite can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// Sharp YES-price move between two syncs.
    PriceSpike,
    /// 24h volume well above the market's running average.
    VolumeSpike,
    /// Single trade above the large-money threshold.
    WhaleTrade,
    /// YES+NO sum drift or related markets disagreeing.
    MarketDivergence,
    /// YES price pinned near 0 or 1.
    NearResolution,
    /// Order book depth heavily one-sided.
    OrderBookImbalance,
    /// Spread wide in absolute terms or versus its average.
    SpreadAnomaly,
    /// Relevant headline for a tracked market.
    NewsImpact,
    /// Model fair value disagrees with the market price.
    CryptoDivergence,
    /// Crypto divergence with a strong edge.
    ArbitrageOpportunity,
}

impl AnomalyType {
    /// String representation for storage and dedup keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::PriceSpike => "price_spike",
            AnomalyType::VolumeSpike => "volume_spike",
            AnomalyType::WhaleTrade => "whale_trade",
            AnomalyType::MarketDivergence => "market_divergence",
            AnomalyType::NearResolution => "near_resolution",
            AnomalyType::OrderBookImbalance => "order_book_imbalance",
            AnomalyType::SpreadAnomaly => "spread_anomaly",
            AnomalyType::NewsImpact => "news_impact",
            AnomalyType::CryptoDivergence => "crypto_divergence",
            AnomalyType::ArbitrageOpportunity => "arbitrage_opportunity",
        }
    }

    /// Parse from the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price_spike" => Some(AnomalyType::PriceSpike),
            "volume_spike" => Some(AnomalyType::VolumeSpike),
            "whale_trade" => Some(AnomalyType::WhaleTrade),
            "market_divergence" => Some(AnomalyType::MarketDivergence),
            "near_resolution" => Some(AnomalyType::NearResolution),
            "order_book_imbalance" => Some(AnomalyType::OrderBookImbalance),
            "spread_anomaly" => Some(AnomalyType::SpreadAnomaly),
            "news_impact" => Some(AnomalyType::NewsImpact),
            "crypto_divergence" => Some(AnomalyType::CryptoDivergence),
            "arbitrage_opportunity" => Some(AnomalyType::ArbitrageOpportunity),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Actionable signal attached to an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    BuyYes,
    BuyNo,
}

impl Signal {
    pub fn direction(&self) -> crate::types::Direction {
        match self {
            Signal::BuyYes => crate::types::Direction::Yes,
            Signal::BuyNo => crate::types::Direction::No,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::BuyYes => write!(f, "BUY YES"),
            Signal::BuyNo => write!(f, "BUY NO"),
        }
    }
}

/// Which price-spike strategy produced the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpikeStrategy {
    /// Buying the dip after a sharp drop.
    Reversal,
    /// Riding a sharp move up from a low base.
    Momentum,
}

impl std::fmt::Display for SpikeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpikeStrategy::Reversal => write!(f, "reversal"),
            SpikeStrategy::Momentum => write!(f, "momentum"),
        }
    }
}

/// Whether a spread anomaly is wide in absolute terms or versus average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadKind {
    Wide,
    Spike,
}

/// Market classification used by the quality scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    LiveSports,
    PriceBinary,
    ObjectiveMeasurable,
    Unknown,
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketType::LiveSports => write!(f, "Live sports"),
            MarketType::PriceBinary => write!(f, "Price binary"),
            MarketType::ObjectiveMeasurable => write!(f, "Objective measurable"),
            MarketType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of the rule-based quality scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Score in [0, 100].
    pub score: u8,
    pub market_type: MarketType,
    pub hours_to_resolution: Option<f64>,
    /// Human-readable reasons that contributed points.
    pub reasons: Vec<String>,
    /// Hard blocks; non-empty means never actionable.
    pub blocks: Vec<String>,
}

impl QualityAssessment {
    /// An anomaly is actionable only with a passing score and no blocks.
    pub fn is_actionable(&self) -> bool {
        self.score >= 60 && self.blocks.is_empty()
    }

    /// Score breakdown joined for display, split on `|` by the formatter.
    pub fn breakdown(&self) -> String {
        self.reasons.join(" | ")
    }
}

/// Strongly typed per-anomaly payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyDetails {
    PriceSpike {
        #[serde(with = "rust_decimal::serde::str")]
        old_price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        new_price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        change_percent: Decimal,
        strategy: SpikeStrategy,
        #[serde(with = "rust_decimal::serde::str")]
        buy_price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        target_price: Decimal,
        /// Expected return on the bought side, as a fraction.
        expected_roi: f64,
    },
    VolumeSpike {
        #[serde(with = "rust_decimal::serde::str")]
        current_volume: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        average_volume: Decimal,
        multiplier: f64,
    },
    WhaleTrade {
        trader_address: String,
        side: Side,
        #[serde(with = "rust_decimal::serde::str")]
        size: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        trade_value: Decimal,
        is_big_whale: bool,
        #[serde(with = "rust_decimal::serde::str")]
        buy_price: Decimal,
        max_roi: f64,
    },
    OrderBookImbalance {
        #[serde(with = "rust_decimal::serde::str")]
        imbalance: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        bid_depth: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        ask_depth: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        buy_price: Decimal,
        max_roi: f64,
    },
    SpreadAnomaly {
        #[serde(with = "rust_decimal::serde::str")]
        spread: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        average_spread: Decimal,
        #[serde(rename = "spread_kind")]
        kind: SpreadKind,
    },
    NearResolution {
        #[serde(with = "rust_decimal::serde::str")]
        yes_price: Decimal,
    },
    PriceSumDivergence {
        #[serde(with = "rust_decimal::serde::str")]
        yes_price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        no_price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        deviation: Decimal,
    },
    CrossMarketDivergence {
        other_market_id: String,
        #[serde(with = "rust_decimal::serde::str")]
        yes_price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        other_yes_price: Decimal,
    },
    NewsImpact {
        headline: String,
        source: String,
        url: String,
        relevance: f64,
    },
    CryptoDivergence {
        symbol: CryptoSymbol,
        #[serde(with = "rust_decimal::serde::str")]
        spot_price: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        target_price: Decimal,
        is_above: bool,
        fair_value: f64,
        #[serde(with = "rust_decimal::serde::str")]
        market_price: Decimal,
        edge: f64,
        strong_edge: bool,
        volatility: f64,
        days_to_expiry: f64,
        #[serde(with = "rust_decimal::serde::str")]
        buy_price: Decimal,
        expected_roi: f64,
    },
}

/// An anomaly published to the fan-out bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetected {
    pub anomaly_type: AnomalyType,
    pub market_id: String,
    pub description: String,
    /// Normalised severity in [0, 1].
    pub severity: f64,
    pub details: AnomalyDetails,
    /// Actionable signal, when the detector produced one.
    pub signal: Option<Signal>,
    /// Quality assessment attached by the enrichment stage.
    pub quality: Option<QualityAssessment>,
    pub ts: DateTime<Utc>,
}

impl AnomalyDetected {
    pub fn new(
        anomaly_type: AnomalyType,
        market_id: impl Into<String>,
        description: impl Into<String>,
        severity: f64,
        details: AnomalyDetails,
    ) -> Self {
        Self {
            anomaly_type,
            market_id: market_id.into(),
            description: description.into(),
            severity: clamp_severity(severity),
            details,
            signal: None,
            quality: None,
            ts: Utc::now(),
        }
    }

    /// Attach an actionable signal.
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attach the quality assessment from the enrichment stage.
    pub fn with_quality(mut self, quality: QualityAssessment) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Buy price implied by the signal, when the payload carries one.
    pub fn buy_price(&self) -> Option<Decimal> {
        match &self.details {
            AnomalyDetails::PriceSpike { buy_price, .. }
            | AnomalyDetails::WhaleTrade { buy_price, .. }
            | AnomalyDetails::OrderBookImbalance { buy_price, .. }
            | AnomalyDetails::CryptoDivergence { buy_price, .. } => Some(*buy_price),
            _ => None,
        }
    }

    /// Expected ROI fraction, when the payload carries one.
    pub fn expected_roi(&self) -> Option<f64> {
        match &self.details {
            AnomalyDetails::PriceSpike { expected_roi, .. }
            | AnomalyDetails::CryptoDivergence { expected_roi, .. } => Some(*expected_roi),
            AnomalyDetails::WhaleTrade { max_roi, .. }
            | AnomalyDetails::OrderBookImbalance { max_roi, .. } => Some(*max_roi),
            _ => None,
        }
    }

    /// Renders the historical string-keyed details map.
    ///
    /// Storage consumers expect flat string keys; everything else in the
    /// process reads the typed payload instead.
    pub fn details_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        if let Value::Object(fields) = json!(self.details) {
            for (key, value) in fields {
                map.insert(key, value);
            }
        }
        if let Some(signal) = self.signal {
            map.insert("signal".to_string(), json!(signal.to_string()));
        }
        if let Some(quality) = &self.quality {
            map.insert("qualityScore".to_string(), json!(quality.score));
            map.insert(
                "marketType".to_string(),
                json!(quality.market_type.to_string()),
            );
        }
        map
    }
}

/// Clamp a raw severity ratio into [0, 1].
pub fn clamp_severity(raw: f64) -> f64 {
    raw.clamp(0.0, 1.0)
}
