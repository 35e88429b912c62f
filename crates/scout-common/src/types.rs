//! Stream event types shared by the feed clients and the core pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Crypto assets the question parser can recognise in market text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoSymbol {
    Btc,
    Eth,
    Sol,
    Doge,
    Xrp,
    Matic,
    Sui,
}

impl CryptoSymbol {
    /// Returns the display name (e.g., "BTC").
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoSymbol::Btc => "BTC",
            CryptoSymbol::Eth => "ETH",
            CryptoSymbol::Sol => "SOL",
            CryptoSymbol::Doge => "DOGE",
            CryptoSymbol::Xrp => "XRP",
            CryptoSymbol::Matic => "MATIC",
            CryptoSymbol::Sui => "SUI",
        }
    }

    /// Returns the exchange ticker pair for the spot stream (e.g., "BTCUSDT").
    pub fn ticker_pair(&self) -> &'static str {
        match self {
            CryptoSymbol::Btc => "BTCUSDT",
            CryptoSymbol::Eth => "ETHUSDT",
            CryptoSymbol::Sol => "SOLUSDT",
            CryptoSymbol::Doge => "DOGEUSDT",
            CryptoSymbol::Xrp => "XRPUSDT",
            CryptoSymbol::Matic => "MATICUSDT",
            CryptoSymbol::Sui => "SUIUSDT",
        }
    }

    /// Maps an exchange ticker pair back to the asset.
    pub fn from_ticker_pair(pair: &str) -> Option<Self> {
        match pair.to_uppercase().as_str() {
            "BTCUSDT" => Some(CryptoSymbol::Btc),
            "ETHUSDT" => Some(CryptoSymbol::Eth),
            "SOLUSDT" => Some(CryptoSymbol::Sol),
            "DOGEUSDT" => Some(CryptoSymbol::Doge),
            "XRPUSDT" => Some(CryptoSymbol::Xrp),
            "MATICUSDT" => Some(CryptoSymbol::Matic),
            "SUIUSDT" => Some(CryptoSymbol::Sui),
            _ => None,
        }
    }

    /// Whole-word aliases recognised in market question text.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            CryptoSymbol::Btc => &["bitcoin", "btc"],
            CryptoSymbol::Eth => &["ethereum", "eth", "ether"],
            CryptoSymbol::Sol => &["solana", "sol"],
            CryptoSymbol::Doge => &["dogecoin", "doge"],
            CryptoSymbol::Xrp => &["xrp", "ripple"],
            CryptoSymbol::Matic => &["polygon", "matic"],
            CryptoSymbol::Sui => &["sui"],
        }
    }

    /// All recognised symbols, in alias-matching priority order.
    pub fn all() -> &'static [CryptoSymbol] {
        &[
            CryptoSymbol::Btc,
            CryptoSymbol::Eth,
            CryptoSymbol::Sol,
            CryptoSymbol::Doge,
            CryptoSymbol::Xrp,
            CryptoSymbol::Matic,
            CryptoSymbol::Sui,
        ]
    }
}

impl std::fmt::Display for CryptoSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Taker side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(format!("Unknown side: {}", s)),
        }
    }
}

/// Which share of a binary market a position holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Yes,
    No,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Yes => Direction::No,
            Direction::No => Direction::Yes,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Yes => write!(f, "YES"),
            Direction::No => write!(f, "NO"),
        }
    }
}

/// Full market snapshot from the catalog sync.
///
/// `yes_price + no_price ≈ 1.0` by invariant of the venue; the divergence
/// detector flags snapshots where that drifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Condition id of the market.
    pub market_id: String,
    /// Free-text market question.
    pub question: String,
    /// YES share price in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub yes_price: Decimal,
    /// NO share price in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub no_price: Decimal,
    /// Trailing 24h volume in USD.
    #[serde(with = "rust_decimal::serde::str")]
    pub volume_24h: Decimal,
    /// Available liquidity in USD.
    #[serde(with = "rust_decimal::serde::str")]
    pub liquidity: Decimal,
    /// Resolution deadline, when the venue publishes one.
    pub end_date: Option<DateTime<Utc>>,
    /// Venue category tag (e.g., "crypto", "sports").
    pub category: Option<String>,
    /// Event slug for building venue URLs.
    pub event_slug: Option<String>,
    /// CLOB token id of the YES outcome, for order-book polling.
    pub yes_token_id: Option<String>,
    /// Snapshot timestamp.
    pub ts: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Hours until resolution, if an end date is known.
    pub fn hours_to_resolution(&self, now: DateTime<Utc>) -> Option<f64> {
        self.end_date
            .map(|end| (end - now).num_seconds() as f64 / 3600.0)
    }

    /// Venue URL for the market, when the event slug is known.
    pub fn event_url(&self) -> Option<String> {
        self.event_slug
            .as_ref()
            .map(|slug| format!("https://polymarket.com/event/{}", slug))
    }
}

/// A YES-price move observed between two catalog syncs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub market_id: String,
    pub question: String,
    /// Previous YES price.
    #[serde(with = "rust_decimal::serde::str")]
    pub old_price: Decimal,
    /// Current YES price.
    #[serde(with = "rust_decimal::serde::str")]
    pub new_price: Decimal,
    /// Signed move in percent of the old price.
    #[serde(with = "rust_decimal::serde::str")]
    pub change_percent: Decimal,
    pub ts: DateTime<Utc>,
}

impl PriceChange {
    /// Builds a change event, deriving the percent move from the prices.
    pub fn derive(
        market_id: String,
        question: String,
        old_price: Decimal,
        new_price: Decimal,
        ts: DateTime<Utc>,
    ) -> Option<Self> {
        if old_price <= Decimal::ZERO {
            return None;
        }
        let change_percent = (new_price - old_price) / old_price * Decimal::ONE_HUNDRED;
        Some(Self {
            market_id,
            question,
            old_price,
            new_price,
            change_percent,
            ts,
        })
    }
}

/// A single large trade reported by the trade-history feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargeTrade {
    pub market_id: String,
    pub trader_address: String,
    pub side: Side,
    /// Share count.
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    /// Fill price in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub ts: DateTime<Utc>,
}

impl LargeTrade {
    /// Notional value of the trade in USD.
    pub fn trade_value(&self) -> Decimal {
        self.size * self.price
    }
}

/// Top-of-book state from the order-book scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookUpdate {
    pub market_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub best_bid: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub best_ask: Decimal,
    /// `best_ask - best_bid`.
    #[serde(with = "rust_decimal::serde::str")]
    pub spread: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_depth: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_depth: Decimal,
    /// `(bid_depth - ask_depth) / (bid_depth + ask_depth)`, in [-1, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub imbalance_ratio: Decimal,
    pub ts: DateTime<Utc>,
}

impl OrderBookUpdate {
    /// Builds an update, deriving spread and imbalance from the raw levels.
    pub fn derive(
        market_id: String,
        best_bid: Decimal,
        best_ask: Decimal,
        bid_depth: Decimal,
        ask_depth: Decimal,
        ts: DateTime<Utc>,
    ) -> Self {
        let total = bid_depth + ask_depth;
        let imbalance_ratio = if total > Decimal::ZERO {
            (bid_depth - ask_depth) / total
        } else {
            Decimal::ZERO
        };
        Self {
            market_id,
            best_bid,
            best_ask,
            spread: best_ask - best_bid,
            bid_depth,
            ask_depth,
            imbalance_ratio,
            ts,
        }
    }

    /// Midpoint of the book, the YES price used by the imbalance detector.
    pub fn mid(&self) -> Decimal {
        (self.best_bid + self.best_ask) / Decimal::TWO
    }

    /// Total resting depth on both sides.
    pub fn total_depth(&self) -> Decimal {
        self.bid_depth + self.ask_depth
    }
}

/// A headline matched against a tracked market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub market_id: String,
    pub headline: String,
    /// Feed host the headline came from.
    pub source: String,
    pub url: String,
    /// Fraction of the market's keywords matched, in [0, 1].
    pub relevance: f64,
    pub ts: DateTime<Utc>,
}

/// Spot price tick for a crypto asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoPriceUpdate {
    pub symbol: CryptoSymbol,
    #[serde(with = "rust_decimal::serde::str")]
    pub current_price: Decimal,
    /// Price 24h ago, when the feed supplies it.
    #[serde(
        with = "rust_decimal::serde::str_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub price_24h_ago: Option<Decimal>,
    /// Annualised volatility estimate for the fair-value model.
    pub annual_volatility: f64,
    pub ts: DateTime<Utc>,
}

/// Parsed structure of a crypto price question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoMarketMatch {
    pub symbol: CryptoSymbol,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_price: Decimal,
    /// True when the market resolves YES on the price being at/above target.
    pub is_above: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl CryptoMarketMatch {
    /// Renders the match back into question text.
    ///
    /// Parsing this rendering reproduces the same match, which keeps the
    /// parser and the renderer honest about each other.
    pub fn canonical_question(&self) -> String {
        let direction = if self.is_above { "above" } else { "below" };
        match self.expiry_date {
            Some(expiry) => format!(
                "Will {} be {} ${} on {}?",
                self.symbol,
                direction,
                self.target_price,
                expiry.format("%B %-d, %Y"),
            ),
            None => format!(
                "Will {} be {} ${}?",
                self.symbol, direction, self.target_price
            ),
        }
    }

    /// Days until expiry from `now`; negative when already past.
    pub fn days_to_expiry(&self, now: DateTime<Utc>) -> Option<f64> {
        self.expiry_date
            .map(|e| (e - now).num_seconds() as f64 / 86_400.0)
    }
}

/// Outcome summary of an automatically placed bet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetPlaced {
    pub market_id: String,
    pub question: String,
    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    pub quality_score: u8,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_ticker_round_trip() {
        for symbol in CryptoSymbol::all() {
            assert_eq!(
                CryptoSymbol::from_ticker_pair(symbol.ticker_pair()),
                Some(*symbol)
            );
        }
        assert_eq!(CryptoSymbol::from_ticker_pair("SPXUSDT"), None);
    }

    #[test]
    fn test_side_and_direction_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Direction::Yes.opposite(), Direction::No);
        assert_eq!(Direction::No.to_string(), "NO");
    }

    #[test]
    fn test_price_change_derive() {
        let change = PriceChange::derive(
            "m1".to_string(),
            "q".to_string(),
            dec!(0.40),
            dec!(0.30),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(change.change_percent, dec!(-25));

        // Zero old price is not a valid baseline
        assert!(
            PriceChange::derive("m1".into(), "q".into(), dec!(0), dec!(0.3), Utc::now()).is_none()
        );
    }

    #[test]
    fn test_trade_value() {
        let trade = LargeTrade {
            market_id: "m1".to_string(),
            trader_address: "0xabc".to_string(),
            side: Side::Buy,
            size: dec!(20000),
            price: dec!(0.80),
            ts: Utc::now(),
        };
        assert_eq!(trade.trade_value(), dec!(16000));
    }

    #[test]
    fn test_order_book_derive() {
        let book = OrderBookUpdate::derive(
            "m1".to_string(),
            dec!(0.45),
            dec!(0.55),
            dec!(900),
            dec!(100),
            Utc::now(),
        );
        assert_eq!(book.spread, dec!(0.10));
        assert_eq!(book.imbalance_ratio, dec!(0.8));
        assert_eq!(book.mid(), dec!(0.50));
        assert_eq!(book.total_depth(), dec!(1000));
    }

    #[test]
    fn test_order_book_empty_depth() {
        let book = OrderBookUpdate::derive(
            "m1".to_string(),
            dec!(0.45),
            dec!(0.55),
            dec!(0),
            dec!(0),
            Utc::now(),
        );
        assert_eq!(book.imbalance_ratio, Decimal::ZERO);
    }

    #[test]
    fn test_canonical_question_shape() {
        let m = CryptoMarketMatch {
            symbol: CryptoSymbol::Btc,
            target_price: dec!(110000),
            is_above: true,
            expiry_date: None,
        };
        assert_eq!(m.canonical_question(), "Will BTC be above $110000?");
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snap = MarketSnapshot {
            market_id: "m1".to_string(),
            question: "Will BTC be above $110,000 on March 31, 2026?".to_string(),
            yes_price: dec!(0.35),
            no_price: dec!(0.65),
            volume_24h: dec!(800000),
            liquidity: dec!(50000),
            end_date: None,
            category: Some("crypto".to_string()),
            event_slug: None,
            yes_token_id: None,
            ts: Utc::now(),
        };
        let json = serde_json::to_string(&snap).unwrap();
        let decoded: MarketSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.yes_price, dec!(0.35));
        assert_eq!(decoded.category.as_deref(), Some("crypto"));
    }
}
