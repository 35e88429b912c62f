//! Shared policy constants for the detector suite and paper engine.
//!
//! The detectors deliberately share value zones and ROI floors; keeping
//! them in one place means a retune is a single edit. Numeric values are
//! part of the detector contracts; change them only together with the
//! tests that pin them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// -- Value zones -----------------------------------------------------------

/// Lower bound of the tradable band for a bought side.
pub const VALUE_ZONE_LOW: Decimal = dec!(0.08);
/// Upper bound of the tradable band for a bought side.
pub const VALUE_ZONE_HIGH: Decimal = dec!(0.70);
/// Momentum entries only from a low base.
pub const MOMENTUM_ZONE_LOW: Decimal = dec!(0.10);
/// Momentum entries cap out where the remaining upside thins.
pub const MOMENTUM_ZONE_HIGH: Decimal = dec!(0.60);

// -- Price spike -----------------------------------------------------------

/// Absolute percent move that triggers the price-spike detector.
pub const SPIKE_TRIGGER_PERCENT: Decimal = dec!(15);
/// Severity scale: `|change%| / 20`.
pub const SPIKE_SEVERITY_SCALE: f64 = 20.0;
/// Expected bounce is half of the drop.
pub const REVERSAL_BOUNCE_FACTOR: Decimal = dec!(0.5);
/// Minimum ROI for a reversal entry.
pub const REVERSAL_MIN_ROI: Decimal = dec!(0.20);
/// Minimum ROI for a momentum entry.
pub const MOMENTUM_MIN_ROI: Decimal = dec!(0.50);

// -- Volume spike ----------------------------------------------------------

/// EWMA weight for the 24h-volume baseline.
pub const VOLUME_EWMA_ALPHA: Decimal = dec!(0.1);
/// Trigger when current volume is this multiple of the baseline.
pub const VOLUME_SPIKE_MULTIPLIER: Decimal = dec!(3);
/// Severity scale: `multiplier / 10`.
pub const VOLUME_SEVERITY_SCALE: f64 = 10.0;

// -- Whale trades ----------------------------------------------------------

/// Notional value that counts as a whale trade.
pub const WHALE_THRESHOLD: Decimal = dec!(10000);
/// Notional value that counts as a big whale.
pub const BIG_WHALE_THRESHOLD: Decimal = dec!(50000);
/// Minimum implied ROI to follow a big whale.
pub const BIG_WHALE_MIN_ROI: Decimal = dec!(0.30);
/// Minimum implied ROI to follow an ordinary whale.
pub const WHALE_MIN_ROI: Decimal = dec!(0.50);
/// Severity scale: `trade_value / 100_000`.
pub const WHALE_SEVERITY_SCALE: f64 = 100_000.0;

// -- Order book imbalance --------------------------------------------------

/// EWMA weight for the |imbalance| baseline.
pub const IMBALANCE_EWMA_ALPHA: Decimal = dec!(0.15);
/// Trigger at this absolute imbalance.
pub const IMBALANCE_TRIGGER: Decimal = dec!(0.9);
/// Books thinner than this are ignored.
pub const IMBALANCE_MIN_DEPTH: Decimal = dec!(500);
/// Observations required before the detector may fire.
pub const IMBALANCE_MIN_OBSERVATIONS: u32 = 3;
/// Chronically imbalanced books (high baseline) are ignored.
pub const IMBALANCE_CHRONIC_CEILING: Decimal = dec!(0.7);
/// Minimum implied ROI on the pressured side.
pub const IMBALANCE_MIN_ROI: Decimal = dec!(0.40);

// -- Spread ----------------------------------------------------------------

/// EWMA weight for the spread baseline.
pub const SPREAD_EWMA_ALPHA: Decimal = dec!(0.1);
/// Observations required before the detector may fire.
pub const SPREAD_MIN_OBSERVATIONS: u32 = 3;
/// Absolute spread that counts as wide.
pub const SPREAD_WIDE_THRESHOLD: Decimal = dec!(0.10);
/// Spread-to-baseline ratio that counts as a spike.
pub const SPREAD_SPIKE_RATIO: Decimal = dec!(3);
/// Severity scale for wide spreads: `spread / 0.15`.
pub const SPREAD_WIDE_SEVERITY_SCALE: f64 = 0.15;
/// Severity scale for spread spikes: `ratio / 10`.
pub const SPREAD_SPIKE_SEVERITY_SCALE: f64 = 10.0;

// -- Market divergence -----------------------------------------------------

/// YES price at or above this is near-resolution.
pub const NEAR_RESOLUTION_HIGH: Decimal = dec!(0.95);
/// YES price at or below this is near-resolution.
pub const NEAR_RESOLUTION_LOW: Decimal = dec!(0.05);
/// Near-resolution severity floor.
pub const NEAR_RESOLUTION_MIN_SEVERITY: f64 = 0.3;
/// |YES + NO - 1| at or above this is a price-sum divergence.
pub const PRICE_SUM_DEVIATION: Decimal = dec!(0.10);
/// Severity scale for sum divergence: `deviation / 0.30`.
pub const PRICE_SUM_SEVERITY_SCALE: f64 = 0.30;
/// Related markets whose YES prices differ by this diverge.
pub const CROSS_MARKET_DIVERGENCE: Decimal = dec!(0.10);

// -- News ------------------------------------------------------------------

/// Minimum keyword-match fraction for a news impact.
pub const NEWS_MIN_RELEVANCE: f64 = 0.4;

// -- Crypto divergence -----------------------------------------------------

/// Markets priced outside this YES band are skipped.
pub const CRYPTO_YES_LOW: Decimal = dec!(0.05);
/// Upper bound of the tradable YES band for divergence entries.
pub const CRYPTO_YES_HIGH: Decimal = dec!(0.90);
/// Markets expiring sooner than this many days are skipped.
pub const CRYPTO_MIN_DAYS_LEFT: f64 = 2.0;
/// Volatility clamp for the fair-value model.
pub const CRYPTO_VOL_MIN: f64 = 0.10;
pub const CRYPTO_VOL_MAX: f64 = 2.0;
/// Minimum |fair - market| edge to act on.
pub const CRYPTO_MIN_EDGE: f64 = 0.05;
/// |edge| at or above this is a strong edge.
pub const CRYPTO_STRONG_EDGE: f64 = 0.10;
/// Minimum expected ROI (`|edge| / buy_price`).
pub const CRYPTO_MIN_ROI: f64 = 0.15;
/// Severity scale: `|edge| / 0.15`.
pub const CRYPTO_SEVERITY_SCALE: f64 = 0.15;

// -- Paper trading ---------------------------------------------------------

/// Simultaneous open positions.
pub const PAPER_MAX_OPEN_POSITIONS: usize = 3;
/// Fraction of the balance at risk across all open positions.
pub const PAPER_MAX_RISK_PERCENT: Decimal = dec!(0.15);
/// Consecutive losses before the engine pauses.
pub const PAPER_MAX_LOSS_STREAK: u32 = 5;
/// Drawdown fraction that pauses the engine.
pub const PAPER_PAUSE_DRAWDOWN: Decimal = dec!(0.20);
/// Default virtual starting balance in dollars.
pub const PAPER_STARTING_BALANCE: Decimal = dec!(1000);
/// Close when the position is down this fraction.
pub const PAPER_STOP_LOSS: Decimal = dec!(-0.40);
/// Close when the position is up this fraction.
pub const PAPER_TAKE_PROFIT: Decimal = dec!(0.50);
/// Position size floor and cap in dollars.
pub const PAPER_MIN_POSITION: Decimal = dec!(5);
pub const PAPER_MAX_POSITION: Decimal = dec!(50);

// -- Alerting --------------------------------------------------------------

/// Quality score required before an anomaly may alert or trade.
pub const ACTIONABLE_SCORE: u8 = 60;
/// Alerts allowed per UTC day.
pub const ALERTS_PER_DAY: u32 = 5;
/// Minimum spacing between alerts in minutes.
pub const ALERT_MIN_GAP_MINUTES: i64 = 30;
/// Dedup map entries pruned past this size.
pub const DEDUP_MAX_ENTRIES: usize = 500;
/// Alerts allowed in any rolling 60 seconds.
pub const ALERTS_PER_MINUTE: usize = 10;

// -- Bounded seen-sets -----------------------------------------------------

/// Seen trade ids flushed past this size.
pub const SEEN_TRADES_CAP: usize = 10_000;
/// Seen news links flushed past this size.
pub const SEEN_NEWS_CAP: usize = 5_000;
