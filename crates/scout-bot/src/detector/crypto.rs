//! Crypto divergence detector.
//!
//! Joins spot price ticks with cached crypto threshold markets for the same
//! asset and compares the model fair value against the market's YES price.
//! A big enough edge with a big enough expected return becomes a BUY YES /
//! BUY NO arbitrage signal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use scout_common::{
    AnomalyDetails, AnomalyDetected, AnomalyType, CryptoMarketMatch, CryptoPriceUpdate,
    MarketSnapshot, Signal,
};

use crate::constants::{
    CRYPTO_MIN_DAYS_LEFT, CRYPTO_MIN_EDGE, CRYPTO_MIN_ROI, CRYPTO_SEVERITY_SCALE,
    CRYPTO_STRONG_EDGE, CRYPTO_VOL_MAX, CRYPTO_VOL_MIN, CRYPTO_YES_HIGH, CRYPTO_YES_LOW,
};
use crate::fair_value::{probability_above, probability_below, years_from_days};

/// Detects fair-value divergence on crypto threshold markets. Stateless;
/// the market cache it joins against lives with the pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct CryptoDivergenceDetector;

impl CryptoDivergenceDetector {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one (spot tick, cached market) pair.
    pub fn process(
        &self,
        tick: &CryptoPriceUpdate,
        snapshot: &MarketSnapshot,
        matched: &CryptoMarketMatch,
        now: DateTime<Utc>,
    ) -> Option<AnomalyDetected> {
        if matched.symbol != tick.symbol {
            return None;
        }

        let yes = snapshot.yes_price;
        if yes < CRYPTO_YES_LOW || yes > CRYPTO_YES_HIGH {
            debug!(market_id = %snapshot.market_id, %yes, "YES outside the tradable band");
            return None;
        }

        let days_left = matched.days_to_expiry(now)?;
        if days_left < CRYPTO_MIN_DAYS_LEFT {
            debug!(market_id = %snapshot.market_id, days_left, "Too close to expiry");
            return None;
        }

        let volatility = tick
            .annual_volatility
            .clamp(CRYPTO_VOL_MIN, CRYPTO_VOL_MAX);

        let spot = tick.current_price.to_f64()?;
        let target = matched.target_price.to_f64()?;
        let years = years_from_days(days_left);

        let fair = if matched.is_above {
            probability_above(spot, target, volatility, years)
        } else {
            probability_below(spot, target, volatility, years)
        };

        let market_price = yes.to_f64()?;
        let edge = fair - market_price;
        if edge.abs() < CRYPTO_MIN_EDGE {
            return None;
        }

        let (signal, buy_price) = if edge > 0.0 {
            (Signal::BuyYes, yes)
        } else {
            (Signal::BuyNo, Decimal::ONE - yes)
        };

        let expected_roi = edge.abs() / buy_price.to_f64()?;
        if expected_roi < CRYPTO_MIN_ROI {
            debug!(market_id = %snapshot.market_id, expected_roi, "Edge too small for the entry price");
            return None;
        }

        let strong_edge = edge.abs() >= CRYPTO_STRONG_EDGE;
        let anomaly = AnomalyDetected::new(
            AnomalyType::ArbitrageOpportunity,
            snapshot.market_id.clone(),
            format!(
                "{} fair {:.3} vs market {:.3} ({}{:.1}pp edge, {})",
                matched.symbol,
                fair,
                market_price,
                if edge > 0.0 { "+" } else { "-" },
                edge.abs() * 100.0,
                signal
            ),
            edge.abs() / CRYPTO_SEVERITY_SCALE,
            AnomalyDetails::CryptoDivergence {
                symbol: matched.symbol,
                spot_price: tick.current_price,
                target_price: matched.target_price,
                is_above: matched.is_above,
                fair_value: fair,
                market_price: yes,
                edge,
                strong_edge,
                volatility,
                days_to_expiry: days_left,
                buy_price,
                expected_roi,
            },
        )
        .with_signal(signal);

        Some(anomaly)
    }
}
