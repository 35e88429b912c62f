//! Market divergence checks on snapshots.
//!
//! Three related checks share this detector:
//! - **Near-resolution**: YES pinned at 0.95+ or 0.05-, usually a market
//!   the crowd has already decided.
//! - **Price-sum divergence**: YES + NO drifting from 1.0 by 0.10 or more,
//!   which should not survive venue arbitrage.
//! - **Cross-market divergence**: two related markets quoting YES prices
//!   0.10 apart (externally driven; the caller decides which markets are
//!   related).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use scout_common::{AnomalyDetails, AnomalyDetected, AnomalyType, MarketSnapshot};

use crate::constants::{
    CROSS_MARKET_DIVERGENCE, NEAR_RESOLUTION_HIGH, NEAR_RESOLUTION_LOW,
    NEAR_RESOLUTION_MIN_SEVERITY, PRICE_SUM_DEVIATION, PRICE_SUM_SEVERITY_SCALE,
};

/// Snapshot-level divergence checks. Stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketDivergenceDetector;

impl MarketDivergenceDetector {
    pub fn new() -> Self {
        Self
    }

    /// YES price pinned near either boundary.
    pub fn check_near_resolution(&self, snapshot: &MarketSnapshot) -> Option<AnomalyDetected> {
        let yes = snapshot.yes_price;
        let depth = if yes >= NEAR_RESOLUTION_HIGH {
            (yes - NEAR_RESOLUTION_HIGH) / (Decimal::ONE - NEAR_RESOLUTION_HIGH)
        } else if yes <= NEAR_RESOLUTION_LOW {
            (NEAR_RESOLUTION_LOW - yes) / NEAR_RESOLUTION_LOW
        } else {
            return None;
        };

        // How deep into the tail, floored so even a grazing touch alerts
        let severity = depth
            .to_f64()
            .unwrap_or(0.0)
            .max(NEAR_RESOLUTION_MIN_SEVERITY);

        Some(AnomalyDetected::new(
            AnomalyType::NearResolution,
            snapshot.market_id.clone(),
            format!("Market effectively decided at YES = {}", yes),
            severity,
            AnomalyDetails::NearResolution { yes_price: yes },
        ))
    }

    /// YES + NO drifting away from 1.0.
    pub fn check_price_sum(&self, snapshot: &MarketSnapshot) -> Option<AnomalyDetected> {
        let deviation = (snapshot.yes_price + snapshot.no_price - Decimal::ONE).abs();
        if deviation < PRICE_SUM_DEVIATION {
            return None;
        }

        Some(AnomalyDetected::new(
            AnomalyType::MarketDivergence,
            snapshot.market_id.clone(),
            format!(
                "YES {} + NO {} deviates {} from parity",
                snapshot.yes_price, snapshot.no_price, deviation
            ),
            deviation.to_f64().unwrap_or(0.0) / PRICE_SUM_SEVERITY_SCALE,
            AnomalyDetails::PriceSumDivergence {
                yes_price: snapshot.yes_price,
                no_price: snapshot.no_price,
                deviation,
            },
        ))
    }

    /// Two related markets quoting YES prices far apart.
    pub fn check_cross_market(
        &self,
        a: &MarketSnapshot,
        b: &MarketSnapshot,
    ) -> Option<AnomalyDetected> {
        let diff = (a.yes_price - b.yes_price).abs();
        if diff < CROSS_MARKET_DIVERGENCE {
            return None;
        }

        Some(AnomalyDetected::new(
            AnomalyType::MarketDivergence,
            a.market_id.clone(),
            format!(
                "Related markets disagree: YES {} vs {} ({} apart)",
                a.yes_price, b.yes_price, diff
            ),
            diff.to_f64().unwrap_or(0.0) / PRICE_SUM_SEVERITY_SCALE,
            AnomalyDetails::CrossMarketDivergence {
                other_market_id: b.market_id.clone(),
                yes_price: a.yes_price,
                other_yes_price: b.yes_price,
            },
        ))
    }
}
