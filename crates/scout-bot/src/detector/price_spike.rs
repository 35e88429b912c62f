//! Price spike detector.
//!
//! Fires on YES moves of 15% or more and turns them into one of two entry
//! strategies:
//!
//! - **Reversal**: a sharp drop into the tradable band, betting on a bounce
//!   worth half the drop. Requires a 20% expected return.
//! - **Momentum**: a sharp rise from a low base, betting on continuation to
//!   resolution. Requires a 50% max return.
//!
//! Moves that trigger but fail the strategy gates produce nothing.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use scout_common::{
    AnomalyDetails, AnomalyDetected, AnomalyType, PriceChange, Signal, SpikeStrategy,
};

use crate::constants::{
    MOMENTUM_MIN_ROI, MOMENTUM_ZONE_HIGH, MOMENTUM_ZONE_LOW, REVERSAL_BOUNCE_FACTOR,
    REVERSAL_MIN_ROI, SPIKE_SEVERITY_SCALE, SPIKE_TRIGGER_PERCENT, VALUE_ZONE_HIGH, VALUE_ZONE_LOW,
};

/// Detects tradable price spikes. Stateless: each change event carries its
/// own baseline.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriceSpikeDetector;

impl PriceSpikeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one price change.
    pub fn process(&self, change: &PriceChange) -> Option<AnomalyDetected> {
        let move_percent = change.change_percent.abs();
        if move_percent < SPIKE_TRIGGER_PERCENT {
            return None;
        }

        let severity = move_percent.to_f64().unwrap_or(0.0) / SPIKE_SEVERITY_SCALE;

        if change.new_price < change.old_price {
            self.reversal(change, severity)
        } else {
            self.momentum(change, severity)
        }
    }

    /// Sharp drop into the band: buy YES expecting half the drop back.
    fn reversal(&self, change: &PriceChange, severity: f64) -> Option<AnomalyDetected> {
        let new = change.new_price;
        if new < VALUE_ZONE_LOW || new > VALUE_ZONE_HIGH {
            debug!(market_id = %change.market_id, "Reversal outside value zone, skipping");
            return None;
        }

        let drop = change.old_price - new;
        let expected_bounce = drop * REVERSAL_BOUNCE_FACTOR;
        let roi = expected_bounce / new;
        if roi < REVERSAL_MIN_ROI {
            debug!(market_id = %change.market_id, roi = %roi, "Reversal ROI below floor");
            return None;
        }

        let anomaly = AnomalyDetected::new(
            AnomalyType::PriceSpike,
            change.market_id.clone(),
            format!(
                "Price dropped {:.1}% to {} - reversal entry targeting {}",
                change.change_percent.abs(),
                new,
                new + expected_bounce
            ),
            severity,
            AnomalyDetails::PriceSpike {
                old_price: change.old_price,
                new_price: new,
                change_percent: change.change_percent,
                strategy: SpikeStrategy::Reversal,
                buy_price: new,
                target_price: new + expected_bounce,
                expected_roi: roi.to_f64().unwrap_or(0.0),
            },
        )
        .with_signal(Signal::BuyYes);

        Some(anomaly)
    }

    /// Sharp rise from a low base: buy YES riding toward resolution.
    fn momentum(&self, change: &PriceChange, severity: f64) -> Option<AnomalyDetected> {
        let new = change.new_price;
        if new < MOMENTUM_ZONE_LOW || new > MOMENTUM_ZONE_HIGH {
            debug!(market_id = %change.market_id, "Momentum outside value zone, skipping");
            return None;
        }

        let roi = (Decimal::ONE - new) / new;
        if roi < MOMENTUM_MIN_ROI {
            debug!(market_id = %change.market_id, roi = %roi, "Momentum ROI below floor");
            return None;
        }

        let anomaly = AnomalyDetected::new(
            AnomalyType::PriceSpike,
            change.market_id.clone(),
            format!(
                "Price jumped {:.1}% to {} - momentum entry",
                change.change_percent, new
            ),
            severity,
            AnomalyDetails::PriceSpike {
                old_price: change.old_price,
                new_price: new,
                change_percent: change.change_percent,
                strategy: SpikeStrategy::Momentum,
                buy_price: new,
                target_price: Decimal::ONE,
                expected_roi: roi.to_f64().unwrap_or(0.0),
            },
        )
        .with_signal(Signal::BuyYes);

        Some(anomaly)
    }
}
