//! Stateful anomaly detectors, one per input stream.
//!
//! Every detector exposes a single `process(&event)` that first evaluates
//! against pre-update state and then folds the observation into its EWMA
//! baselines. Folding both steps into one method keeps the
//! compare-before-update ordering out of the callers' hands.
//!
//! Detector state is keyed by market id and owned exclusively by the
//! consumer task that runs the detector; there is no internal locking.

pub mod crypto;
pub mod divergence;
pub mod imbalance;
pub mod news;
pub mod price_spike;
pub mod spread;
pub mod volume_spike;
pub mod whale;

pub use crypto::CryptoDivergenceDetector;
pub use divergence::MarketDivergenceDetector;
pub use imbalance::OrderBookImbalanceDetector;
pub use news::NewsImpactDetector;
pub use price_spike::PriceSpikeDetector;
pub use spread::SpreadDetector;
pub use volume_spike::VolumeSpikeDetector;
pub use whale::WhaleDetector;

use rust_decimal::Decimal;

/// Exponentially weighted moving average with an observation count.
///
/// Seeded by the first observation, then updated as
/// `avg' = (1 - alpha) * avg + alpha * x`. Before anything was observed
/// the average reads as zero, which is what lets the volume detector stay
/// quiet on a market's first snapshot.
#[derive(Debug, Clone)]
pub(crate) struct Ewma {
    alpha: Decimal,
    average: Option<Decimal>,
    observations: u32,
}

impl Ewma {
    pub fn new(alpha: Decimal) -> Self {
        Self {
            alpha,
            average: None,
            observations: 0,
        }
    }

    /// Fold one observation into the average.
    pub fn observe(&mut self, value: Decimal) {
        self.average = Some(match self.average {
            None => value,
            Some(avg) => (Decimal::ONE - self.alpha) * avg + self.alpha * value,
        });
        self.observations += 1;
    }

    /// Current average (pre-update when called before `observe`).
    pub fn average(&self) -> Decimal {
        self.average.unwrap_or(Decimal::ZERO)
    }

    /// Observations folded in so far.
    pub fn observations(&self) -> u32 {
        self.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ewma_starts_at_zero() {
        let ewma = Ewma::new(dec!(0.1));
        assert_eq!(ewma.average(), Decimal::ZERO);
        assert_eq!(ewma.observations(), 0);
    }

    #[test]
    fn test_ewma_seeds_then_updates() {
        let mut ewma = Ewma::new(dec!(0.1));
        ewma.observe(dec!(100));
        assert_eq!(ewma.average(), dec!(100));
        ewma.observe(dec!(50));
        // 0.9 * 100 + 0.1 * 50
        assert_eq!(ewma.average(), dec!(95));
        assert_eq!(ewma.observations(), 2);
    }

    #[test]
    fn test_ewma_converges_to_constant_input() {
        let mut ewma = Ewma::new(dec!(0.15));
        for _ in 0..200 {
            ewma.observe(dec!(50));
        }
        let diff = (ewma.average() - dec!(50)).abs();
        assert!(diff < dec!(0.001));
    }
}
