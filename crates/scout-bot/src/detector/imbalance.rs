//! Order-book imbalance detector.
//!
//! Fires when one side of a deep-enough book holds almost all of the
//! resting depth, provided the market has history and is not chronically
//! one-sided (EWMA of |imbalance| stays under the ceiling). Buy pressure
//! follows into YES at the mid; sell pressure mirrors into NO.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use scout_common::{AnomalyDetails, AnomalyDetected, AnomalyType, OrderBookUpdate, Signal};

use crate::constants::{
    IMBALANCE_CHRONIC_CEILING, IMBALANCE_EWMA_ALPHA, IMBALANCE_MIN_DEPTH, IMBALANCE_MIN_OBSERVATIONS,
    IMBALANCE_MIN_ROI, IMBALANCE_TRIGGER, VALUE_ZONE_HIGH, VALUE_ZONE_LOW,
};
use crate::detector::Ewma;

/// Detects one-sided books worth following.
#[derive(Debug, Default)]
pub struct OrderBookImbalanceDetector {
    baselines: HashMap<String, Ewma>,
}

impl OrderBookImbalanceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one book update, then fold |imbalance| into the baseline.
    pub fn process(&mut self, book: &OrderBookUpdate) -> Option<AnomalyDetected> {
        let baseline = self
            .baselines
            .entry(book.market_id.clone())
            .or_insert_with(|| Ewma::new(IMBALANCE_EWMA_ALPHA));

        let average = baseline.average();
        let observations = baseline.observations();
        let anomaly = detect(book, average, observations);
        baseline.observe(book.imbalance_ratio.abs());
        anomaly
    }
}

fn detect(book: &OrderBookUpdate, average: Decimal, observations: u32) -> Option<AnomalyDetected> {
    let imbalance = book.imbalance_ratio;
    let magnitude = imbalance.abs();

    if magnitude < IMBALANCE_TRIGGER {
        return None;
    }
    if book.total_depth() < IMBALANCE_MIN_DEPTH {
        debug!(market_id = %book.market_id, "Book too thin for imbalance signal");
        return None;
    }
    if observations < IMBALANCE_MIN_OBSERVATIONS {
        return None;
    }
    // Chronically lopsided books carry no information
    if average > IMBALANCE_CHRONIC_CEILING {
        debug!(market_id = %book.market_id, %average, "Book chronically imbalanced, skipping");
        return None;
    }

    // Buy pressure points at YES, sell pressure at NO; both are priced off
    // the mid and must clear the same zone and ROI bars
    let (signal, buy_price) = if imbalance > Decimal::ZERO {
        (Signal::BuyYes, book.mid())
    } else {
        (Signal::BuyNo, Decimal::ONE - book.mid())
    };

    if buy_price < VALUE_ZONE_LOW || buy_price > VALUE_ZONE_HIGH {
        return None;
    }
    let max_roi = (Decimal::ONE - buy_price) / buy_price;
    if max_roi < IMBALANCE_MIN_ROI {
        return None;
    }

    let side = if imbalance > Decimal::ZERO { "bid" } else { "ask" };
    let anomaly = AnomalyDetected::new(
        AnomalyType::OrderBookImbalance,
        book.market_id.clone(),
        format!(
            "Book {:.0}% one-sided on the {} side ({})",
            magnitude * Decimal::ONE_HUNDRED,
            side,
            signal
        ),
        magnitude.to_f64().unwrap_or(0.0),
        AnomalyDetails::OrderBookImbalance {
            imbalance,
            bid_depth: book.bid_depth,
            ask_depth: book.ask_depth,
            buy_price,
            max_roi: max_roi.to_f64().unwrap_or(0.0),
        },
    )
    .with_signal(signal);

    Some(anomaly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn book(bid_depth: Decimal, ask_depth: Decimal) -> OrderBookUpdate {
        OrderBookUpdate::derive(
            "m1".to_string(),
            dec!(0.28),
            dec!(0.32),
            bid_depth,
            ask_depth,
            Utc::now(),
        )
    }

    fn warmed_up(detector: &mut OrderBookImbalanceDetector) {
        // Three balanced observations establish history with a low baseline
        for _ in 0..3 {
            assert!(detector.process(&book(dec!(500), dec!(500))).is_none());
        }
    }

    #[test]
    fn test_requires_observation_history() {
        let mut detector = OrderBookImbalanceDetector::new();
        // 95% one-sided but no history yet
        assert!(detector.process(&book(dec!(975), dec!(25))).is_none());
        assert!(detector.process(&book(dec!(975), dec!(25))).is_none());
        assert!(detector.process(&book(dec!(975), dec!(25))).is_none());
    }

    #[test]
    fn test_buy_pressure_emits_yes() {
        let mut detector = OrderBookImbalanceDetector::new();
        warmed_up(&mut detector);

        let anomaly = detector.process(&book(dec!(975), dec!(25))).unwrap();
        assert_eq!(anomaly.signal, Some(Signal::BuyYes));
        assert_eq!(anomaly.anomaly_type, AnomalyType::OrderBookImbalance);
        assert!((anomaly.severity - 0.95).abs() < 1e-9);
        match anomaly.details {
            AnomalyDetails::OrderBookImbalance { buy_price, .. } => {
                assert_eq!(buy_price, dec!(0.30));
            }
            _ => panic!("Wrong details variant"),
        }
    }

    #[test]
    fn test_sell_pressure_emits_no() {
        let mut detector = OrderBookImbalanceDetector::new();
        warmed_up(&mut detector);

        let anomaly = detector.process(&book(dec!(25), dec!(975))).unwrap();
        assert_eq!(anomaly.signal, Some(Signal::BuyNo));
        match anomaly.details {
            AnomalyDetails::OrderBookImbalance { buy_price, .. } => {
                // NO at 1 - mid = 0.70: zone edge, ROI ~42.9% passes 40%
                assert_eq!(buy_price, dec!(0.70));
            }
            _ => panic!("Wrong details variant"),
        }
    }

    #[test]
    fn test_thin_book_ignored() {
        let mut detector = OrderBookImbalanceDetector::new();
        warmed_up(&mut detector);
        // 95% one-sided but only 400 total depth
        assert!(detector.process(&book(dec!(390), dec!(10))).is_none());
    }

    #[test]
    fn test_mild_imbalance_ignored() {
        let mut detector = OrderBookImbalanceDetector::new();
        warmed_up(&mut detector);
        // 60% one-sided is below the 0.9 trigger
        assert!(detector.process(&book(dec!(800), dec!(200))).is_none());
    }

    #[test]
    fn test_chronically_imbalanced_book_ignored() {
        let mut detector = OrderBookImbalanceDetector::new();
        // Feed lopsided books until the baseline EWMA exceeds the ceiling
        for _ in 0..30 {
            detector.process(&book(dec!(975), dec!(25)));
        }
        // Baseline is now ~0.95 > 0.7: the same extreme book stops firing
        assert!(detector.process(&book(dec!(975), dec!(25))).is_none());
    }
}
