//! Whale trade detector.
//!
//! Flags single trades above the large-money threshold and follows the
//! whale's direction when the implied entry still has room to pay. A BUY
//! follows into YES at the trade price; a SELL is read as conviction in NO
//! at the complement price. Big whales get a looser ROI floor.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use scout_common::{AnomalyDetails, AnomalyDetected, AnomalyType, LargeTrade, Side, Signal};

use crate::constants::{
    BIG_WHALE_MIN_ROI, BIG_WHALE_THRESHOLD, VALUE_ZONE_HIGH, VALUE_ZONE_LOW, WHALE_MIN_ROI,
    WHALE_SEVERITY_SCALE, WHALE_THRESHOLD,
};

/// Detects whale trades worth following. Stateless; trade dedup happens in
/// the producer that polls the history feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhaleDetector;

impl WhaleDetector {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one trade.
    pub fn process(&self, trade: &LargeTrade) -> Option<AnomalyDetected> {
        let value = trade.trade_value();
        if value < WHALE_THRESHOLD {
            return None;
        }

        let is_big_whale = value >= BIG_WHALE_THRESHOLD;
        let min_roi = if is_big_whale {
            BIG_WHALE_MIN_ROI
        } else {
            WHALE_MIN_ROI
        };

        // Follow the whale: BUY means YES at the fill price, SELL means NO
        // at the complement
        let (signal, buy_price) = match trade.side {
            Side::Buy => (Signal::BuyYes, trade.price),
            Side::Sell => (Signal::BuyNo, Decimal::ONE - trade.price),
        };

        if buy_price < VALUE_ZONE_LOW || buy_price > VALUE_ZONE_HIGH {
            debug!(market_id = %trade.market_id, %buy_price, "Whale entry outside value zone");
            return None;
        }

        let max_roi = (Decimal::ONE - buy_price) / buy_price;
        if max_roi < min_roi {
            debug!(market_id = %trade.market_id, %max_roi, "Whale entry ROI below floor");
            return None;
        }

        let value_f = value.to_f64().unwrap_or(0.0);
        let anomaly = AnomalyDetected::new(
            AnomalyType::WhaleTrade,
            trade.market_id.clone(),
            format!(
                "{} {} ${} at {} ({})",
                if is_big_whale { "Big whale" } else { "Whale" },
                trade.side,
                value.round(),
                trade.price,
                signal
            ),
            value_f / WHALE_SEVERITY_SCALE,
            AnomalyDetails::WhaleTrade {
                trader_address: trade.trader_address.clone(),
                side: trade.side,
                size: trade.size,
                price: trade.price,
                trade_value: value,
                is_big_whale,
                buy_price,
                max_roi: max_roi.to_f64().unwrap_or(0.0),
            },
        )
        .with_signal(signal);

        Some(anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn trade(side: Side, size: Decimal, price: Decimal) -> LargeTrade {
        LargeTrade {
            market_id: "m1".to_string(),
            trader_address: "0xwhale".to_string(),
            side,
            size,
            price,
            ts: Utc::now(),
        }
    }

    #[test]
    fn test_small_trade_ignored() {
        let detector = WhaleDetector::new();
        // $4,500 notional is below the $10k whale threshold
        assert!(
            detector
                .process(&trade(Side::Buy, dec!(10000), dec!(0.45)))
                .is_none()
        );
    }

    #[test]
    fn test_high_price_entry_rejected() {
        let detector = WhaleDetector::new();
        // $16k BUY at 0.80: outside the value zone, max ROI 25% < 50%
        assert!(
            detector
                .process(&trade(Side::Buy, dec!(20000), dec!(0.80)))
                .is_none()
        );
    }

    #[test]
    fn test_ordinary_whale_emits() {
        let detector = WhaleDetector::new();
        // $15k BUY at 0.20: below the big-whale bar, ROI floor 50%,
        // max ROI (0.80 / 0.20) = 400%
        let anomaly = detector
            .process(&trade(Side::Buy, dec!(75000), dec!(0.20)))
            .unwrap();
        assert_eq!(anomaly.signal, Some(Signal::BuyYes));
        match anomaly.details {
            AnomalyDetails::WhaleTrade {
                is_big_whale,
                max_roi,
                ..
            } => {
                assert!(!is_big_whale);
                assert!((max_roi - 4.0).abs() < 1e-9);
            }
            _ => panic!("Wrong details variant"),
        }
        // severity = 15_000 / 100_000
        assert!((anomaly.severity - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_big_whale_flagged() {
        let detector = WhaleDetector::new();
        // $60k BUY at 0.20
        let anomaly = detector
            .process(&trade(Side::Buy, dec!(300000), dec!(0.20)))
            .unwrap();
        match anomaly.details {
            AnomalyDetails::WhaleTrade { is_big_whale, .. } => assert!(is_big_whale),
            _ => panic!("Wrong details variant"),
        }
        assert!((anomaly.severity - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_sell_reads_as_no_conviction() {
        let detector = WhaleDetector::new();
        // SELL at 0.75: NO at 0.25, max ROI 300%
        let anomaly = detector
            .process(&trade(Side::Sell, dec!(20000), dec!(0.75)))
            .unwrap();
        assert_eq!(anomaly.signal, Some(Signal::BuyNo));
        match anomaly.details {
            AnomalyDetails::WhaleTrade { buy_price, .. } => {
                assert_eq!(buy_price, dec!(0.25));
            }
            _ => panic!("Wrong details variant"),
        }
    }

    #[test]
    fn test_big_whale_looser_roi_floor() {
        let detector = WhaleDetector::new();
        // Entry at 0.70: max ROI ~42.9%, below the 50% ordinary floor
        // but above the 30% big-whale floor
        let ordinary = detector.process(&trade(Side::Buy, dec!(20000), dec!(0.70)));
        assert!(ordinary.is_none());

        let big = detector.process(&trade(Side::Buy, dec!(100000), dec!(0.70)));
        assert!(big.is_some());
    }
}
