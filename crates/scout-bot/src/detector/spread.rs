//! Spread detector.
//!
//! Flags books whose bid-ask spread is wide in absolute terms (>= 0.10) or
//! a multiple of the market's own baseline (>= 3x the EWMA). Informational
//! only - spread anomalies carry no entry signal.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use scout_common::{AnomalyDetails, AnomalyDetected, AnomalyType, OrderBookUpdate, SpreadKind};

use crate::constants::{
    SPREAD_EWMA_ALPHA, SPREAD_MIN_OBSERVATIONS, SPREAD_SPIKE_RATIO, SPREAD_SPIKE_SEVERITY_SCALE,
    SPREAD_WIDE_SEVERITY_SCALE, SPREAD_WIDE_THRESHOLD,
};
use crate::detector::Ewma;

/// Detects abnormal spreads per market.
#[derive(Debug, Default)]
pub struct SpreadDetector {
    baselines: HashMap<String, Ewma>,
}

impl SpreadDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one book update, then fold the spread into the baseline.
    pub fn process(&mut self, book: &OrderBookUpdate) -> Option<AnomalyDetected> {
        let baseline = self
            .baselines
            .entry(book.market_id.clone())
            .or_insert_with(|| Ewma::new(SPREAD_EWMA_ALPHA));

        let average = baseline.average();
        let observations = baseline.observations();
        let anomaly = detect(book, average, observations);
        baseline.observe(book.spread);
        anomaly
    }
}

fn detect(book: &OrderBookUpdate, average: Decimal, observations: u32) -> Option<AnomalyDetected> {
    if observations < SPREAD_MIN_OBSERVATIONS {
        return None;
    }

    let spread = book.spread;

    if spread >= SPREAD_WIDE_THRESHOLD {
        let severity = spread.to_f64().unwrap_or(0.0) / SPREAD_WIDE_SEVERITY_SCALE;
        return Some(build(book, average, SpreadKind::Wide, severity));
    }

    if average > Decimal::ZERO {
        let ratio = spread / average;
        if ratio >= SPREAD_SPIKE_RATIO {
            let severity = ratio.to_f64().unwrap_or(0.0) / SPREAD_SPIKE_SEVERITY_SCALE;
            return Some(build(book, average, SpreadKind::Spike, severity));
        }
    }

    None
}

fn build(
    book: &OrderBookUpdate,
    average: Decimal,
    kind: SpreadKind,
    severity: f64,
) -> AnomalyDetected {
    let description = match kind {
        SpreadKind::Wide => format!("Wide spread {} (bid {} / ask {})", book.spread, book.best_bid, book.best_ask),
        SpreadKind::Spike => format!("Spread {} is {:.1}x its average {}", book.spread, book.spread / average, average),
    };

    AnomalyDetected::new(
        AnomalyType::SpreadAnomaly,
        book.market_id.clone(),
        description,
        severity,
        AnomalyDetails::SpreadAnomaly {
            spread: book.spread,
            average_spread: average,
            kind,
        },
    )
}
