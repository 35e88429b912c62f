//! Anomaly enrichment: signal counting and quality attachment.
//!
//! Every detector emission passes through here before it reaches the bus.
//! The enricher records the emission in a per-market rolling window, then
//! scores the market with the window's signal count and news-catalyst flag
//! attached. Markets the pipeline has never snapshotted cannot be scored
//! and go out without a quality assessment (the alerter drops those).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use scout_common::{AnomalyDetected, AnomalyType, MarketSnapshot};

use crate::quality::{QualityInputs, QualityScorer};

/// Rolling window over which concurrent signals are counted.
const SIGNAL_WINDOW_MINUTES: i64 = 30;
/// Signal count cap fed to the scorer.
const SIGNAL_COUNT_CAP: usize = 5;

/// Per-market record of recent detector emissions.
#[derive(Debug, Default)]
pub struct SignalTracker {
    recent: Mutex<HashMap<String, VecDeque<(DateTime<Utc>, AnomalyType)>>>,
}

impl SignalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an emission and return the window stats including it.
    pub fn record(
        &self,
        market_id: &str,
        anomaly_type: AnomalyType,
        now: DateTime<Utc>,
    ) -> WindowStats {
        let mut recent = self.recent.lock();
        let window = recent.entry(market_id.to_string()).or_default();

        let cutoff = now - Duration::minutes(SIGNAL_WINDOW_MINUTES);
        while window.front().is_some_and(|(ts, _)| *ts < cutoff) {
            window.pop_front();
        }
        window.push_back((now, anomaly_type));

        WindowStats {
            signal_count: window.len().min(SIGNAL_COUNT_CAP) as u8,
            has_news_catalyst: window
                .iter()
                .any(|(_, ty)| *ty == AnomalyType::NewsImpact),
        }
    }
}

/// Stats over a market's signal window.
#[derive(Debug, Clone, Copy)]
pub struct WindowStats {
    pub signal_count: u8,
    pub has_news_catalyst: bool,
}

/// Attaches quality assessments to detector output.
pub struct AnomalyEnricher {
    scorer: QualityScorer,
    tracker: SignalTracker,
}

impl Default for AnomalyEnricher {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyEnricher {
    pub fn new() -> Self {
        Self {
            scorer: QualityScorer::new(),
            tracker: SignalTracker::new(),
        }
    }

    /// Record the emission and attach a quality assessment when the
    /// market's latest snapshot is known.
    pub fn enrich(
        &self,
        anomaly: AnomalyDetected,
        snapshot: Option<&MarketSnapshot>,
        now: DateTime<Utc>,
    ) -> AnomalyDetected {
        let stats = self
            .tracker
            .record(&anomaly.market_id, anomaly.anomaly_type, now);

        let Some(snapshot) = snapshot else {
            return anomaly;
        };

        let inputs = QualityInputs {
            question: &snapshot.question,
            category: snapshot.category.as_deref(),
            end_date: snapshot.end_date,
            volume: snapshot.volume_24h,
            anomaly_signal_count: stats.signal_count,
            has_news_catalyst: stats.has_news_catalyst,
        };
        let quality = self.scorer.score(&inputs, now);
        anomaly.with_quality(quality)
    }
}
