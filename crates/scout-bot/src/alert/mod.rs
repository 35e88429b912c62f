//! Alert dispatcher.
//!
//! Consumes qualified anomalies and walks them through the shedding gates
//! in order: severity floor, quality/signal hard gate, durable daily rate
//! limit, per-(market, type) dedup, per-minute throttle. Survivors resolve
//! a market name, take a paper position, get formatted, and go out through
//! the transport; the daily counter commits only after a successful send,
//! so a transport failure costs a portfolio slot but never a rate-limit
//! slot.

pub mod dedup;
pub mod format;
pub mod rate_limit;

pub use dedup::{DedupMap, MinuteThrottle};
pub use format::{AlertContext, build_message, html_escape};
pub use rate_limit::{RateLimitState, RateLimitVerdict, RateLimiter};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use scout_common::AnomalyDetected;
use scout_feeds::TelegramClient;

use crate::caches::MarketNameResolver;
use crate::constants::ACTIONABLE_SCORE;
use crate::paper::PaperTradingEngine;

/// Outbound transport seam; the production implementation is Telegram.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), String>;
}

#[async_trait]
impl AlertTransport for TelegramClient {
    async fn send(&self, message: &str) -> Result<(), String> {
        self.send_html(message).await.map_err(|e| e.to_string())
    }
}

/// Transport that only logs; used for dry runs and when no chat is
/// configured.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl AlertTransport for LogTransport {
    async fn send(&self, message: &str) -> Result<(), String> {
        info!("ALERT (dry run):\n{message}");
        Ok(())
    }
}

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct AlertingConfig {
    /// Anomalies below this severity are never alerted.
    pub min_severity: f64,
    /// Dedup cooldown per (market, type).
    pub dedup_minutes: i64,
    /// Alerts allowed in any rolling 60 seconds.
    pub max_per_minute: usize,
    /// Path of the durable rate-limit file.
    pub rate_limit_file: PathBuf,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            min_severity: 0.3,
            dedup_minutes: 15,
            max_per_minute: crate::constants::ALERTS_PER_MINUTE,
            rate_limit_file: PathBuf::from("data/rate_limit.json"),
        }
    }
}

/// In-memory shedding state behind one lock; the rate-limit file is the
/// durable part.
#[derive(Debug)]
struct Gates {
    rate_limiter: RateLimiter,
    dedup: DedupMap,
    throttle: MinuteThrottle,
}

/// Why a dispatch call did not transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    BelowSeverityFloor,
    NotActionable,
    RateLimited,
    Duplicate,
    Throttled,
    TransportFailed,
}

/// The single mutation point for alert delivery.
pub struct AlertDispatcher {
    config: AlertingConfig,
    gates: Mutex<Gates>,
    paper: Arc<PaperTradingEngine>,
    names: Arc<MarketNameResolver>,
    transport: Arc<dyn AlertTransport>,
}

impl AlertDispatcher {
    pub fn new(
        config: AlertingConfig,
        paper: Arc<PaperTradingEngine>,
        names: Arc<MarketNameResolver>,
        transport: Arc<dyn AlertTransport>,
    ) -> Self {
        let rate_limiter = RateLimiter::load(&config.rate_limit_file, Utc::now());
        let dedup = DedupMap::new(Duration::minutes(config.dedup_minutes));
        let throttle = MinuteThrottle::new(config.max_per_minute);
        Self {
            config,
            gates: Mutex::new(Gates {
                rate_limiter,
                dedup,
                throttle,
            }),
            paper,
            names,
            transport,
        }
    }

    /// Run one anomaly through the gates and, if it survives, out the
    /// transport.
    pub async fn dispatch(&self, anomaly: &AnomalyDetected) -> DispatchOutcome {
        let now = Utc::now();

        if anomaly.severity < self.config.min_severity {
            debug!(market_id = %anomaly.market_id, severity = anomaly.severity, "Below severity floor");
            return DispatchOutcome::BelowSeverityFloor;
        }

        // Hard gate: an actionable quality assessment and a buy signal
        let Some(signal) = anomaly.signal else {
            debug!(market_id = %anomaly.market_id, "No actionable signal");
            return DispatchOutcome::NotActionable;
        };
        let Some(quality) = anomaly.quality.as_ref() else {
            debug!(market_id = %anomaly.market_id, "No quality assessment");
            return DispatchOutcome::NotActionable;
        };
        if quality.score < ACTIONABLE_SCORE || !quality.blocks.is_empty() {
            debug!(market_id = %anomaly.market_id, score = quality.score, "Quality below the actionable bar");
            return DispatchOutcome::NotActionable;
        }

        // Shedding gates, checked under one lock but not yet committed
        {
            let mut gates = self.gates.lock();
            match gates.rate_limiter.check(now) {
                RateLimitVerdict::Allowed => {}
                verdict => {
                    debug!(market_id = %anomaly.market_id, ?verdict, "Rate limited");
                    return DispatchOutcome::RateLimited;
                }
            }
            if gates.dedup.is_duplicate(&anomaly.market_id, anomaly.anomaly_type, now) {
                debug!(market_id = %anomaly.market_id, "Duplicate alert inside cooldown");
                return DispatchOutcome::Duplicate;
            }
            if !gates.throttle.allows(now) {
                debug!(market_id = %anomaly.market_id, "Per-minute throttle");
                return DispatchOutcome::Throttled;
            }
        }

        // Side effects in contract order: resolve name, consume a paper
        // slot, format, transport, then commit the rate limit
        let resolved = self.names.resolve(&anomaly.market_id).await;
        let question = resolved
            .as_ref()
            .map(|r| r.question.clone())
            .unwrap_or_else(|| anomaly.market_id.clone());
        let url = resolved.as_ref().and_then(|r| r.url.clone());

        let position = anomaly.buy_price().and_then(|buy_price| {
            self.paper.try_enter(
                &anomaly.market_id,
                &question,
                signal.direction(),
                buy_price,
                quality.score,
                &anomaly.description,
                quality.hours_to_resolution,
            )
        });

        let context = AlertContext {
            question: Some(question),
            url,
            balance: Some(self.paper.balance()),
            open_count: Some(self.paper.open_count()),
            position,
        };
        let message = build_message(anomaly, &context);

        if let Err(e) = self.transport.send(&message).await {
            warn!(market_id = %anomaly.market_id, "Alert transport failed: {e}");
            return DispatchOutcome::TransportFailed;
        }

        let mut gates = self.gates.lock();
        gates.dedup.record(&anomaly.market_id, anomaly.anomaly_type, now);
        gates.throttle.record(now);
        gates.rate_limiter.commit(now);
        info!(
            market_id = %anomaly.market_id,
            anomaly_type = %anomaly.anomaly_type,
            today = gates.rate_limiter.today_count(),
            "Alert sent"
        );
        DispatchOutcome::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperConfig;
    use rust_decimal_macros::dec;
    use scout_common::{AnomalyDetails, AnomalyType, MarketType, QualityAssessment, Signal};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AlertTransport for CountingTransport {
        async fn send(&self, _message: &str) -> Result<(), String> {
            if self.fail {
                return Err("boom".to_string());
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("scout_dispatcher_tests")
            .join(format!("{}_{}.json", name, std::process::id()))
    }

    fn dispatcher(name: &str, fail: bool) -> (AlertDispatcher, Arc<CountingTransport>) {
        let rate_path = temp_file(&format!("{name}_rate"));
        let paper_path = temp_file(&format!("{name}_paper"));
        let _ = std::fs::remove_file(&rate_path);
        let _ = std::fs::remove_file(&paper_path);

        let transport = Arc::new(CountingTransport {
            sent: AtomicUsize::new(0),
            fail,
        });
        let paper = Arc::new(PaperTradingEngine::new(PaperConfig {
            starting_balance: dec!(1000),
            trades_file: paper_path,
        }));
        let dispatcher = AlertDispatcher::new(
            AlertingConfig {
                min_severity: 0.2,
                dedup_minutes: 15,
                max_per_minute: 10,
                rate_limit_file: rate_path,
            },
            paper,
            Arc::new(MarketNameResolver::new(None)),
            transport.clone(),
        );
        (dispatcher, transport)
    }

    fn qualified(market_id: &str, severity: f64) -> AnomalyDetected {
        AnomalyDetected::new(
            AnomalyType::WhaleTrade,
            market_id,
            "Whale BUY $15000 at 0.20 (BUY YES)",
            severity,
            AnomalyDetails::WhaleTrade {
                trader_address: "0xw".to_string(),
                side: scout_common::Side::Buy,
                size: dec!(75000),
                price: dec!(0.20),
                trade_value: dec!(15000),
                is_big_whale: false,
                buy_price: dec!(0.20),
                max_roi: 4.0,
            },
        )
        .with_signal(Signal::BuyYes)
        .with_quality(QualityAssessment {
            score: 85,
            market_type: MarketType::PriceBinary,
            hours_to_resolution: Some(24.0),
            reasons: vec!["test: +85".to_string()],
            blocks: vec![],
        })
    }

    #[tokio::test]
    async fn test_severity_floor() {
        let (dispatcher, transport) = dispatcher("severity", false);
        let outcome = dispatcher.dispatch(&qualified("m1", 0.1)).await;
        assert_eq!(outcome, DispatchOutcome::BelowSeverityFloor);
        assert_eq!(transport.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_actionable_without_quality() {
        let (dispatcher, _) = dispatcher("quality", false);
        let mut anomaly = qualified("m1", 0.9);
        anomaly.quality = None;
        assert_eq!(
            dispatcher.dispatch(&anomaly).await,
            DispatchOutcome::NotActionable
        );

        let mut anomaly = qualified("m1", 0.9);
        anomaly.signal = None;
        assert_eq!(
            dispatcher.dispatch(&anomaly).await,
            DispatchOutcome::NotActionable
        );
    }

    #[tokio::test]
    async fn test_sent_consumes_paper_slot_and_rate_slot() {
        let (dispatcher, transport) = dispatcher("sent", false);
        let outcome = dispatcher.dispatch(&qualified("m1", 0.9)).await;
        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(transport.sent.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.paper.open_count(), 1);
        assert_eq!(dispatcher.gates.lock().rate_limiter.today_count(), 1);
    }

    #[tokio::test]
    async fn test_second_alert_inside_gap_rate_limited() {
        let (dispatcher, transport) = dispatcher("gap", false);
        assert_eq!(
            dispatcher.dispatch(&qualified("m1", 0.9)).await,
            DispatchOutcome::Sent
        );
        // Different market, immediately after: the 30-minute gap sheds it
        assert_eq!(
            dispatcher.dispatch(&qualified("m2", 0.9)).await,
            DispatchOutcome::RateLimited
        );
        assert_eq!(transport.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_consumes_slot_but_not_rate_limit() {
        let (dispatcher, _) = dispatcher("fail", true);
        let outcome = dispatcher.dispatch(&qualified("m1", 0.9)).await;
        assert_eq!(outcome, DispatchOutcome::TransportFailed);
        // Portfolio slot consumed by design; rate-limit slot untouched
        assert_eq!(dispatcher.paper.open_count(), 1);
        assert_eq!(dispatcher.gates.lock().rate_limiter.today_count(), 0);
    }
}
