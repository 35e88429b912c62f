//! Auto-bet strategist.
//!
//! The second anomaly subscriber: takes qualified signals above its own
//! score threshold, applies a per-market cooldown, and places an order
//! through the [`OrderPlacer`] seam. The default placer routes into the
//! paper engine; a live CLOB placer would implement the same trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info};

use scout_common::{AnomalyDetected, BetPlaced, Direction};

use crate::paper::PaperTradingEngine;

/// Order-placement seam for the strategist.
#[async_trait]
pub trait OrderPlacer: Send + Sync {
    /// Place an order; `Ok(None)` means the placer declined (policy).
    async fn place(
        &self,
        market_id: &str,
        question: &str,
        direction: Direction,
        price: Decimal,
        quality_score: u8,
        catalyst: &str,
        hours_to_resolution: Option<f64>,
    ) -> Result<Option<BetPlaced>, String>;
}

/// Routes strategist orders into the paper engine.
pub struct PaperOrderPlacer {
    engine: Arc<PaperTradingEngine>,
}

impl PaperOrderPlacer {
    pub fn new(engine: Arc<PaperTradingEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl OrderPlacer for PaperOrderPlacer {
    async fn place(
        &self,
        market_id: &str,
        question: &str,
        direction: Direction,
        price: Decimal,
        quality_score: u8,
        catalyst: &str,
        hours_to_resolution: Option<f64>,
    ) -> Result<Option<BetPlaced>, String> {
        let position = self.engine.try_enter(
            market_id,
            question,
            direction,
            price,
            quality_score,
            catalyst,
            hours_to_resolution,
        );
        Ok(position.map(|p| BetPlaced {
            market_id: p.market_id,
            question: p.question,
            direction: p.direction,
            entry_price: p.entry_price,
            size: p.size,
            quality_score: p.quality_score,
            ts: Utc::now(),
        }))
    }
}

/// Configuration for the strategist.
#[derive(Debug, Clone)]
pub struct AutoBetConfig {
    pub enabled: bool,
    /// Minimum quality score to act on.
    pub min_score: u8,
    /// Per-market cooldown between placements.
    pub cooldown_minutes: i64,
}

impl Default for AutoBetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_score: 75,
            cooldown_minutes: 30,
        }
    }
}

/// Threshold + cooldown subscriber that turns anomalies into orders.
pub struct AutoBetStrategist {
    config: AutoBetConfig,
    placer: Arc<dyn OrderPlacer>,
    last_bet: DashMap<String, DateTime<Utc>>,
}

impl AutoBetStrategist {
    pub fn new(config: AutoBetConfig, placer: Arc<dyn OrderPlacer>) -> Self {
        Self {
            config,
            placer,
            last_bet: DashMap::new(),
        }
    }

    /// Consider one anomaly; returns the placed bet, if any.
    pub async fn consider(&self, anomaly: &AnomalyDetected) -> Option<BetPlaced> {
        self.consider_at(anomaly, Utc::now()).await
    }

    async fn consider_at(&self, anomaly: &AnomalyDetected, now: DateTime<Utc>) -> Option<BetPlaced> {
        if !self.config.enabled {
            return None;
        }

        let signal = anomaly.signal?;
        let quality = anomaly.quality.as_ref()?;
        if !quality.blocks.is_empty() || quality.score < self.config.min_score {
            debug!(market_id = %anomaly.market_id, score = quality.score, "Below auto-bet threshold");
            return None;
        }

        if let Some(last) = self.last_bet.get(&anomaly.market_id)
            && now - *last < Duration::minutes(self.config.cooldown_minutes)
        {
            debug!(market_id = %anomaly.market_id, "Auto-bet cooldown active");
            return None;
        }

        let price = anomaly.buy_price()?;
        let result = self
            .placer
            .place(
                &anomaly.market_id,
                &anomaly.description,
                signal.direction(),
                price,
                quality.score,
                &anomaly.description,
                quality.hours_to_resolution,
            )
            .await;

        match result {
            Ok(Some(bet)) => {
                self.last_bet.insert(anomaly.market_id.clone(), now);
                info!(
                    market_id = %bet.market_id,
                    direction = %bet.direction,
                    size = %bet.size,
                    "Auto-bet placed"
                );
                Some(bet)
            }
            Ok(None) => {
                debug!(market_id = %anomaly.market_id, "Order placer declined");
                None
            }
            Err(e) => {
                tracing::warn!(market_id = %anomaly.market_id, "Order placement failed: {e}");
                None
            }
        }
    }
}
