//! Shared types for the polyscout anomaly pipeline.
//!
//! This crate contains:
//! - Stream event types (market snapshots, price changes, trades, order
//!   books, news items, crypto ticks)
//! - Anomaly event types with strongly typed per-anomaly payloads
//! - Quality assessment types shared between the scorer and the alerter
//!
//! CRITICAL: All prices and quantities use `rust_decimal::Decimal`.
//! NEVER use f64 for financial math. f64 appears only for severities and
//! relevance scores, which are dimensionless scalars in [0, 1].

pub mod anomaly;
pub mod types;

pub use anomaly::{
    AnomalyDetails, AnomalyDetected, AnomalyType, MarketType, QualityAssessment, Signal,
    SpikeStrategy, SpreadKind, clamp_severity,
};
pub use types::*;
