//! Prediction-market anomaly scanner.
//!
//! This crate implements the analytics and decisioning core: per-stream
//! anomaly detectors, a log-normal fair-value model with a question
//! parser, a rule-based quality scorer, a paper-trading engine with
//! durable state, and a rate-limited alert dispatcher.
//!
//! ## Architecture
//!
//! - **Event bus**: typed broadcast topics fan events out to independent
//!   consumers; subscribers are individually idempotent
//! - **Detectors**: per-market EWMA state owned exclusively by one
//!   consumer task each, compare-before-update folded into `process()`
//! - **Decision layer**: enrichment attaches a quality score; the alerter
//!   and the auto-bet strategist gate on it independently
//! - **Durability**: paper state and the daily alert counter persist as
//!   pretty-printed JSON and survive restarts
//!
//! ## Modules
//!
//! - `config`: TOML configuration with env overrides
//! - `bus`: in-process pub/sub topics
//! - `detector`: the eight stream detectors
//! - `fair_value` / `question`: model-implied probability and the
//!   question parser feeding it
//! - `quality`: rule-based 0-100 scoring with hard blocks
//! - `paper`: portfolio simulator and its persistence
//! - `alert`: shedding gates, formatting, transport
//! - `autobet`: threshold + cooldown order placement
//! - `pipeline`: producer/consumer task wiring

pub mod alert;
pub mod autobet;
pub mod bus;
pub mod caches;
pub mod config;
pub mod constants;
pub mod detector;
pub mod enrich;
pub mod fair_value;
pub mod paper;
pub mod pipeline;
pub mod quality;
pub mod question;

pub use alert::{
    AlertContext, AlertDispatcher, AlertTransport, AlertingConfig, DedupMap, DispatchOutcome,
    LogTransport, MinuteThrottle, RateLimitState, RateLimitVerdict, RateLimiter, build_message,
    html_escape,
};
pub use autobet::{AutoBetConfig, AutoBetStrategist, OrderPlacer, PaperOrderPlacer};
pub use bus::{DEFAULT_TOPIC_CAPACITY, EventBus};
pub use caches::{
    CachedCryptoMarket, CryptoMarketCache, MarketNameResolver, ResolvedMarket, SeenSet,
};
pub use config::{BotConfig, FeedsConfig, TelegramSettings};
pub use detector::{
    CryptoDivergenceDetector, MarketDivergenceDetector, NewsImpactDetector,
    OrderBookImbalanceDetector, PriceSpikeDetector, SpreadDetector, VolumeSpikeDetector,
    WhaleDetector,
};
pub use enrich::{AnomalyEnricher, SignalTracker, WindowStats};
pub use fair_value::{normal_cdf, probability_above, probability_below, years_from_days};
pub use paper::{
    DailyReport, PaperConfig, PaperPosition, PaperState, PaperStore, PaperTrade,
    PaperTradingEngine,
};
pub use pipeline::{PipelineContext, SharedMarketIndex};
pub use quality::{QualityInputs, QualityScorer};
pub use question::CryptoMarketMatcher;
