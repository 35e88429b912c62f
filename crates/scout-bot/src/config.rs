//! Configuration for scout-bot.
//!
//! Supports loading from a TOML file with environment variable overrides
//! for credentials and paths. Every section falls back to defaults so the
//! bot can start from an empty file in dry-run mode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::alert::AlertingConfig;
use crate::autobet::AutoBetConfig;
use crate::paper::PaperConfig;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Logging level.
    pub log_level: String,

    /// Alert dispatcher settings.
    pub alerting: AlertingConfig,

    /// Paper engine settings.
    pub paper: PaperConfig,

    /// Auto-bet strategist settings.
    pub autobet: AutoBetConfig,

    /// Feed endpoints and polling cadence.
    pub feeds: FeedsConfig,

    /// Outbound chat credentials.
    pub telegram: TelegramSettings,
}

/// Feed endpoints and polling cadence.
#[derive(Debug, Clone)]
pub struct FeedsConfig {
    /// Market metadata API base URL.
    pub catalog_base_url: String,
    /// Trade history API base URL.
    pub data_api_base_url: String,
    /// Order-book REST API base URL.
    pub clob_base_url: String,
    /// Combined crypto ticker stream URL.
    pub crypto_ws_url: String,
    /// RSS feed URLs for the news poller.
    pub news_feed_urls: Vec<String>,
    /// Catalog sync interval.
    pub market_sync_interval: Duration,
    /// Whale-tracker poll interval.
    pub whale_poll_interval: Duration,
    /// Order-book scan interval.
    pub book_poll_interval: Duration,
    /// News poll interval.
    pub news_poll_interval: Duration,
    /// Position-tracker check interval.
    pub position_check_interval: Duration,
    /// Markets polled for trades/books per cycle, by volume.
    pub tracked_market_limit: usize,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: "https://gamma-api.polymarket.com".to_string(),
            data_api_base_url: "https://data-api.polymarket.com".to_string(),
            clob_base_url: "https://clob.polymarket.com".to_string(),
            crypto_ws_url: "wss://stream.binance.com:9443/stream".to_string(),
            news_feed_urls: vec![
                "https://www.coindesk.com/arc/outboundfeeds/rss/".to_string(),
                "https://cointelegraph.com/rss".to_string(),
            ],
            market_sync_interval: Duration::from_secs(60),
            whale_poll_interval: Duration::from_secs(45),
            book_poll_interval: Duration::from_secs(30),
            news_poll_interval: Duration::from_secs(300),
            position_check_interval: Duration::from_secs(60),
            tracked_market_limit: 30,
        }
    }
}

/// Outbound chat credentials; absent means dry-run logging.
#[derive(Debug, Clone, Default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramSettings {
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            alerting: AlertingConfig::default(),
            paper: PaperConfig::default(),
            autobet: AutoBetConfig::default(),
            feeds: FeedsConfig::default(),
            telegram: TelegramSettings::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        Ok(Self::from(file))
    }

    /// Apply environment variable overrides for credentials and paths.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Ok(severity) = std::env::var("SCOUT_MIN_SEVERITY")
            && let Ok(value) = severity.parse::<f64>()
        {
            self.alerting.min_severity = value;
        }
        if let Ok(balance) = std::env::var("SCOUT_STARTING_BALANCE")
            && let Ok(value) = balance.parse::<Decimal>()
        {
            self.paper.starting_balance = value;
        }
        if let Ok(path) = std::env::var("SCOUT_TRADES_FILE") {
            self.paper.trades_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SCOUT_RATE_LIMIT_FILE") {
            self.alerting.rate_limit_file = PathBuf::from(path);
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alerting.min_severity) {
            bail!(
                "alerting.min_severity must be in [0, 1], got {}",
                self.alerting.min_severity
            );
        }
        if self.alerting.dedup_minutes <= 0 {
            bail!("alerting.dedup_minutes must be positive");
        }
        if self.alerting.max_per_minute == 0 {
            bail!("alerting.max_per_minute must be positive");
        }
        if self.paper.starting_balance <= Decimal::ZERO {
            bail!("paper.starting_balance must be positive");
        }
        if self.autobet.enabled && self.autobet.min_score < 60 {
            bail!("autobet.min_score below 60 would bet on non-actionable signals");
        }
        if self.feeds.tracked_market_limit == 0 {
            bail!("feeds.tracked_market_limit must be positive");
        }
        Ok(())
    }
}

// TOML mirror types: every field optional, defaults applied on conversion.

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    log_level: Option<String>,
    #[serde(default)]
    alerting: TomlAlerting,
    #[serde(default)]
    paper: TomlPaper,
    #[serde(default)]
    autobet: TomlAutoBet,
    #[serde(default)]
    feeds: TomlFeeds,
    #[serde(default)]
    telegram: TomlTelegram,
}

#[derive(Debug, Default, Deserialize)]
struct TomlAlerting {
    min_severity: Option<f64>,
    dedup_minutes: Option<i64>,
    max_per_minute: Option<usize>,
    rate_limit_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlPaper {
    starting_balance: Option<Decimal>,
    trades_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlAutoBet {
    enabled: Option<bool>,
    min_score: Option<u8>,
    cooldown_minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlFeeds {
    catalog_base_url: Option<String>,
    data_api_base_url: Option<String>,
    clob_base_url: Option<String>,
    crypto_ws_url: Option<String>,
    news_feed_urls: Option<Vec<String>>,
    market_sync_secs: Option<u64>,
    whale_poll_secs: Option<u64>,
    book_poll_secs: Option<u64>,
    news_poll_secs: Option<u64>,
    position_check_secs: Option<u64>,
    tracked_market_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlTelegram {
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl From<TomlConfig> for BotConfig {
    fn from(file: TomlConfig) -> Self {
        let defaults = BotConfig::default();
        let feed_defaults = FeedsConfig::default();

        Self {
            log_level: file.log_level.unwrap_or(defaults.log_level),
            alerting: AlertingConfig {
                min_severity: file
                    .alerting
                    .min_severity
                    .unwrap_or(defaults.alerting.min_severity),
                dedup_minutes: file
                    .alerting
                    .dedup_minutes
                    .unwrap_or(defaults.alerting.dedup_minutes),
                max_per_minute: file
                    .alerting
                    .max_per_minute
                    .unwrap_or(defaults.alerting.max_per_minute),
                rate_limit_file: file
                    .alerting
                    .rate_limit_file
                    .unwrap_or(defaults.alerting.rate_limit_file),
            },
            paper: PaperConfig {
                starting_balance: file
                    .paper
                    .starting_balance
                    .unwrap_or(defaults.paper.starting_balance),
                trades_file: file.paper.trades_file.unwrap_or(defaults.paper.trades_file),
            },
            autobet: AutoBetConfig {
                enabled: file.autobet.enabled.unwrap_or(defaults.autobet.enabled),
                min_score: file.autobet.min_score.unwrap_or(defaults.autobet.min_score),
                cooldown_minutes: file
                    .autobet
                    .cooldown_minutes
                    .unwrap_or(defaults.autobet.cooldown_minutes),
            },
            feeds: FeedsConfig {
                catalog_base_url: file
                    .feeds
                    .catalog_base_url
                    .unwrap_or(feed_defaults.catalog_base_url),
                data_api_base_url: file
                    .feeds
                    .data_api_base_url
                    .unwrap_or(feed_defaults.data_api_base_url),
                clob_base_url: file
                    .feeds
                    .clob_base_url
                    .unwrap_or(feed_defaults.clob_base_url),
                crypto_ws_url: file
                    .feeds
                    .crypto_ws_url
                    .unwrap_or(feed_defaults.crypto_ws_url),
                news_feed_urls: file
                    .feeds
                    .news_feed_urls
                    .unwrap_or(feed_defaults.news_feed_urls),
                market_sync_interval: file
                    .feeds
                    .market_sync_secs
                    .map(Duration::from_secs)
                    .unwrap_or(feed_defaults.market_sync_interval),
                whale_poll_interval: file
                    .feeds
                    .whale_poll_secs
                    .map(Duration::from_secs)
                    .unwrap_or(feed_defaults.whale_poll_interval),
                book_poll_interval: file
                    .feeds
                    .book_poll_secs
                    .map(Duration::from_secs)
                    .unwrap_or(feed_defaults.book_poll_interval),
                news_poll_interval: file
                    .feeds
                    .news_poll_secs
                    .map(Duration::from_secs)
                    .unwrap_or(feed_defaults.news_poll_interval),
                position_check_interval: file
                    .feeds
                    .position_check_secs
                    .map(Duration::from_secs)
                    .unwrap_or(feed_defaults.position_check_interval),
                tracked_market_limit: file
                    .feeds
                    .tracked_market_limit
                    .unwrap_or(feed_defaults.tracked_market_limit),
            },
            telegram: TelegramSettings {
                bot_token: file.telegram.bot_token,
                chat_id: file.telegram.chat_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = BotConfig::from_toml_str("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.paper.starting_balance, dec!(1000));
        assert_eq!(config.alerting.dedup_minutes, 15);
        assert!(!config.autobet.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_toml() {
        let toml = r#"
            log_level = "debug"

            [alerting]
            min_severity = 0.5
            dedup_minutes = 20
            rate_limit_file = "/tmp/rl.json"

            [paper]
            starting_balance = "2500"
            trades_file = "/tmp/trades.json"

            [autobet]
            enabled = true
            min_score = 80
            cooldown_minutes = 45

            [feeds]
            market_sync_secs = 120
            tracked_market_limit = 10
            news_feed_urls = ["https://example.com/rss"]

            [telegram]
            bot_token = "123:abc"
            chat_id = "-100"
        "#;

        let config = BotConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.alerting.min_severity, 0.5);
        assert_eq!(config.paper.starting_balance, dec!(2500));
        assert!(config.autobet.enabled);
        assert_eq!(config.autobet.min_score, 80);
        assert_eq!(config.feeds.market_sync_interval, Duration::from_secs(120));
        assert_eq!(config.feeds.news_feed_urls.len(), 1);
        assert!(config.telegram.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = BotConfig::default();
        config.alerting.min_severity = 1.5;
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.paper.starting_balance = dec!(-5);
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.autobet.enabled = true;
        config.autobet.min_score = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(BotConfig::from_toml_str("log_level = [").is_err());
    }
}
