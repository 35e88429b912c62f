//! Rule-based quality scoring for anomaly signals.
//!
//! Scores a market 0-100 and applies hard blocks; an anomaly is actionable
//! only with score >= 60 and no blocks. Checks interleave with scoring and
//! short-circuit on the first block, returning whatever score accumulated
//! up to that point.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use scout_common::{MarketType, QualityAssessment};

/// Categories that resolve on judgement rather than fact.
const SUBJECTIVE_CATEGORIES: &[&str] = &["awards", "rankings", "ai", "politics"];

/// Question phrases that mark a subjective market.
const SUBJECTIVE_KEYWORDS: &[&str] = &[
    "mvp",
    "dpoy",
    "best",
    "oscar",
    "grammy",
    "emmy",
    "approval rating",
    "ranking",
    "model arena",
    "roty",
    "roy",
    "all-star",
    "pro bowl",
    "hall of fame",
];

/// Question phrases that mark a live sports market.
const SPORTS_KEYWORDS: &[&str] = &[
    "win",
    "beat",
    "score",
    "spread",
    "vs",
    "match",
    "game",
    "fight",
    "serie a",
    "premier league",
    "nba",
    "nfl",
    "mlb",
    "nhl",
    "ufc",
    "champions league",
    "la liga",
    "bundesliga",
];

/// Question phrases that mark a price/macro binary.
const PRICE_KEYWORDS: &[&str] = &[
    "above",
    "below",
    "reach",
    "dip",
    "price",
    "bitcoin",
    "btc",
    "eth",
    "ethereum",
    "sol",
    "s&p",
    "nasdaq",
    "dow",
    "gold",
    "oil",
    "cpi",
    "jobs report",
    "unemployment",
    "fed",
    "rate",
];

/// Inputs to the scorer, gathered by the enrichment stage.
#[derive(Debug, Clone)]
pub struct QualityInputs<'a> {
    pub question: &'a str,
    pub category: Option<&'a str>,
    pub end_date: Option<DateTime<Utc>>,
    /// 24h volume in USD.
    pub volume: Decimal,
    /// Concurrent anomaly signals for this market, capped at 5.
    pub anomaly_signal_count: u8,
    pub has_news_catalyst: bool,
}

/// Rule-based scorer. Stateless; one instance serves the whole process.
#[derive(Debug, Default, Clone, Copy)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a market, short-circuiting on the first hard block.
    pub fn score(&self, inputs: &QualityInputs<'_>, now: DateTime<Utc>) -> QualityAssessment {
        let mut score: u8 = 0;
        let mut reasons = Vec::new();
        let lower = inputs.question.to_lowercase();

        let hours_to_resolution = inputs
            .end_date
            .map(|end| (end - now).num_seconds() as f64 / 3600.0);

        let market_type = classify(&lower, inputs.category);

        let blocked = |score: u8, market_type, hours, reasons: Vec<String>, block: String| {
            QualityAssessment {
                score,
                market_type,
                hours_to_resolution: hours,
                reasons,
                blocks: vec![block],
            }
        };

        // Subjective markets resolve on opinion; never tradable
        if is_subjective(&lower, inputs.category) {
            return blocked(
                score,
                market_type,
                hours_to_resolution,
                reasons,
                "Subjective market (awards/rankings/opinion)".to_string(),
            );
        }

        if inputs.volume < dec!(50000) {
            return blocked(
                score,
                market_type,
                hours_to_resolution,
                reasons,
                format!("Volume ${} below $50k floor", inputs.volume.round()),
            );
        }

        if let Some(hours) = hours_to_resolution {
            if hours <= 0.0 {
                return blocked(
                    score,
                    market_type,
                    hours_to_resolution,
                    reasons,
                    "Market already past its end date".to_string(),
                );
            }
            if hours > 168.0 && !inputs.has_news_catalyst {
                return blocked(
                    score,
                    market_type,
                    hours_to_resolution,
                    reasons,
                    "Resolves in over a week with no catalyst".to_string(),
                );
            }
        }

        // Time component
        match hours_to_resolution {
            Some(h) if h <= 24.0 => {
                score += 30;
                reasons.push("Resolves within 24h: +30".to_string());
            }
            Some(h) if h <= 72.0 => {
                score += 20;
                reasons.push("Resolves within 72h: +20".to_string());
            }
            Some(h) if h <= 168.0 => {
                score += 10;
                reasons.push("Resolves within a week: +10".to_string());
            }
            Some(_) => {}
            None => {
                score += 5;
                reasons.push("No end date: +5".to_string());
            }
        }

        // Market type component
        match market_type {
            MarketType::LiveSports => {
                score += 25;
                reasons.push("Live sports: +25".to_string());
            }
            MarketType::PriceBinary => {
                score += 20;
                reasons.push("Price binary: +20".to_string());
            }
            MarketType::ObjectiveMeasurable => {
                score += 15;
                reasons.push("Objective measurable: +15".to_string());
            }
            MarketType::Unknown => {
                return blocked(
                    score,
                    market_type,
                    hours_to_resolution,
                    reasons,
                    "Unclassifiable market type".to_string(),
                );
            }
        }

        if inputs.volume < dec!(100000) {
            return blocked(
                score,
                market_type,
                hours_to_resolution,
                reasons,
                format!("Volume ${} below $100k", inputs.volume.round()),
            );
        }

        // Volume component
        if inputs.volume >= dec!(1000000) {
            score += 15;
            reasons.push("Volume over $1M: +15".to_string());
        } else if inputs.volume >= dec!(500000) {
            score += 10;
            reasons.push("Volume over $500k: +10".to_string());
        } else {
            score += 5;
            reasons.push("Volume over $100k: +5".to_string());
        }

        if inputs.anomaly_signal_count < 2 {
            return blocked(
                score,
                market_type,
                hours_to_resolution,
                reasons,
                "Fewer than 2 concurrent anomaly signals".to_string(),
            );
        }

        // Signal component
        if inputs.anomaly_signal_count >= 3 {
            score += 30;
            reasons.push(format!(
                "{} concurrent signals: +30",
                inputs.anomaly_signal_count
            ));
        } else {
            score += 15;
            reasons.push("2 concurrent signals: +15".to_string());
        }

        QualityAssessment {
            score,
            market_type,
            hours_to_resolution,
            reasons,
            blocks: Vec::new(),
        }
    }
}

/// First classification match wins: sports, then price, then "Will ".
fn classify(lower_question: &str, category: Option<&str>) -> MarketType {
    let category_lower = category.map(|c| c.to_lowercase());

    if category_lower.as_deref() == Some("sports")
        || SPORTS_KEYWORDS.iter().any(|kw| lower_question.contains(kw))
    {
        return MarketType::LiveSports;
    }
    if PRICE_KEYWORDS.iter().any(|kw| lower_question.contains(kw)) {
        return MarketType::PriceBinary;
    }
    if lower_question.starts_with("will ") {
        return MarketType::ObjectiveMeasurable;
    }
    MarketType::Unknown
}

fn is_subjective(lower_question: &str, category: Option<&str>) -> bool {
    if let Some(category) = category
        && SUBJECTIVE_CATEGORIES.contains(&category.to_lowercase().as_str())
    {
        return true;
    }
    SUBJECTIVE_KEYWORDS
        .iter()
        .any(|kw| lower_question.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn inputs<'a>(question: &'a str, category: Option<&'a str>) -> QualityInputs<'a> {
        QualityInputs {
            question,
            category,
            end_date: None,
            volume: dec!(800000),
            anomaly_signal_count: 3,
            has_news_catalyst: false,
        }
    }

    #[test]
    fn test_crypto_market_scores_without_end_date() {
        let scorer = QualityScorer::new();
        let q = inputs("Will Bitcoin be above $110,000 on March 31, 2026?", Some("crypto"));
        let result = scorer.score(&q, now());

        // +5 no end date, +20 price binary, +10 volume >= 500k, +30 signals
        assert_eq!(result.score, 65);
        assert_eq!(result.market_type, MarketType::PriceBinary);
        assert!(result.blocks.is_empty());
        assert!(result.is_actionable());
    }

    #[test]
    fn test_low_volume_blocks_with_zero_score() {
        let scorer = QualityScorer::new();
        let mut q = inputs("Will the Lakers win the game tonight?", Some("sports"));
        q.volume = dec!(40000);
        q.end_date = Some(now() + Duration::hours(6));

        let result = scorer.score(&q, now());
        assert_eq!(result.score, 0);
        assert_eq!(result.blocks.len(), 1);
        assert!(!result.is_actionable());
    }

    #[test]
    fn test_subjective_category_blocks() {
        let scorer = QualityScorer::new();
        let q = inputs("Will the model win the arena?", Some("AI"));
        let result = scorer.score(&q, now());
        assert!(!result.blocks.is_empty());
        assert!(!result.is_actionable());
    }

    #[test]
    fn test_subjective_keyword_blocks() {
        let scorer = QualityScorer::new();
        let q = inputs("Who will win NBA MVP this season?", Some("sports"));
        let result = scorer.score(&q, now());
        assert!(!result.is_actionable());
        assert!(result.blocks[0].contains("Subjective"));
    }

    #[test]
    fn test_past_end_date_blocks() {
        let scorer = QualityScorer::new();
        let mut q = inputs("Will BTC be above $100k?", Some("crypto"));
        q.end_date = Some(now() - Duration::hours(1));
        let result = scorer.score(&q, now());
        assert!(result.blocks[0].contains("past"));
    }

    #[test]
    fn test_far_resolution_needs_catalyst() {
        let scorer = QualityScorer::new();
        let mut q = inputs("Will BTC be above $100k?", Some("crypto"));
        q.end_date = Some(now() + Duration::days(30));

        let blocked = scorer.score(&q, now());
        assert!(!blocked.is_actionable());

        q.has_news_catalyst = true;
        let allowed = scorer.score(&q, now());
        assert!(allowed.blocks.is_empty());
        // No time points past a week, but the rest still scores
        assert_eq!(allowed.score, 60);
    }

    #[test]
    fn test_max_score_live_sports() {
        let scorer = QualityScorer::new();
        let mut q = inputs("Will the Lakers beat the Celtics?", Some("sports"));
        q.end_date = Some(now() + Duration::hours(5));
        q.volume = dec!(1500000);
        q.anomaly_signal_count = 4;

        let result = scorer.score(&q, now());
        // +30 time, +25 sports, +15 volume, +30 signals
        assert_eq!(result.score, 100);
        assert!(result.is_actionable());
    }

    #[test]
    fn test_unknown_type_blocks() {
        let scorer = QualityScorer::new();
        let mut q = inputs("Something strange happens tomorrow?", None);
        q.end_date = Some(now() + Duration::hours(12));
        let result = scorer.score(&q, now());
        assert_eq!(result.market_type, MarketType::Unknown);
        assert!(!result.is_actionable());
        // Time points accumulated before the block short-circuited
        assert_eq!(result.score, 30);
    }

    #[test]
    fn test_single_signal_blocks() {
        let scorer = QualityScorer::new();
        let mut q = inputs("Will BTC be above $100k?", Some("crypto"));
        q.anomaly_signal_count = 1;
        let result = scorer.score(&q, now());
        assert!(result.blocks[0].contains("concurrent"));
        // +5 no end date, +20 type, +10 volume
        assert_eq!(result.score, 35);
    }

    #[test]
    fn test_two_signals_score_fifteen() {
        let scorer = QualityScorer::new();
        let mut q = inputs("Will BTC be above $100k?", Some("crypto"));
        q.anomaly_signal_count = 2;
        let result = scorer.score(&q, now());
        assert_eq!(result.score, 50);
        assert!(result.blocks.is_empty());
        // 50 < 60: clean but not actionable
        assert!(!result.is_actionable());
    }

    #[test]
    fn test_will_prefix_is_objective() {
        assert_eq!(
            classify("will the launch happen on schedule?", None),
            MarketType::ObjectiveMeasurable
        );
    }
}
