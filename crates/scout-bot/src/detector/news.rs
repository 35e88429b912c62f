//! News impact detector.
//!
//! Fires on headlines whose keyword relevance to a tracked market clears
//! the floor. Relevance is computed upstream by the news poller (fraction
//! of the market's question keywords matched by the headline).

use scout_common::{AnomalyDetails, AnomalyDetected, AnomalyType, NewsItem};

use crate::constants::NEWS_MIN_RELEVANCE;

/// Maximum headline characters carried into the description.
const HEADLINE_PREVIEW_CHARS: usize = 80;

/// Detects market-relevant headlines. Stateless; link dedup happens in the
/// news poller.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewsImpactDetector;

impl NewsImpactDetector {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one matched headline.
    pub fn process(&self, item: &NewsItem) -> Option<AnomalyDetected> {
        if item.relevance < NEWS_MIN_RELEVANCE {
            return None;
        }

        let preview: String = item.headline.chars().take(HEADLINE_PREVIEW_CHARS).collect();
        Some(AnomalyDetected::new(
            AnomalyType::NewsImpact,
            item.market_id.clone(),
            format!("News ({:.0}% match): {}", item.relevance * 100.0, preview),
            item.relevance,
            AnomalyDetails::NewsImpact {
                headline: item.headline.clone(),
                source: item.source.clone(),
                url: item.url.clone(),
                relevance: item.relevance,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(relevance: f64, headline: &str) -> NewsItem {
        NewsItem {
            market_id: "m1".to_string(),
            headline: headline.to_string(),
            source: "example.com".to_string(),
            url: "https://example.com/a".to_string(),
            relevance,
            ts: Utc::now(),
        }
    }

    #[test]
    fn test_low_relevance_ignored() {
        let detector = NewsImpactDetector::new();
        assert!(detector.process(&item(0.39, "Bitcoin news")).is_none());
    }

    #[test]
    fn test_relevant_headline_fires() {
        let detector = NewsImpactDetector::new();
        let anomaly = detector
            .process(&item(0.6, "Bitcoin surges past $110,000 on ETF inflows"))
            .unwrap();
        assert_eq!(anomaly.anomaly_type, AnomalyType::NewsImpact);
        assert_eq!(anomaly.severity, 0.6);
        assert!(anomaly.description.contains("Bitcoin surges"));
    }

    #[test]
    fn test_headline_truncated_in_description() {
        let detector = NewsImpactDetector::new();
        let long = "B".repeat(200);
        let anomaly = detector.process(&item(0.8, &long)).unwrap();
        // Description carries at most the 80-char preview plus the prefix
        let preview_len = anomaly
            .description
            .split(": ")
            .nth(1)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        assert_eq!(preview_len, 80);

        // The typed payload keeps the full headline
        match anomaly.details {
            AnomalyDetails::NewsImpact { headline, .. } => {
                assert_eq!(headline.chars().count(), 200)
            }
            _ => panic!("Wrong details variant"),
        }
    }

    #[test]
    fn test_severity_is_relevance_clamped() {
        let detector = NewsImpactDetector::new();
        let anomaly = detector.process(&item(1.4, "everything matched")).unwrap();
        assert_eq!(anomaly.severity, 1.0);
    }
}
