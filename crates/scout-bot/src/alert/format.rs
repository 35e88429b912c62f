//! Alert message assembly.
//!
//! Builds the HTML chat message for a qualified anomaly: quality header,
//! escaped question, market type and resolution time, model context for
//! divergence signals, score breakdown, catalyst, signal line, the paper
//! trade taken, and the venue link.

use rust_decimal::Decimal;

use scout_common::{AnomalyDetails, AnomalyDetected, QualityAssessment};

use crate::paper::PaperPosition;

/// Everything the formatter needs beyond the anomaly itself.
#[derive(Debug, Clone, Default)]
pub struct AlertContext {
    /// Resolved market question (falls back to the market id).
    pub question: Option<String>,
    /// Venue URL for the market.
    pub url: Option<String>,
    /// Paper position opened for this signal, if any.
    pub position: Option<PaperPosition>,
    /// Engine balance after the entry.
    pub balance: Option<Decimal>,
    /// Open position count after the entry.
    pub open_count: Option<usize>,
}

/// Escape text for Telegram HTML parse mode.
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Quality emoji ladder.
fn quality_emoji(score: u8) -> &'static str {
    if score >= 85 {
        "\u{26a1}" // lightning
    } else if score >= 70 {
        "\u{1f7e2}" // green circle
    } else {
        "\u{1f7e1}" // yellow circle
    }
}

/// Build the full alert message.
pub fn build_message(anomaly: &AnomalyDetected, context: &AlertContext) -> String {
    let mut lines: Vec<String> = Vec::new();

    let quality = anomaly.quality.as_ref();
    let score = quality.map(|q| q.score).unwrap_or(0);

    lines.push(format!(
        "{} <b>Signal</b> [{}/100]",
        quality_emoji(score),
        score
    ));

    let question = context
        .question
        .as_deref()
        .unwrap_or(anomaly.market_id.as_str());
    lines.push(format!("<b>{}</b>", html_escape(question)));

    if let Some(quality) = quality {
        lines.push(format_market_line(quality));
    }

    if let Some(block) = format_context_block(anomaly) {
        lines.push(String::new());
        lines.push(block);
    }

    if let Some(quality) = quality
        && !quality.reasons.is_empty()
    {
        lines.push(String::new());
        lines.push("<b>Score breakdown</b>".to_string());
        for reason in quality.breakdown().split('|') {
            lines.push(format!("- {}", html_escape(reason.trim())));
        }
    }

    lines.push(String::new());
    lines.push(format!("Catalyst: {}", html_escape(&anomaly.description)));

    if let Some(signal) = anomaly.signal {
        let roi_suffix = anomaly
            .expected_roi()
            .map(|roi| format!(" | ROI: +{:.0}%", roi * 100.0))
            .unwrap_or_default();
        lines.push(format!("Signal: <b>{}</b>{}", signal, roi_suffix));
    }

    if let Some(position) = &context.position {
        lines.push(String::new());
        lines.push("<b>Paper trade</b>".to_string());
        lines.push(format!(
            "Entry: {} @ {} | ${}",
            position.direction, position.entry_price, position.size
        ));
        if let Some(balance) = context.balance {
            let percent = if balance + position.size > Decimal::ZERO {
                (position.size / (balance + position.size) * Decimal::ONE_HUNDRED).round_dp(1)
            } else {
                Decimal::ZERO
            };
            let open = context.open_count.unwrap_or(0);
            lines.push(format!(
                "{}% of portfolio | Balance: ${} | Open: {}",
                percent, balance, open
            ));
        }
    }

    if let Some(url) = &context.url {
        lines.push(String::new());
        lines.push(format!("<a href=\"{}\">View market</a>", url));
    }

    lines.join("\n")
}

fn format_market_line(quality: &QualityAssessment) -> String {
    match quality.hours_to_resolution {
        Some(hours) if hours < 48.0 => {
            format!("{} | resolves in {:.0}h", quality.market_type, hours)
        }
        Some(hours) => format!(
            "{} | resolves in {:.1} days",
            quality.market_type,
            hours / 24.0
        ),
        None => format!("{} | no end date", quality.market_type),
    }
}

/// Model context for fair-value signals.
fn format_context_block(anomaly: &AnomalyDetected) -> Option<String> {
    match &anomaly.details {
        AnomalyDetails::CryptoDivergence {
            symbol,
            spot_price,
            target_price,
            fair_value,
            market_price,
            edge,
            volatility,
            days_to_expiry,
            ..
        } => Some(format!(
            "{} spot ${} vs target ${}\nFair {:.3} vs market {} | edge {:.1}pp\nVol {:.0}% | {:.0}d to expiry",
            symbol,
            spot_price,
            target_price,
            fair_value,
            market_price,
            edge.abs() * 100.0,
            volatility * 100.0,
            days_to_expiry
        )),
        _ => None,
    }
}
