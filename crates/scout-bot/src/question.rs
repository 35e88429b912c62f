//! Question parser for crypto threshold markets.
//!
//! Extracts `(symbol, target price, direction, expiry)` from free-text
//! market questions like "Will Bitcoin be above $110,000 on March 31,
//! 2026?". Markets whose question does not name a known asset produce no
//! match and are simply not tracked by the divergence detector.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use scout_common::{CryptoMarketMatch, CryptoSymbol};

/// Keywords meaning the market resolves YES below the target.
const BELOW_KEYWORDS: &[&str] = &[
    "below",
    "under",
    "less than",
    "lower than",
    "drop to",
    "fall to",
    "dip to",
    "beneath",
    "crash to",
];

/// Keywords meaning the market resolves YES at/above the target.
const ABOVE_KEYWORDS: &[&str] = &[
    "above",
    "over",
    "exceed",
    "hit",
    "reach",
    "surpass",
    "higher than",
    "more than",
    "at least",
];

/// Month names and abbreviations, 1-indexed by position.
const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// Parser for crypto price questions.
pub struct CryptoMarketMatcher {
    price_re: Regex,
    date_re: Regex,
}

impl Default for CryptoMarketMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoMarketMatcher {
    pub fn new() -> Self {
        // $ amount with optional thousands separators and k/m suffix
        let price_re = Regex::new(r"\$\s?([0-9][\d,]*(?:\.\d+)?)\s*([kKmM])?")
            .expect("price regex is valid");
        // "March 31, 2026" / "Mar 31" / "feb 28th, 2026"; the covered
        // shapes are MMMM d yyyy, MMM d yyyy, MMMM d, MMM d
        let date_re = Regex::new(
            r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s*(\d{4}))?",
        )
        .expect("date regex is valid");
        Self { price_re, date_re }
    }

    /// Parse a question using the current wall clock for year bumping.
    pub fn parse(&self, question: &str) -> Option<CryptoMarketMatch> {
        self.parse_at(question, Utc::now())
    }

    /// Parse a question; `now` anchors year-less and past dates.
    pub fn parse_at(&self, question: &str, now: DateTime<Utc>) -> Option<CryptoMarketMatch> {
        let symbol = self.extract_symbol(question)?;
        let target_price = self.extract_target_price(question)?;
        let is_above = self.extract_direction(question);
        let expiry_date = self.extract_expiry(question, now);

        Some(CryptoMarketMatch {
            symbol,
            target_price,
            is_above,
            expiry_date,
        })
    }

    /// First whole-word alias match, in table order.
    fn extract_symbol(&self, question: &str) -> Option<CryptoSymbol> {
        let lower = question.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        for symbol in CryptoSymbol::all() {
            for alias in symbol.aliases() {
                if words.contains(alias) {
                    return Some(*symbol);
                }
            }
        }
        None
    }

    /// First `$<number>[k|m]` occurrence; must be positive.
    fn extract_target_price(&self, question: &str) -> Option<Decimal> {
        let captures = self.price_re.captures(question)?;
        let raw = captures.get(1)?.as_str().replace(',', "");
        let mut price: Decimal = raw.parse().ok()?;

        match captures.get(2).map(|m| m.as_str().to_lowercase()) {
            Some(s) if s == "k" => price *= dec!(1000),
            Some(s) if s == "m" => price *= dec!(1000000),
            _ => {}
        }

        if price > Decimal::ZERO { Some(price) } else { None }
    }

    /// Below keywords win over above keywords; default is above.
    fn extract_direction(&self, question: &str) -> bool {
        let lower = question.to_lowercase();
        if BELOW_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return false;
        }
        if ABOVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return true;
        }
        true
    }

    /// First `<Month> <day>[, <year>]` phrase, bumped forward when it has
    /// no year and already passed.
    fn extract_expiry(&self, question: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let captures = self.date_re.captures(question)?;

        let month = month_number(captures.get(1)?.as_str())?;
        let day: u32 = captures.get(2)?.as_str().parse().ok()?;
        let explicit_year: Option<i32> = captures.get(3).and_then(|m| m.as_str().parse().ok());

        let today = now.date_naive();
        let date = match explicit_year {
            Some(year) => NaiveDate::from_ymd_opt(year, month, day)?,
            None => {
                let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
                if this_year < today {
                    NaiveDate::from_ymd_opt(today.year() + 1, month, day)?
                } else {
                    this_year
                }
            }
        };

        // Resolution deadline is the end of the named day
        date.and_hms_opt(23, 59, 59)
            .map(|dt| Utc.from_utc_datetime(&dt))
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == lower)
        .map(|(_, n)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> CryptoMarketMatcher {
        CryptoMarketMatcher::new()
    }

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_full_question() {
        let m = matcher()
            .parse_at(
                "Will Bitcoin be above $110,000 on March 31, 2026?",
                anchor(),
            )
            .unwrap();
        assert_eq!(m.symbol, CryptoSymbol::Btc);
        assert_eq!(m.target_price, dec!(110000));
        assert!(m.is_above);
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
        );
    }

    #[test]
    fn test_k_suffix_and_explicit_year() {
        // Explicit years are kept even when already past
        let m = matcher()
            .parse_at("ETH hit $4k by June 30, 2025", anchor())
            .unwrap();
        assert_eq!(m.symbol, CryptoSymbol::Eth);
        assert_eq!(m.target_price, dec!(4000));
        assert!(m.is_above);
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
        );
    }

    #[test]
    fn test_below_direction_and_year_bump() {
        let m = matcher()
            .parse_at("Will BTC dip to $80,000 before Feb 28?", anchor())
            .unwrap();
        assert_eq!(m.symbol, CryptoSymbol::Btc);
        assert_eq!(m.target_price, dec!(80000));
        assert!(!m.is_above);
        // Anchored mid-January 2026: next Feb 28 is 2026-02-28
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
    }

    #[test]
    fn test_yearless_past_date_bumps_forward() {
        // Anchored mid-January: "Jan 1" has passed, next occurrence is 2027
        let m = matcher()
            .parse_at("Will SOL reach $500 by Jan 1?", anchor())
            .unwrap();
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_unknown_symbol_is_no_match() {
        assert!(
            matcher()
                .parse_at("Will the S&P close above 6000 this year?", anchor())
                .is_none()
        );
    }

    #[test]
    fn test_whole_word_aliases_only() {
        // "solid" must not match "sol"
        assert!(
            matcher()
                .parse_at("Will the solid majority exceed $5?", anchor())
                .is_none()
        );
        // "ether" matches ETH
        let m = matcher()
            .parse_at("Will ether surpass $5,000?", anchor())
            .unwrap();
        assert_eq!(m.symbol, CryptoSymbol::Eth);
    }

    #[test]
    fn test_missing_price_is_no_match() {
        assert!(
            matcher()
                .parse_at("Will Bitcoin go up this week?", anchor())
                .is_none()
        );
    }

    #[test]
    fn test_m_suffix() {
        let m = matcher()
            .parse_at("Will BTC exceed $1.5M someday?", anchor())
            .unwrap();
        assert_eq!(m.target_price, dec!(1500000));
    }

    #[test]
    fn test_default_direction_is_above() {
        let m = matcher()
            .parse_at("Will DOGE be at $1 on March 1, 2026?", anchor())
            .unwrap();
        assert!(m.is_above);
    }

    #[test]
    fn test_ordinal_suffix_date() {
        let m = matcher()
            .parse_at("Will XRP reach $5 by March 3rd, 2026?", anchor())
            .unwrap();
        assert_eq!(
            m.expiry_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
        );
    }

    #[test]
    fn test_canonical_rendering_round_trips() {
        let cases = [
            "Will Bitcoin be above $110,000 on March 31, 2026?",
            "Will ETH dip to $2k before Feb 28?",
            "Will SOL surpass $400?",
        ];
        let parser = matcher();
        for case in cases {
            let first = parser.parse_at(case, anchor()).unwrap();
            let second = parser
                .parse_at(&first.canonical_question(), anchor())
                .unwrap();
            assert_eq!(first, second, "round trip failed for {case}");
        }
    }
}
