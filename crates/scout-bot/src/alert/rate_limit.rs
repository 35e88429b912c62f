//! Durable daily rate limit for alerts.
//!
//! At most 5 alerts per UTC day, at least 30 minutes apart. The counter is
//! persisted to a JSON file so a restart cannot reset the day's budget;
//! the file is the authoritative store across restarts.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{ALERT_MIN_GAP_MINUTES, ALERTS_PER_DAY};

/// Persisted limiter state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitState {
    /// UTC date the counter belongs to.
    pub date: NaiveDate,
    pub today_count: u32,
    pub last_signal_time: Option<DateTime<Utc>>,
}

impl RateLimitState {
    fn fresh(date: NaiveDate) -> Self {
        Self {
            date,
            today_count: 0,
            last_signal_time: None,
        }
    }
}

/// Why an alert was shed by the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitVerdict {
    Allowed,
    /// The day's alert budget is spent.
    DailyBudgetSpent,
    /// The previous alert was too recent.
    TooSoon,
}

/// File-backed daily rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    path: PathBuf,
    state: RateLimitState,
}

impl RateLimiter {
    /// Load the limiter, restoring any persisted counter for today.
    pub fn load(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RateLimitState>(&contents) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %path.display(), "Unreadable rate-limit state ({e}), starting fresh");
                    RateLimitState::fresh(now.date_naive())
                }
            },
            Err(_) => RateLimitState::fresh(now.date_naive()),
        };
        let mut limiter = Self { path, state };
        limiter.roll_date(now);
        limiter
    }

    /// Check whether an alert may be sent now. Read-only: commit happens
    /// after a successful transport.
    pub fn check(&mut self, now: DateTime<Utc>) -> RateLimitVerdict {
        self.roll_date(now);

        if self.state.today_count >= ALERTS_PER_DAY {
            return RateLimitVerdict::DailyBudgetSpent;
        }
        if let Some(last) = self.state.last_signal_time
            && now - last < Duration::minutes(ALERT_MIN_GAP_MINUTES)
        {
            return RateLimitVerdict::TooSoon;
        }
        RateLimitVerdict::Allowed
    }

    /// Record a transported alert and persist the counter.
    pub fn commit(&mut self, now: DateTime<Utc>) {
        self.roll_date(now);
        self.state.today_count += 1;
        self.state.last_signal_time = Some(now);
        self.persist();
    }

    /// Today's consumed budget.
    pub fn today_count(&self) -> u32 {
        self.state.today_count
    }

    fn roll_date(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.state.date != today {
            debug!(old = %self.state.date, new = %today, "Rate-limit date rollover");
            self.state = RateLimitState::fresh(today);
        }
    }

    fn persist(&self) {
        if let Err(e) = self.try_persist() {
            warn!(path = %self.path.display(), "Failed to persist rate-limit state: {e}");
        }
    }

    fn try_persist(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("scout_rate_limit_tests")
            .join(format!("{}_{}.json", name, std::process::id()))
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_gap_enforced() {
        let path = temp_path("gap");
        let _ = fs::remove_file(&path);
        let mut limiter = RateLimiter::load(&path, at(9, 0));

        assert_eq!(limiter.check(at(9, 0)), RateLimitVerdict::Allowed);
        limiter.commit(at(9, 0));

        // 29 minutes later: too soon
        assert_eq!(limiter.check(at(9, 29)), RateLimitVerdict::TooSoon);
        // 30 minutes later: allowed
        assert_eq!(limiter.check(at(9, 30)), RateLimitVerdict::Allowed);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_daily_budget() {
        let path = temp_path("budget");
        let _ = fs::remove_file(&path);
        let mut limiter = RateLimiter::load(&path, at(8, 0));

        for i in 0..5 {
            let now = at(8 + i, 0);
            assert_eq!(limiter.check(now), RateLimitVerdict::Allowed);
            limiter.commit(now);
        }
        assert_eq!(limiter.check(at(14, 0)), RateLimitVerdict::DailyBudgetSpent);

        // Next UTC day resets the budget
        let tomorrow = Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap();
        assert_eq!(limiter.check(tomorrow), RateLimitVerdict::Allowed);
        assert_eq!(limiter.today_count(), 0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_counter_survives_restart() {
        let path = temp_path("restart");
        let _ = fs::remove_file(&path);

        let mut limiter = RateLimiter::load(&path, at(8, 0));
        for i in 0..3 {
            limiter.commit(at(8 + i, 0));
        }
        drop(limiter);

        // A fresh process restores the counter from the file
        let mut restored = RateLimiter::load(&path, at(11, 0));
        assert_eq!(restored.today_count(), 3);
        // The fourth alert is still permitted
        assert_eq!(restored.check(at(11, 0)), RateLimitVerdict::Allowed);
        restored.commit(at(11, 0));
        restored.commit(at(12, 0));
        assert_eq!(restored.check(at(13, 0)), RateLimitVerdict::DailyBudgetSpent);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "nope").unwrap();

        let limiter = RateLimiter::load(&path, at(8, 0));
        assert_eq!(limiter.today_count(), 0);

        let _ = fs::remove_file(&path);
    }
}
