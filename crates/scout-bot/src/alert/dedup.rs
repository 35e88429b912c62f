//! In-memory alert shedding: per-(market, type) dedup and a per-minute
//! throttle.
//!
//! Both live behind the dispatcher's lock and reset on restart; the
//! durable daily limiter is what survives the process.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use scout_common::AnomalyType;

use crate::constants::{ALERTS_PER_MINUTE, DEDUP_MAX_ENTRIES};

/// Drops repeat alerts for the same (market, anomaly type) inside a
/// cooldown window. Stale entries are evicted when the map outgrows its
/// bound.
#[derive(Debug)]
pub struct DedupMap {
    cooldown: Duration,
    sent: HashMap<(String, AnomalyType), DateTime<Utc>>,
}

impl DedupMap {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            sent: HashMap::new(),
        }
    }

    /// True when this (market, type) alerted within the cooldown.
    pub fn is_duplicate(&self, market_id: &str, anomaly_type: AnomalyType, now: DateTime<Utc>) -> bool {
        self.sent
            .get(&(market_id.to_string(), anomaly_type))
            .is_some_and(|last| now - *last < self.cooldown)
    }

    /// Record a sent alert and evict stale entries past the size bound.
    pub fn record(&mut self, market_id: &str, anomaly_type: AnomalyType, now: DateTime<Utc>) {
        self.sent.insert((market_id.to_string(), anomaly_type), now);
        if self.sent.len() > DEDUP_MAX_ENTRIES {
            let cooldown = self.cooldown;
            self.sent.retain(|_, last| now - *last < cooldown);
        }
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

/// Rolling 60-second throttle across all alerts.
#[derive(Debug)]
pub struct MinuteThrottle {
    limit: usize,
    sent: VecDeque<DateTime<Utc>>,
}

impl MinuteThrottle {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            sent: VecDeque::new(),
        }
    }

    /// True when another alert fits in the rolling window.
    pub fn allows(&mut self, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::seconds(60);
        while self.sent.front().is_some_and(|t| *t < cutoff) {
            self.sent.pop_front();
        }
        self.sent.len() < self.limit
    }

    /// Record a sent alert.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.sent.push_back(now);
    }
}

impl Default for MinuteThrottle {
    fn default() -> Self {
        Self::new(ALERTS_PER_MINUTE)
    }
}
