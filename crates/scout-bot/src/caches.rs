//! Shared caches and bounded seen-sets.
//!
//! - [`CryptoMarketCache`]: crypto threshold markets with parsed question
//!   matches, written by the snapshot consumer and read by the crypto-price
//!   consumer. Entries are overwritten on every snapshot; readers may see
//!   slightly stale data.
//! - [`MarketNameResolver`]: market id to question/url lookups for alert
//!   formatting, populated from snapshots with an on-demand catalog
//!   fallback.
//! - [`SeenSet`]: bounded dedup set for producer polling loops, flushed
//!   wholesale once it outgrows its cap.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use scout_common::{CryptoMarketMatch, MarketSnapshot};
use scout_feeds::CatalogClient;

/// A crypto threshold market with its parsed question.
#[derive(Debug, Clone)]
pub struct CachedCryptoMarket {
    pub snapshot: MarketSnapshot,
    pub matched: CryptoMarketMatch,
}

/// Crypto markets keyed by market id, overwritten on every snapshot.
#[derive(Debug, Default)]
pub struct CryptoMarketCache {
    markets: DashMap<String, CachedCryptoMarket>,
}

impl CryptoMarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for a market.
    pub fn upsert(&self, snapshot: MarketSnapshot, matched: CryptoMarketMatch) {
        self.markets.insert(
            snapshot.market_id.clone(),
            CachedCryptoMarket { snapshot, matched },
        );
    }

    /// All cached markets whose parsed symbol matches.
    pub fn for_symbol(&self, symbol: scout_common::CryptoSymbol) -> Vec<CachedCryptoMarket> {
        self.markets
            .iter()
            .filter(|entry| entry.matched.symbol == symbol)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

/// A resolved market for alert formatting.
#[derive(Debug, Clone)]
pub struct ResolvedMarket {
    pub question: String,
    pub url: Option<String>,
}

/// Market id to question/url cache with a catalog fallback.
pub struct MarketNameResolver {
    cache: DashMap<String, ResolvedMarket>,
    catalog: Option<Arc<CatalogClient>>,
}

impl MarketNameResolver {
    pub fn new(catalog: Option<Arc<CatalogClient>>) -> Self {
        Self {
            cache: DashMap::new(),
            catalog,
        }
    }

    /// Record a market seen in the snapshot stream.
    pub fn observe(&self, snapshot: &MarketSnapshot) {
        self.cache.insert(
            snapshot.market_id.clone(),
            ResolvedMarket {
                question: snapshot.question.clone(),
                url: snapshot.event_url(),
            },
        );
    }

    /// Resolve a market, hitting the catalog only on a cache miss.
    pub async fn resolve(&self, market_id: &str) -> Option<ResolvedMarket> {
        if let Some(hit) = self.cache.get(market_id) {
            return Some(hit.value().clone());
        }

        let catalog = self.catalog.as_ref()?;
        match catalog.fetch_market(market_id).await {
            Ok(snapshot) => {
                self.observe(&snapshot);
                self.cache.get(market_id).map(|r| r.value().clone())
            }
            Err(e) => {
                debug!(%market_id, "Market name lookup failed: {e}");
                None
            }
        }
    }
}

/// Bounded dedup set: `insert` answers "is this new?", and the whole set
/// is flushed once it outgrows the cap so memory stays bounded on long
/// runs.
#[derive(Debug)]
pub struct SeenSet {
    seen: HashSet<String>,
    cap: usize,
}

impl SeenSet {
    pub fn new(cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            cap,
        }
    }

    /// Returns true when the id was not seen before.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.len() > self.cap {
            debug!(cap = self.cap, "Seen-set flushed");
            self.seen.clear();
        }
        self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use scout_common::CryptoSymbol;

    fn snapshot(market_id: &str) -> MarketSnapshot {
        MarketSnapshot {
            market_id: market_id.to_string(),
            question: "Will BTC be above $110k?".to_string(),
            yes_price: dec!(0.35),
            no_price: dec!(0.65),
            volume_24h: dec!(800000),
            liquidity: dec!(50000),
            end_date: None,
            category: Some("crypto".to_string()),
            event_slug: Some("btc-110k".to_string()),
            yes_token_id: None,
            ts: Utc::now(),
        }
    }

    fn matched(symbol: CryptoSymbol) -> CryptoMarketMatch {
        CryptoMarketMatch {
            symbol,
            target_price: dec!(110000),
            is_above: true,
            expiry_date: None,
        }
    }

    #[test]
    fn test_crypto_cache_overwrites() {
        let cache = CryptoMarketCache::new();
        cache.upsert(snapshot("m1"), matched(CryptoSymbol::Btc));
        let mut newer = snapshot("m1");
        newer.yes_price = dec!(0.40);
        cache.upsert(newer, matched(CryptoSymbol::Btc));

        assert_eq!(cache.len(), 1);
        let entries = cache.for_symbol(CryptoSymbol::Btc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].snapshot.yes_price, dec!(0.40));
    }

    #[test]
    fn test_crypto_cache_filters_by_symbol() {
        let cache = CryptoMarketCache::new();
        cache.upsert(snapshot("m1"), matched(CryptoSymbol::Btc));
        cache.upsert(snapshot("m2"), matched(CryptoSymbol::Eth));

        assert_eq!(cache.for_symbol(CryptoSymbol::Btc).len(), 1);
        assert_eq!(cache.for_symbol(CryptoSymbol::Sol).len(), 0);
    }

    #[tokio::test]
    async fn test_resolver_uses_observed_snapshots() {
        let resolver = MarketNameResolver::new(None);
        assert!(resolver.resolve("m1").await.is_none());

        resolver.observe(&snapshot("m1"));
        let resolved = resolver.resolve("m1").await.unwrap();
        assert_eq!(resolved.question, "Will BTC be above $110k?");
        assert_eq!(
            resolved.url.as_deref(),
            Some("https://polymarket.com/event/btc-110k")
        );
    }

    #[test]
    fn test_seen_set_dedups_and_flushes() {
        let mut seen = SeenSet::new(3);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
        assert!(seen.insert("b"));
        assert!(seen.insert("c"));
        assert!(seen.insert("d"));
        assert_eq!(seen.len(), 4);

        // Past the cap the set flushes before the next insert
        assert!(seen.insert("e"));
        assert_eq!(seen.len(), 1);
        // Old ids read as new after a flush; acceptable for polling dedup
        assert!(seen.insert("a"));
    }
}
