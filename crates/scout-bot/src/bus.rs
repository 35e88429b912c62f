//! In-process event bus.
//!
//! The broker rendition for a single-process deployment: one broadcast
//! topic per event type, at-least-once to every live subscriber. Slow
//! subscribers lag and drop the oldest messages, which matches the
//! intentional shedding posture of the downstream gates; subscribers are
//! expected to be independently idempotent.

use tokio::sync::broadcast;

use scout_common::{
    AnomalyDetected, BetPlaced, CryptoPriceUpdate, LargeTrade, MarketSnapshot, NewsItem,
    OrderBookUpdate, PriceChange,
};

/// Default per-topic buffer.
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Typed pub/sub topics shared by producers and consumers.
#[derive(Debug)]
pub struct EventBus {
    snapshots: broadcast::Sender<MarketSnapshot>,
    price_changes: broadcast::Sender<PriceChange>,
    trades: broadcast::Sender<LargeTrade>,
    books: broadcast::Sender<OrderBookUpdate>,
    news: broadcast::Sender<NewsItem>,
    crypto_prices: broadcast::Sender<CryptoPriceUpdate>,
    anomalies: broadcast::Sender<AnomalyDetected>,
    bets: broadcast::Sender<BetPlaced>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: broadcast::channel(capacity).0,
            price_changes: broadcast::channel(capacity).0,
            trades: broadcast::channel(capacity).0,
            books: broadcast::channel(capacity).0,
            news: broadcast::channel(capacity).0,
            crypto_prices: broadcast::channel(capacity).0,
            anomalies: broadcast::channel(capacity).0,
            bets: broadcast::channel(capacity).0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }

    // Publishing ignores the no-subscriber error: a topic nobody listens
    // to is not a failure.

    pub fn publish_snapshot(&self, event: MarketSnapshot) {
        let _ = self.snapshots.send(event);
    }

    pub fn publish_price_change(&self, event: PriceChange) {
        let _ = self.price_changes.send(event);
    }

    pub fn publish_trade(&self, event: LargeTrade) {
        let _ = self.trades.send(event);
    }

    pub fn publish_book(&self, event: OrderBookUpdate) {
        let _ = self.books.send(event);
    }

    pub fn publish_news(&self, event: NewsItem) {
        let _ = self.news.send(event);
    }

    pub fn publish_crypto_price(&self, event: CryptoPriceUpdate) {
        let _ = self.crypto_prices.send(event);
    }

    pub fn publish_anomaly(&self, event: AnomalyDetected) {
        let _ = self.anomalies.send(event);
    }

    pub fn publish_bet(&self, event: BetPlaced) {
        let _ = self.bets.send(event);
    }

    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<MarketSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_price_changes(&self) -> broadcast::Receiver<PriceChange> {
        self.price_changes.subscribe()
    }

    pub fn subscribe_trades(&self) -> broadcast::Receiver<LargeTrade> {
        self.trades.subscribe()
    }

    pub fn subscribe_books(&self) -> broadcast::Receiver<OrderBookUpdate> {
        self.books.subscribe()
    }

    pub fn subscribe_news(&self) -> broadcast::Receiver<NewsItem> {
        self.news.subscribe()
    }

    pub fn subscribe_crypto_prices(&self) -> broadcast::Receiver<CryptoPriceUpdate> {
        self.crypto_prices.subscribe()
    }

    pub fn subscribe_anomalies(&self) -> broadcast::Receiver<AnomalyDetected> {
        self.anomalies.subscribe()
    }

    pub fn subscribe_bets(&self) -> broadcast::Receiver<BetPlaced> {
        self.bets.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fan_out_to_multiple_subscribers() {
        let bus = EventBus::with_defaults();
        let mut first = bus.subscribe_price_changes();
        let mut second = bus.subscribe_price_changes();

        let change = PriceChange::derive(
            "m1".to_string(),
            "q".to_string(),
            dec!(0.50),
            dec!(0.30),
            Utc::now(),
        )
        .unwrap();
        bus.publish_price_change(change);

        assert_eq!(first.recv().await.unwrap().market_id, "m1");
        assert_eq!(second.recv().await.unwrap().market_id, "m1");
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::with_defaults();
        let change = PriceChange::derive(
            "m1".to_string(),
            "q".to_string(),
            dec!(0.50),
            dec!(0.30),
            Utc::now(),
        )
        .unwrap();
        bus.publish_price_change(change);
    }
}
