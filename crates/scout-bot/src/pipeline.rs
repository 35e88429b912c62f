//! Stream pipeline: producers, detector consumers, and subscribers.
//!
//! Producers poll the external feeds and publish domain events onto the
//! bus; one consumer task per stream runs its detector and publishes
//! enriched anomalies; the alerter and the auto-bet strategist subscribe
//! to the anomaly topic independently. Long-lived tasks loop until the
//! shutdown broadcast fires and exit cleanly.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scout_common::{MarketSnapshot, NewsItem, PriceChange};
use scout_feeds::{
    BookClient, CatalogClient, CryptoTickerConfig, CryptoTickerWorker, NewsFetcher, RawHeadline,
    TradesClient,
};

use crate::alert::AlertDispatcher;
use crate::autobet::AutoBetStrategist;
use crate::bus::EventBus;
use crate::caches::{CryptoMarketCache, MarketNameResolver, SeenSet};
use crate::config::FeedsConfig;
use crate::constants::{SEEN_NEWS_CAP, SEEN_TRADES_CAP};
use crate::detector::{
    CryptoDivergenceDetector, MarketDivergenceDetector, NewsImpactDetector,
    OrderBookImbalanceDetector, PriceSpikeDetector, SpreadDetector, VolumeSpikeDetector,
    WhaleDetector,
};
use crate::enrich::AnomalyEnricher;
use crate::paper::PaperTradingEngine;
use crate::question::CryptoMarketMatcher;

/// Latest snapshot per market, shared across producer and consumer tasks.
pub type SharedMarketIndex = Arc<DashMap<String, MarketSnapshot>>;

/// YES price at/above which a position's market is treated as resolved.
const RESOLUTION_HIGH: Decimal = dec!(0.995);
/// YES price at/below which a position's market is treated as resolved.
const RESOLUTION_LOW: Decimal = dec!(0.005);

/// Everything the pipeline tasks share.
pub struct PipelineContext {
    pub bus: Arc<EventBus>,
    pub index: SharedMarketIndex,
    pub crypto_cache: Arc<CryptoMarketCache>,
    pub names: Arc<MarketNameResolver>,
    pub enricher: Arc<AnomalyEnricher>,
    pub paper: Arc<PaperTradingEngine>,
}

/// Market catalog sync: publishes snapshots, derives price changes against
/// the previous sync, and keeps the name cache warm.
pub fn spawn_market_sync(
    context: &PipelineContext,
    catalog: Arc<CatalogClient>,
    config: &FeedsConfig,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let bus = context.bus.clone();
    let index = context.index.clone();
    let names = context.names.clone();
    let interval = config.market_sync_interval;
    let mut shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        info!("Market sync started ({interval:?} interval)");
        loop {
            match catalog.list_active_markets().await {
                Ok(snapshots) => {
                    debug!("Synced {} markets", snapshots.len());
                    for snapshot in snapshots {
                        names.observe(&snapshot);

                        if let Some(previous) = index.get(&snapshot.market_id).map(|e| e.value().clone())
                            && previous.yes_price != snapshot.yes_price
                            && let Some(change) = PriceChange::derive(
                                snapshot.market_id.clone(),
                                snapshot.question.clone(),
                                previous.yes_price,
                                snapshot.yes_price,
                                snapshot.ts,
                            )
                        {
                            bus.publish_price_change(change);
                        }

                        index.insert(snapshot.market_id.clone(), snapshot.clone());
                        bus.publish_snapshot(snapshot);
                    }
                }
                Err(e) => warn!("Market sync failed: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.recv() => {
                    info!("Market sync: shutdown");
                    return;
                }
            }
        }
    })
}

/// Whale tracker: polls recent trades on the highest-volume markets and
/// publishes unseen ones.
pub fn spawn_whale_tracker(
    context: &PipelineContext,
    trades: Arc<TradesClient>,
    config: &FeedsConfig,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let bus = context.bus.clone();
    let index = context.index.clone();
    let interval = config.whale_poll_interval;
    let limit = config.tracked_market_limit;
    let mut shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        info!("Whale tracker started ({interval:?} interval)");
        let mut seen = SeenSet::new(SEEN_TRADES_CAP);
        loop {
            for market_id in top_markets_by_volume(&index, limit) {
                match trades.recent_trades(&market_id).await {
                    Ok(recent) => {
                        for entry in recent {
                            if seen.insert(&entry.trade_id) {
                                bus.publish_trade(entry.trade);
                            }
                        }
                    }
                    Err(e) => debug!(%market_id, "Trade poll failed: {e}"),
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.recv() => {
                    info!("Whale tracker: shutdown");
                    return;
                }
            }
        }
    })
}

/// Order-book scanner: polls books for markets with known YES tokens.
pub fn spawn_book_scanner(
    context: &PipelineContext,
    books: Arc<BookClient>,
    config: &FeedsConfig,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let bus = context.bus.clone();
    let index = context.index.clone();
    let interval = config.book_poll_interval;
    let limit = config.tracked_market_limit;
    let mut shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        info!("Book scanner started ({interval:?} interval)");
        loop {
            for market_id in top_markets_by_volume(&index, limit) {
                let Some(token_id) = index
                    .get(&market_id)
                    .and_then(|s| s.yes_token_id.clone())
                else {
                    continue;
                };
                match books.fetch_book(&market_id, &token_id).await {
                    Ok(update) => bus.publish_book(update),
                    Err(e) => debug!(%market_id, "Book poll failed: {e}"),
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.recv() => {
                    info!("Book scanner: shutdown");
                    return;
                }
            }
        }
    })
}

/// News poller: fetches feeds, dedups by link, and publishes headlines
/// matched against tracked markets.
pub fn spawn_news_poller(
    context: &PipelineContext,
    fetcher: Arc<NewsFetcher>,
    config: &FeedsConfig,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let bus = context.bus.clone();
    let index = context.index.clone();
    let interval = config.news_poll_interval;
    let mut shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        info!("News poller started ({interval:?} interval)");
        let mut seen = SeenSet::new(SEEN_NEWS_CAP);
        loop {
            let headlines = fetcher.fetch_all().await;
            for headline in headlines {
                if !seen.insert(&headline.link) {
                    continue;
                }
                for item in match_headline(&index, &headline) {
                    bus.publish_news(item);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.recv() => {
                    info!("News poller: shutdown");
                    return;
                }
            }
        }
    })
}

/// Crypto ticker worker: runs the WebSocket stream and forwards ticks onto
/// the bus.
pub fn spawn_crypto_stream(
    context: &PipelineContext,
    config: CryptoTickerConfig,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let bus = context.bus.clone();
    let worker_shutdown = shutdown.subscribe();
    let mut forward_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let (tx, mut rx) = mpsc::channel(256);
        let worker = CryptoTickerWorker::new(config, tx);
        let worker_handle = tokio::spawn(async move {
            if let Err(e) = worker.run(worker_shutdown).await {
                warn!("Crypto ticker worker exited: {e}");
            }
        });

        loop {
            tokio::select! {
                tick = rx.recv() => {
                    match tick {
                        Some(update) => bus.publish_crypto_price(update),
                        None => break,
                    }
                }
                _ = forward_shutdown.recv() => break,
            }
        }
        let _ = worker_handle.await;
        info!("Crypto stream: shutdown");
    })
}

/// One consumer task per stream, each owning its detector exclusively.
pub fn spawn_detector_consumers(
    context: &PipelineContext,
    shutdown: broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // Snapshot consumer: volume spikes, divergence checks, crypto cache
    {
        let bus = context.bus.clone();
        let index = context.index.clone();
        let crypto_cache = context.crypto_cache.clone();
        let enricher = context.enricher.clone();
        let mut rx = context.bus.subscribe_snapshots();
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut volume = VolumeSpikeDetector::new();
            let divergence = MarketDivergenceDetector::new();
            let matcher = CryptoMarketMatcher::new();
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(snapshot) = recv_or_continue(event, "snapshots") else { continue };

                        if let Some(matched) = matcher.parse(&snapshot.question) {
                            crypto_cache.upsert(snapshot.clone(), matched);
                        }

                        let latest = index.get(&snapshot.market_id).map(|e| e.value().clone());
                        let now = Utc::now();
                        for anomaly in [
                            volume.process(&snapshot),
                            divergence.check_near_resolution(&snapshot),
                            divergence.check_price_sum(&snapshot),
                        ]
                        .into_iter()
                        .flatten()
                        {
                            bus.publish_anomaly(enricher.enrich(anomaly, latest.as_ref(), now));
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        }));
    }

    // Price change consumer
    {
        let bus = context.bus.clone();
        let index = context.index.clone();
        let enricher = context.enricher.clone();
        let mut rx = context.bus.subscribe_price_changes();
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let detector = PriceSpikeDetector::new();
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(change) = recv_or_continue(event, "price changes") else { continue };
                        if let Some(anomaly) = detector.process(&change) {
                            let latest = index.get(&change.market_id).map(|e| e.value().clone());
                            bus.publish_anomaly(enricher.enrich(anomaly, latest.as_ref(), Utc::now()));
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        }));
    }

    // Trade consumer
    {
        let bus = context.bus.clone();
        let index = context.index.clone();
        let enricher = context.enricher.clone();
        let mut rx = context.bus.subscribe_trades();
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let detector = WhaleDetector::new();
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(trade) = recv_or_continue(event, "trades") else { continue };
                        if let Some(anomaly) = detector.process(&trade) {
                            let latest = index.get(&trade.market_id).map(|e| e.value().clone());
                            bus.publish_anomaly(enricher.enrich(anomaly, latest.as_ref(), Utc::now()));
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        }));
    }

    // Order book consumer: imbalance and spread share the stream
    {
        let bus = context.bus.clone();
        let index = context.index.clone();
        let enricher = context.enricher.clone();
        let mut rx = context.bus.subscribe_books();
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut imbalance = OrderBookImbalanceDetector::new();
            let mut spread = SpreadDetector::new();
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(book) = recv_or_continue(event, "books") else { continue };
                        let latest = index.get(&book.market_id).map(|e| e.value().clone());
                        let now = Utc::now();
                        for anomaly in [imbalance.process(&book), spread.process(&book)]
                            .into_iter()
                            .flatten()
                        {
                            bus.publish_anomaly(enricher.enrich(anomaly, latest.as_ref(), now));
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        }));
    }

    // News consumer
    {
        let bus = context.bus.clone();
        let index = context.index.clone();
        let enricher = context.enricher.clone();
        let mut rx = context.bus.subscribe_news();
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let detector = NewsImpactDetector::new();
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(item) = recv_or_continue(event, "news") else { continue };
                        if let Some(anomaly) = detector.process(&item) {
                            let latest = index.get(&item.market_id).map(|e| e.value().clone());
                            bus.publish_anomaly(enricher.enrich(anomaly, latest.as_ref(), Utc::now()));
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        }));
    }

    // Crypto price consumer: joins ticks against the crypto market cache
    {
        let bus = context.bus.clone();
        let crypto_cache = context.crypto_cache.clone();
        let enricher = context.enricher.clone();
        let mut rx = context.bus.subscribe_crypto_prices();
        let mut shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let detector = CryptoDivergenceDetector::new();
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(tick) = recv_or_continue(event, "crypto prices") else { continue };
                        let now = Utc::now();
                        for cached in crypto_cache.for_symbol(tick.symbol) {
                            if let Some(anomaly) =
                                detector.process(&tick, &cached.snapshot, &cached.matched, now)
                            {
                                bus.publish_anomaly(enricher.enrich(
                                    anomaly,
                                    Some(&cached.snapshot),
                                    now,
                                ));
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }
            }
        }));
    }

    handles
}

/// Alert subscriber: one of the independent anomaly consumers.
pub fn spawn_alert_subscriber(
    context: &PipelineContext,
    dispatcher: Arc<AlertDispatcher>,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let bus = context.bus.clone();
    let mut rx = context.bus.subscribe_anomalies();
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        // Holding the bus keeps the topic open for the life of the task
        let _bus = bus;
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(anomaly) = recv_or_continue(event, "anomalies") else { continue };
                    let _ = dispatcher.dispatch(&anomaly).await;
                }
                _ = shutdown_rx.recv() => return,
            }
        }
    })
}

/// Auto-bet subscriber: acts on anomalies independently of the alerter.
pub fn spawn_autobet_subscriber(
    context: &PipelineContext,
    strategist: Arc<AutoBetStrategist>,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let bus = context.bus.clone();
    let mut rx = context.bus.subscribe_anomalies();
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(anomaly) = recv_or_continue(event, "anomalies") else { continue };
                    if let Some(bet) = strategist.consider(&anomaly).await {
                        bus.publish_bet(bet);
                    }
                }
                _ = shutdown_rx.recv() => return,
            }
        }
    })
}

/// Position tracker: walks open paper positions against the latest
/// snapshots, closing on stop-loss/take-profit or market resolution.
pub fn spawn_position_tracker(
    context: &PipelineContext,
    config: &FeedsConfig,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let index = context.index.clone();
    let paper = context.paper.clone();
    let interval = config.position_check_interval;
    let mut shutdown_rx = shutdown.subscribe();

    tokio::spawn(async move {
        info!("Position tracker started ({interval:?} interval)");
        loop {
            for position in paper.open_positions() {
                let Some(snapshot) = index.get(&position.market_id).map(|e| e.value().clone()) else {
                    continue;
                };
                let yes = snapshot.yes_price;

                if yes >= RESOLUTION_HIGH || yes <= RESOLUTION_LOW {
                    let yes_won = yes >= RESOLUTION_HIGH;
                    let won_bet = match position.direction {
                        scout_common::Direction::Yes => yes_won,
                        scout_common::Direction::No => !yes_won,
                    };
                    paper.close_at_resolution(&position.market_id, won_bet);
                    continue;
                }

                // A NO position's share price is the complement of YES
                let current = match position.direction {
                    scout_common::Direction::Yes => yes,
                    scout_common::Direction::No => Decimal::ONE - yes,
                };
                paper.check_and_close(&position.market_id, current, None);
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.recv() => {
                    info!("Position tracker: shutdown");
                    return;
                }
            }
        }
    })
}

/// Daily report task: logs the portfolio summary once per UTC day.
pub fn spawn_daily_report(
    context: &PipelineContext,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let paper = context.paper.clone();
    let mut shutdown_rx = shutdown.subscribe();

    tokio::spawn(async move {
        let mut last_reported = Utc::now().date_naive();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(600)) => {
                    let now = Utc::now();
                    if now.date_naive() != last_reported {
                        last_reported = now.date_naive();
                        let report = paper.daily_report(now);
                        info!(
                            balance = %report.balance,
                            total_pnl = %report.total_pnl,
                            trades_today = report.trades_today,
                            win_rate = ?report.win_rate_today,
                            open = report.open_positions.len(),
                            loss_streak = report.loss_streak,
                            paused = report.paused,
                            "Daily paper report"
                        );
                    }
                }
                _ = shutdown_rx.recv() => return,
            }
        }
    })
}

/// Unwrap one broadcast receive. Lagged receivers drop the oldest
/// messages by design (the bus sheds like the broker would); every
/// consumer task holds an `Arc<EventBus>`, so the topic cannot close
/// while it runs.
fn recv_or_continue<T>(
    result: Result<T, broadcast::error::RecvError>,
    topic: &str,
) -> Option<T> {
    match result {
        Ok(event) => Some(event),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            warn!("Consumer lagged on {topic}, dropped {n} events");
            None
        }
        Err(broadcast::error::RecvError::Closed) => {
            warn!("Topic {topic} closed");
            None
        }
    }
}

/// Highest-volume markets currently in the index.
fn top_markets_by_volume(index: &SharedMarketIndex, limit: usize) -> Vec<String> {
    let mut markets: Vec<(String, Decimal)> = index
        .iter()
        .map(|entry| (entry.market_id.clone(), entry.volume_24h))
        .collect();
    markets.sort_by(|a, b| b.1.cmp(&a.1));
    markets.truncate(limit);
    markets.into_iter().map(|(id, _)| id).collect()
}

/// Match one headline against every tracked market.
fn match_headline(index: &SharedMarketIndex, headline: &RawHeadline) -> Vec<NewsItem> {
    let mut items = Vec::new();
    for entry in index.iter() {
        let relevance = headline_relevance(&entry.question, &headline.title);
        if relevance > 0.0 {
            items.push(NewsItem {
                market_id: entry.market_id.clone(),
                headline: headline.title.clone(),
                source: headline.source.clone(),
                url: headline.link.clone(),
                relevance,
                ts: headline.published.unwrap_or_else(Utc::now),
            });
        }
    }
    items
}

/// Words too common to carry signal in a market question.
const STOPWORDS: &[&str] = &[
    "will", "the", "be", "a", "an", "of", "on", "in", "at", "by", "to", "for", "before", "after",
    "this", "that", "than", "with", "above", "below", "over", "under",
];

/// Fraction of the question's keywords present in the headline.
fn headline_relevance(question: &str, headline: &str) -> f64 {
    let keywords: Vec<String> = question
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect();
    if keywords.is_empty() {
        return 0.0;
    }

    let headline_lower = headline.to_lowercase();
    let headline_words: Vec<&str> = headline_lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let matched = keywords
        .iter()
        .filter(|kw| headline_words.contains(&kw.as_str()))
        .count();
    matched as f64 / keywords.len() as f64
}
