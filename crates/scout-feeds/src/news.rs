//! RSS news fetcher.
//!
//! Pulls headlines from a configured list of RSS feed URLs. Matching
//! headlines against tracked markets (relevance scoring) happens in the
//! pipeline, which owns the market cache; this client only fetches and
//! normalises.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rss::Channel;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the news fetcher.
#[derive(Debug, Error)]
pub enum NewsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RSS parsing failed: {0}")]
    Rss(#[from] rss::Error),
}

/// Configuration for the news fetcher.
#[derive(Debug, Clone)]
pub struct NewsConfig {
    /// RSS feed URLs to poll.
    pub feed_urls: Vec<String>,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feed_urls: vec![
                "https://www.coindesk.com/arc/outboundfeeds/rss/".to_string(),
                "https://cointelegraph.com/rss".to_string(),
            ],
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// A headline pulled from a feed, before market matching.
#[derive(Debug, Clone)]
pub struct RawHeadline {
    pub title: String,
    pub link: String,
    /// Host of the feed the headline came from.
    pub source: String,
    pub published: Option<DateTime<Utc>>,
}

/// RSS news fetcher.
pub struct NewsFetcher {
    http: Client,
    config: NewsConfig,
}

impl NewsFetcher {
    /// Create a new news fetcher.
    pub fn new(config: NewsConfig) -> Self {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, config }
    }

    /// Fetch all configured feeds; a failing feed is logged and skipped so
    /// the rest still deliver.
    pub async fn fetch_all(&self) -> Vec<RawHeadline> {
        let mut headlines = Vec::new();
        for url in &self.config.feed_urls {
            match self.fetch_feed(url).await {
                Ok(mut items) => headlines.append(&mut items),
                Err(e) => warn!("Failed to fetch feed {url}: {e}"),
            }
        }
        headlines
    }

    /// Fetch and parse a single feed.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<RawHeadline>, NewsError> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let channel = Channel::read_from(&bytes[..])?;
        let source = host_of(url);

        let headlines = channel
            .items()
            .iter()
            .filter_map(|item| {
                let title = item.title()?.trim().to_string();
                let link = item.link()?.trim().to_string();
                if title.is_empty() || link.is_empty() {
                    debug!("Skipping feed item without title/link");
                    return None;
                }
                let published = item
                    .pub_date()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|d| d.with_timezone(&Utc));
                Some(RawHeadline {
                    title,
                    link,
                    source: source.clone(),
                    published,
                })
            })
            .collect();

        Ok(headlines)
    }
}

/// Extracts the host from a feed URL for display as the source.
fn host_of(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}
