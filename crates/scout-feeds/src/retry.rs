//! Bounded retry with exponential backoff for REST fetches.
//!
//! Transient upstream failures (5xx, timeouts, socket drops) retry up to
//! [`MAX_ATTEMPTS`] times; the caller only sees the final error. WebSocket
//! workers do not use this and instead reconnect indefinitely on their own loop.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// REST requests give up after this many attempts.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay doubled per attempt (250ms, 500ms, ...).
const BASE_DELAY: Duration = Duration::from_millis(250);

/// Runs `op` until it succeeds or [`MAX_ATTEMPTS`] is exhausted.
pub async fn with_backoff<T, E, F, Fut>(label: &str, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_ATTEMPTS => {
                let delay = BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    label, attempt, MAX_ATTEMPTS, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(9)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
