use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{Result, ScrapeError};

/// Rate limiter for polite scraping.
///
/// A fixed-interval gate: every permitted request is at least the configured
/// interval after the previous one. No bursts, no token bucket. The state
/// sits behind a mutex so concurrent fetches on a shared scraper cannot
/// squeeze two requests inside one interval.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    interval: Duration,
    last_request: Option<Instant>,
}

fn interval_for(requests_per_second: f64) -> Result<Duration> {
    if requests_per_second <= 0.0 {
        return Err(ScrapeError::General(format!(
            "requests_per_second must be positive, got {}",
            requests_per_second
        )));
    }
    Ok(Duration::from_secs_f64(1.0 / requests_per_second))
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(LimiterState {
                interval: interval_for(requests_per_second)?,
                last_request: None,
            }),
        })
    }

    /// Block until the configured interval has elapsed since the last
    /// permitted call, then record the new timestamp. Never fails.
    pub async fn throttle(&self) {
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < state.interval {
                sleep(state.interval - elapsed).await;
            }
        }
        state.last_request = Some(Instant::now());
    }

    /// Update the minimum interval to `1 / requests_per_second`, effective
    /// on the next `throttle()` call. Non-positive input is rejected and
    /// leaves the previous interval in place.
    pub async fn set_rate_limit(&self, requests_per_second: f64) -> Result<()> {
        let interval = interval_for(requests_per_second)?;
        self.state.lock().await.interval = interval;
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        // 2 requests per second, same default as the config surface
        Self {
            state: Mutex::new(LimiterState {
                interval: Duration::from_millis(500),
                last_request: None,
            }),
        }
    }
}

/// Round-robin pool of proxy endpoints with per-entry health counters.
///
/// Selection is pure rotation; the counters are advisory bookkeeping and
/// never influence ordering or membership. The pool never shrinks.
#[derive(Debug, Default)]
pub struct ProxyPool {
    state: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<ProxyEntry>,
    cursor: usize,
}

#[derive(Debug, Clone)]
struct ProxyEntry {
    endpoint: String,
    successes: u64,
    failures: u64,
}

/// Per-proxy health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyStats {
    pub endpoint: String,
    pub successes: u64,
    pub failures: u64,
}

impl ProxyPool {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = endpoints
            .into_iter()
            .map(|e| ProxyEntry {
                endpoint: e.into(),
                successes: 0,
                failures: 0,
            })
            .collect();
        Self {
            state: Mutex::new(PoolState { entries, cursor: 0 }),
        }
    }

    /// Next endpoint in round-robin order, or `None` when the pool is
    /// empty. Advances the cursor, wrapping after the last entry.
    pub async fn next_proxy(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        if state.entries.is_empty() {
            return None;
        }
        let endpoint = state.entries[state.cursor].endpoint.clone();
        state.cursor = (state.cursor + 1) % state.entries.len();
        Some(endpoint)
    }

    /// Append an endpoint. It is returned as soon as the cursor reaches the
    /// tail of the list, without disturbing the rotation in progress.
    pub async fn add_proxy(&self, endpoint: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.entries.push(ProxyEntry {
            endpoint: endpoint.into(),
            successes: 0,
            failures: 0,
        });
    }

    /// Bump the success or failure counter for an endpoint. Unknown
    /// endpoints are ignored.
    pub async fn record_outcome(&self, endpoint: &str, success: bool) {
        let mut state = self.state.lock().await;
        match state.entries.iter_mut().find(|e| e.endpoint == endpoint) {
            Some(entry) => {
                if success {
                    entry.successes += 1;
                } else {
                    entry.failures += 1;
                }
            }
            None => log::debug!("outcome recorded for unknown proxy {}", endpoint),
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Snapshot of the health counters, in rotation order.
    pub async fn stats(&self) -> Vec<ProxyStats> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .map(|e| ProxyStats {
                endpoint: e.endpoint.clone(),
                successes: e.successes,
                failures: e.failures,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_throttle_enforces_minimum_gap() {
        let limiter = RateLimiter::new(20.0).unwrap(); // 50ms interval
        let start = Instant::now();
        limiter.throttle().await;
        limiter.throttle().await;
        limiter.throttle().await;
        // First call is free, the next two each wait 50ms.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_three_calls_at_two_per_second() {
        let limiter = RateLimiter::new(2.0).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.throttle().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_set_rate_limit_rejects_non_positive() {
        let limiter = RateLimiter::new(4.0).unwrap();
        assert!(limiter.set_rate_limit(0.0).await.is_err());
        assert!(limiter.set_rate_limit(-1.0).await.is_err());
        // Previous interval untouched.
        assert_eq!(
            limiter.state.lock().await.interval,
            Duration::from_millis(250)
        );
    }

    #[tokio::test]
    async fn test_new_rejects_non_positive_rate() {
        assert!(RateLimiter::new(0.0).is_err());
        assert!(RateLimiter::new(-2.5).is_err());
    }

    #[tokio::test]
    async fn test_set_rate_limit_takes_effect_on_next_throttle() {
        let limiter = RateLimiter::new(1000.0).unwrap();
        limiter.set_rate_limit(20.0).await.unwrap();
        let start = Instant::now();
        limiter.throttle().await;
        limiter.throttle().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_round_robin_visits_each_once_then_wraps() {
        let pool = ProxyPool::new(["a", "b", "c"]);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(pool.next_proxy().await.unwrap());
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(pool.next_proxy().await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_two_proxies_alternate() {
        let pool = ProxyPool::new(["A", "B"]);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(pool.next_proxy().await.unwrap());
        }
        assert_eq!(seen, vec!["A", "B", "A", "B"]);
    }

    #[tokio::test]
    async fn test_empty_pool_yields_none() {
        let pool = ProxyPool::new(Vec::<String>::new());
        assert!(pool.next_proxy().await.is_none());
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_proxy_visible_when_cursor_reaches_tail() {
        let pool = ProxyPool::new(["a", "b"]);
        assert_eq!(pool.next_proxy().await.unwrap(), "a");
        pool.add_proxy("c").await;
        // Rotation in progress continues, then picks up the appended entry.
        assert_eq!(pool.next_proxy().await.unwrap(), "b");
        assert_eq!(pool.next_proxy().await.unwrap(), "c");
        assert_eq!(pool.next_proxy().await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_record_outcome_does_not_alter_rotation() {
        let pool = ProxyPool::new(["a", "b", "c"]);
        assert_eq!(pool.next_proxy().await.unwrap(), "a");
        pool.record_outcome("a", false).await;
        pool.record_outcome("a", false).await;
        pool.record_outcome("c", true).await;
        assert_eq!(pool.next_proxy().await.unwrap(), "b");
        assert_eq!(pool.next_proxy().await.unwrap(), "c");
        assert_eq!(pool.next_proxy().await.unwrap(), "a");

        let stats = pool.stats().await;
        assert_eq!(stats[0].failures, 2);
        assert_eq!(stats[2].successes, 1);
    }

    #[tokio::test]
    async fn test_record_outcome_for_unknown_endpoint_is_ignored() {
        let pool = ProxyPool::new(["a"]);
        pool.record_outcome("nope", true).await;
        let stats = pool.stats().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].successes, 0);
    }
}
