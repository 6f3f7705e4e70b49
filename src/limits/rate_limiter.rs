use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, ScrapingError};

/// How many full acquisition rounds to attempt before giving up. Each round
/// sleeps for the exhausted budget's replenishment delay, so the worst case
/// is bounded rather than recursing forever.
const MAX_ACQUIRE_ATTEMPTS: u32 = 10;

/// A fixed-window budget: `points` operations per `window`, replenished when
/// the window rolls over.
#[derive(Debug)]
struct RateBudget {
    points: u32,
    window: Duration,
    consumed: u32,
    window_start: Instant,
}

impl RateBudget {
    fn new(points: u32) -> Self {
        Self {
            points,
            window: Duration::from_secs(1),
            consumed: 0,
            window_start: Instant::now(),
        }
    }

    /// Consume one point, or report how long until the window replenishes.
    fn try_consume(&mut self) -> std::result::Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= self.window {
            self.window_start = now;
            self.consumed = 0;
        }

        if self.consumed < self.points {
            self.consumed += 1;
            Ok(())
        } else {
            Err(self.window.saturating_sub(now.duration_since(self.window_start)))
        }
    }
}

/// Throttles requests against three independent budgets: a global
/// requests-per-second pool, a lazily created per-domain pool, and a
/// concurrency pool. All three must grant before a request proceeds.
///
/// The per-domain map is never evicted; the limiter is meant to be owned by
/// the embedder and live for a bounded set of crawl jobs, so the map is
/// bounded by the domains those jobs touch.
pub struct RateLimiter {
    global: Mutex<RateBudget>,
    domains: Mutex<HashMap<String, RateBudget>>,
    concurrent: Mutex<RateBudget>,
    domain_per_second: u32,
}

impl RateLimiter {
    pub fn new(global_per_second: u32, domain_per_second: u32, max_concurrent: u32) -> Self {
        Self {
            global: Mutex::new(RateBudget::new(global_per_second)),
            domains: Mutex::new(HashMap::new()),
            concurrent: Mutex::new(RateBudget::new(max_concurrent)),
            domain_per_second,
        }
    }

    /// Block until all three budgets grant a permit for `url`, or fail with
    /// `RateLimitExceeded` once the attempt ceiling is reached.
    ///
    /// When any budget is exhausted the caller sleeps for that budget's
    /// replenishment delay and then retries the whole acquisition from the
    /// start, so a saturated domain cannot hold permits hostage while other
    /// domains replenish.
    pub async fn acquire(&self, url: &str) -> Result<()> {
        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| url.to_string());

        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            match self.try_consume_all(&domain).await {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    debug!(
                        "Rate budget exhausted for {} (attempt {}), waiting {:?}",
                        domain, attempt, wait
                    );
                    // A zero wait still yields so the window can roll over.
                    sleep(wait.max(Duration::from_millis(1))).await;
                }
            }
        }

        warn!("Rate limit acquisition gave up for domain {}", domain);
        Err(ScrapingError::RateLimitExceeded(format!(
            "could not acquire permit for {} after {} attempts",
            domain, MAX_ACQUIRE_ATTEMPTS
        ))
        .into())
    }

    /// Override the budget for one domain.
    pub async fn set_domain_limit(&self, domain: &str, per_second: u32) {
        let mut domains = self.domains.lock().await;
        domains.insert(domain.to_string(), RateBudget::new(per_second));
    }

    /// One pass over global, per-domain and concurrency budgets, in that
    /// order. The first exhausted budget aborts the pass with its delay.
    async fn try_consume_all(&self, domain: &str) -> std::result::Result<(), Duration> {
        {
            let mut global = self.global.lock().await;
            global.try_consume()?;
        }

        {
            let mut domains = self.domains.lock().await;
            let budget = domains
                .entry(domain.to_string())
                .or_insert_with(|| RateBudget::new(self.domain_per_second));
            budget.try_consume()?;
        }

        let mut concurrent = self.concurrent.lock().await;
        concurrent.try_consume()
    }
}
