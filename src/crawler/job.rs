use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::config::CrawlConfig;
use crate::error::{Result, ScrapingError};

/// One crawl request: the seed URLs plus the bounds the crawl must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: Uuid,
    pub seeds: Vec<String>,
    /// Link-hops from a seed beyond which pages are not followed.
    pub max_depth: usize,
    /// Hard ceiling on pages fetched across the whole job.
    pub max_pages: usize,
    /// Pause between dispatching successive fetches.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// How many fetches may be in flight at once.
    pub concurrent: usize,
    /// Per-page navigation budget.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl CrawlJob {
    pub fn new(seeds: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seeds,
            max_depth: 2,
            max_pages: 50,
            delay: Duration::from_millis(1000),
            concurrent: 3,
            timeout: Duration::from_millis(30000),
        }
    }

    pub fn from_config(seeds: Vec<String>, config: &CrawlConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            seeds,
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            delay: Duration::from_millis(config.delay_ms),
            concurrent: config.concurrent,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Seeds must be absolute http(s) URLs with a hostname; anything else is
    /// rejected before the crawl starts.
    pub fn validate(&self) -> Result<()> {
        if self.seeds.is_empty() {
            return Err(ScrapingError::CrawlError("No seed URLs provided".to_string()).into());
        }

        for seed in &self.seeds {
            let url = Url::parse(seed)
                .map_err(|e| ScrapingError::CrawlError(format!("Invalid seed URL {}: {}", seed, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ScrapingError::CrawlError(format!(
                    "Unsupported scheme in seed URL {}",
                    seed
                ))
                .into());
            }
            if url.host_str().is_none() {
                return Err(
                    ScrapingError::CrawlError(format!("Seed URL {} has no host", seed)).into(),
                );
            }
        }

        Ok(())
    }
}

/// Lifecycle of a crawl from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlState {
    Idle,
    Initializing,
    Running,
    /// Page budget reached; in-flight fetches finish but nothing new starts.
    Draining,
    Completed,
    Failed,
}

/// What a finished crawl produced.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub job_id: Uuid,
    /// Unique lowercase addresses, sorted.
    pub emails: Vec<String>,
    pub pages_processed: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    /// Everything ever admitted to the frontier, fetched or not.
    pub total_urls_discovered: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlResult {
    pub fn emails_found(&self) -> usize {
        self.emails.len()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
