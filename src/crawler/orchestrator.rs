use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::crawler::frontier::CrawlFrontier;
use crate::crawler::job::{CrawlJob, CrawlResult, CrawlState};
use crate::error::Result;
use crate::extractor::EmailExtractor;
use crate::fetcher::{FetchResult, Fetcher};
use crate::limits::RateLimiter;

/// Drives one crawl end to end: pulls URLs off the frontier, dispatches
/// bounded concurrent fetches behind the rate limiter, extracts addresses
/// from each page, and feeds discovered links back in until the frontier
/// drains or the page budget runs out.
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    rate_limiter: Arc<RateLimiter>,
    extractor: EmailExtractor,
    state: RwLock<CrawlState>,
}

struct TaskOutcome {
    depth: usize,
    fetch: FetchResult,
}

impl CrawlOrchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        rate_limiter: Arc<RateLimiter>,
        extractor: EmailExtractor,
    ) -> Self {
        Self {
            fetcher,
            rate_limiter,
            extractor,
            state: RwLock::new(CrawlState::Idle),
        }
    }

    pub async fn state(&self) -> CrawlState {
        *self.state.read().await
    }

    /// Run a job to completion. Per-page failures are counted and skipped;
    /// only setup failures (bad job, fetcher that cannot start) abort the
    /// crawl.
    pub async fn run(&self, job: &CrawlJob) -> Result<CrawlResult> {
        let started_at = Utc::now();
        self.set_state(CrawlState::Initializing).await;

        if let Err(e) = job.validate() {
            self.set_state(CrawlState::Failed).await;
            return Err(e);
        }

        if let Err(e) = self.fetcher.prepare().await {
            error!("Failed to prepare fetcher: {}", e);
            self.set_state(CrawlState::Failed).await;
            return Err(e);
        }

        info!(
            "Starting crawl {} with {} seed(s), max_depth={}, max_pages={}",
            job.id,
            job.seeds.len(),
            job.max_depth,
            job.max_pages
        );

        let mut frontier = CrawlFrontier::new(job.max_depth);
        frontier.seed(&job.seeds);

        let mut emails = BTreeSet::new();
        let mut pages_processed = 0usize;
        let mut requests_succeeded = 0usize;
        let mut requests_failed = 0usize;
        let mut dispatched = 0usize;
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();

        self.set_state(CrawlState::Running).await;

        loop {
            // Fill free slots while the page budget allows new dispatches.
            while tasks.len() < job.concurrent && dispatched < job.max_pages {
                let Some(entry) = frontier.next() else {
                    break;
                };

                dispatched += 1;
                let fetcher = self.fetcher.clone();
                let rate_limiter = self.rate_limiter.clone();
                let url = entry.url.clone();
                let depth = entry.depth;

                tasks.spawn(async move {
                    if let Err(e) = rate_limiter.acquire(&url).await {
                        return TaskOutcome {
                            depth,
                            fetch: FetchResult::failed(url, e.to_string()),
                        };
                    }
                    let fetch = fetcher.fetch(&url).await;
                    TaskOutcome { depth, fetch }
                });

                // Pacing between dispatches, on top of the limiter.
                if !job.delay.is_zero() {
                    sleep(job.delay).await;
                }
            }

            if dispatched >= job.max_pages && self.state().await == CrawlState::Running {
                info!("Page budget reached, draining in-flight fetches");
                self.set_state(CrawlState::Draining).await;
            }

            let Some(joined) = tasks.join_next().await else {
                // No tasks in flight and nothing left to dispatch.
                break;
            };

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Crawl task panicked: {}", e);
                    requests_failed += 1;
                    continue;
                }
            };

            pages_processed += 1;

            if outcome.fetch.success {
                requests_succeeded += 1;
                let content = outcome.fetch.content.as_deref().unwrap_or("");
                let page_emails = self.extractor.extract(content);
                if !page_emails.is_empty() {
                    info!(
                        "Found {} email(s) on {}",
                        page_emails.len(),
                        outcome.fetch.url
                    );
                }
                emails.extend(page_emails);

                let hrefs = self.extractor.collect_hrefs(content);
                frontier.discover(&outcome.fetch.url, &hrefs, outcome.depth);
            } else {
                requests_failed += 1;
                warn!(
                    "Fetch failed for {}: {}",
                    outcome.fetch.url,
                    outcome.fetch.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        self.set_state(CrawlState::Completed).await;

        let result = CrawlResult {
            job_id: job.id,
            emails: emails.into_iter().collect(),
            pages_processed,
            requests_succeeded,
            requests_failed,
            total_urls_discovered: frontier.total_discovered(),
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Crawl {} completed: {} pages, {} failures, {} unique email(s)",
            job.id,
            result.pages_processed,
            result.requests_failed,
            result.emails_found()
        );

        Ok(result)
    }

    async fn set_state(&self, state: CrawlState) {
        *self.state.write().await = state;
    }
}
