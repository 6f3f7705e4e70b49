use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::crawler::{CrawlJob, CrawlOrchestrator, CrawlState};
use crate::error::{Result, ScrapingError};
use crate::extractor::EmailExtractor;
use crate::fetcher::{FetchResult, Fetcher};
use crate::limits::RateLimiter;

/// Serves canned pages from memory and records every URL it is asked for.
struct StubFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
    fail_prepare: bool,
}

impl StubFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            fetched: Mutex::new(Vec::new()),
            fail_prepare: false,
        }
    }

    fn failing_prepare() -> Self {
        Self {
            pages: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
            fail_prepare: true,
        }
    }

    fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn prepare(&self) -> Result<()> {
        if self.fail_prepare {
            return Err(ScrapingError::BrowserError("browser unavailable".to_string()).into());
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> FetchResult {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(body) => FetchResult::succeeded(url.to_string(), body.clone(), Some(200)),
            None => FetchResult::failed(url, "HTTP 404"),
        }
    }

    async fn shutdown(&self) {}
}

fn orchestrator(fetcher: Arc<StubFetcher>) -> CrawlOrchestrator {
    // Generous budgets so tests exercise crawl logic, not throttling.
    let limiter = Arc::new(RateLimiter::new(1000, 1000, 1000));
    let extractor = EmailExtractor::new().expect("Failed to create extractor");
    CrawlOrchestrator::new(fetcher, limiter, extractor)
}

fn fast_job(seeds: &[&str]) -> CrawlJob {
    let mut job = CrawlJob::new(seeds.iter().map(|s| s.to_string()).collect());
    job.delay = Duration::ZERO;
    job
}

#[tokio::test]
async fn test_single_page_no_discovery_at_depth_zero() {
    let fetcher = Arc::new(StubFetcher::new(&[(
        "https://a.test/",
        r#"<html><body>
            <p>Write to sales@widgets.io</p>
            <a href="/about">About</a>
        </body></html>"#,
    )]));

    let mut job = fast_job(&["https://a.test/"]);
    job.max_depth = 0;

    let orch = orchestrator(fetcher.clone());
    let result = orch.run(&job).await.unwrap();

    assert_eq!(result.pages_processed, 1);
    assert_eq!(result.requests_failed, 0);
    assert_eq!(result.total_urls_discovered, 1);
    assert_eq!(result.emails, vec!["sales@widgets.io"]);
    assert_eq!(fetcher.fetched_urls(), vec!["https://a.test/"]);
    assert_eq!(orch.state().await, CrawlState::Completed);
}

#[tokio::test]
async fn test_follows_links_and_aggregates_emails() {
    let fetcher = Arc::new(StubFetcher::new(&[
        (
            "https://a.test/",
            r#"<html><body>
                <a href="/contact">Contact</a>
                <a href="/team">Team</a>
            </body></html>"#,
        ),
        (
            "https://a.test/contact",
            r#"<html><body><a href="mailto:info@a.test">Mail us</a></body></html>"#,
        ),
        (
            "https://a.test/team",
            r#"<html><body><p>ceo [at] a [dot] test</p></body></html>"#,
        ),
    ]));

    let job = fast_job(&["https://a.test/"]);
    let result = orchestrator(fetcher.clone()).run(&job).await.unwrap();

    assert_eq!(result.pages_processed, 3);
    assert_eq!(result.emails, vec!["ceo@a.test", "info@a.test"]);
}

#[tokio::test]
async fn test_partial_failures_do_not_stop_the_crawl() {
    let fetcher = Arc::new(StubFetcher::new(&[
        ("https://a.test/", "<html><body>one@a.test</body></html>"),
        ("https://b.test/", "<html><body>two@b.test</body></html>"),
        ("https://e.test/", "<html><body>three@e.test</body></html>"),
    ]));

    let job = fast_job(&[
        "https://a.test/",
        "https://b.test/",
        "https://c.test/",
        "https://d.test/",
        "https://e.test/",
    ]);
    let result = orchestrator(fetcher).run(&job).await.unwrap();

    assert_eq!(result.pages_processed, 5);
    assert_eq!(result.requests_succeeded, 3);
    assert_eq!(result.requests_failed, 2);
    assert_eq!(result.emails, vec!["one@a.test", "three@e.test", "two@b.test"]);
}

#[tokio::test]
async fn test_page_budget_is_enforced() {
    // Every page links to two more, so the frontier never drains on its own.
    let mut pages = vec![(
        "https://a.test/".to_string(),
        r#"<html><body><a href="/p1">1</a><a href="/p2">2</a></body></html>"#.to_string(),
    )];
    for i in 1..20 {
        pages.push((
            format!("https://a.test/p{}", i),
            format!(
                r#"<html><body><a href="/p{}">n</a><a href="/p{}">n</a></body></html>"#,
                i * 2 + 1,
                i * 2 + 2
            ),
        ));
    }
    let page_refs: Vec<(&str, &str)> = pages
        .iter()
        .map(|(u, b)| (u.as_str(), b.as_str()))
        .collect();
    let fetcher = Arc::new(StubFetcher::new(&page_refs));

    let mut job = fast_job(&["https://a.test/"]);
    job.max_pages = 5;
    job.max_depth = 10;

    let result = orchestrator(fetcher.clone()).run(&job).await.unwrap();

    assert_eq!(result.pages_processed, 5);
    assert_eq!(fetcher.fetched_urls().len(), 5);
}

#[tokio::test]
async fn test_depth_bound_limits_traversal() {
    let fetcher = Arc::new(StubFetcher::new(&[
        (
            "https://a.test/",
            r#"<html><body><a href="/depth1">1</a></body></html>"#,
        ),
        (
            "https://a.test/depth1",
            r#"<html><body><a href="/depth2">2</a></body></html>"#,
        ),
        (
            "https://a.test/depth2",
            r#"<html><body><a href="/depth3">3</a></body></html>"#,
        ),
        ("https://a.test/depth3", "<html><body>deep@a.test</body></html>"),
    ]));

    let mut job = fast_job(&["https://a.test/"]);
    job.max_depth = 2;

    let result = orchestrator(fetcher.clone()).run(&job).await.unwrap();

    assert_eq!(result.pages_processed, 3);
    assert!(result.emails.is_empty());
    assert!(!fetcher
        .fetched_urls()
        .contains(&"https://a.test/depth3".to_string()));
}

#[tokio::test]
async fn test_offsite_links_never_fetched() {
    let fetcher = Arc::new(StubFetcher::new(&[
        (
            "https://a.test/",
            r#"<html><body>
                <a href="https://blog.a.test/">blog</a>
                <a href="https://elsewhere.test/">away</a>
            </body></html>"#,
        ),
        ("https://blog.a.test/", "<html><body>press@a.test</body></html>"),
        ("https://elsewhere.test/", "<html><body>spam@elsewhere.test</body></html>"),
    ]));

    let job = fast_job(&["https://a.test/"]);
    let result = orchestrator(fetcher.clone()).run(&job).await.unwrap();

    assert_eq!(result.emails, vec!["press@a.test"]);
    assert!(!fetcher
        .fetched_urls()
        .contains(&"https://elsewhere.test/".to_string()));
}

#[tokio::test]
async fn test_emails_deduplicated_across_pages() {
    let fetcher = Arc::new(StubFetcher::new(&[
        (
            "https://a.test/",
            r#"<html><body>Sales@Widgets.io <a href="/contact">c</a></body></html>"#,
        ),
        (
            "https://a.test/contact",
            "<html><body>sales@widgets.io and SALES@WIDGETS.IO</body></html>",
        ),
    ]));

    let job = fast_job(&["https://a.test/"]);
    let result = orchestrator(fetcher).run(&job).await.unwrap();

    assert_eq!(result.emails, vec!["sales@widgets.io"]);
}

#[tokio::test]
async fn test_prepare_failure_aborts_crawl() {
    let fetcher = Arc::new(StubFetcher::failing_prepare());
    let orch = orchestrator(fetcher);

    let job = fast_job(&["https://a.test/"]);
    let outcome = orch.run(&job).await;

    assert!(outcome.is_err());
    assert_eq!(orch.state().await, CrawlState::Failed);
}

#[tokio::test]
async fn test_invalid_job_rejected() {
    let fetcher = Arc::new(StubFetcher::new(&[]));
    let orch = orchestrator(fetcher);

    let job = fast_job(&[]);
    assert!(orch.run(&job).await.is_err());
    assert_eq!(orch.state().await, CrawlState::Failed);
}
