use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, ResourceType, SetBlockedUrLsParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::browser::{BrowserSession, UserAgentGenerator};
use crate::error::{Result, ScrapingError};

/// Subresource patterns blocked on every fetch. Images, stylesheets and
/// fonts contribute nothing to email extraction and dominate page weight.
const BLOCKED_RESOURCE_PATTERNS: [&str; 10] = [
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.css", "*.woff", "*.woff2", "*.ttf",
];

/// Fixed settle delay after a successful navigation, giving late scripts a
/// moment to inject contact markup before the content snapshot.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How long to wait for the document's network response after navigation
/// before giving up on a status code.
const STATUS_WAIT: Duration = Duration::from_millis(500);

/// Outcome of fetching one URL. Failures are captured here, never raised:
/// the crawl must be able to continue past any single bad page.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    /// Final URL after redirects.
    pub url: String,
    pub content: Option<String>,
    pub status: Option<i64>,
    pub success: bool,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn succeeded(url: String, content: String, status: Option<i64>) -> Self {
        Self {
            url,
            content: Some(content),
            status,
            success: true,
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: None,
            status: None,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// The seam between the orchestrator and whatever produces page content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Establish whatever long-lived resources fetching needs. Failure here
    /// is fatal to the crawl.
    async fn prepare(&self) -> Result<()>;

    /// Fetch one URL into rendered content. Must not fail the whole crawl;
    /// per-URL errors are reported inside the result.
    async fn fetch(&self, url: &str) -> FetchResult;

    async fn shutdown(&self);
}

/// How lenient each navigation attempt is about declaring the page loaded.
/// Later attempts wait for more of the page, trading latency for success on
/// slow or script-heavy sites. Exact thresholds are tunable heuristics.
#[derive(Debug, Clone, Copy)]
enum WaitStrategy {
    ContentParsed,
    NetworkQuiet,
    FullLoad,
}

impl WaitStrategy {
    fn extra_wait(&self) -> Option<Duration> {
        match self {
            WaitStrategy::ContentParsed => None,
            WaitStrategy::NetworkQuiet => Some(Duration::from_secs(2)),
            WaitStrategy::FullLoad => Some(Duration::from_secs(5)),
        }
    }
}

/// Per-attempt navigation plan: escalating timeouts paired with increasingly
/// lenient completion criteria.
fn navigation_attempts(base_timeout: Duration) -> [(Duration, WaitStrategy); 3] {
    [
        (base_timeout / 2, WaitStrategy::ContentParsed),
        (base_timeout, WaitStrategy::NetworkQuiet),
        (base_timeout * 3 / 2, WaitStrategy::FullLoad),
    ]
}

/// Renders one URL at a time inside the shared browser session. Each fetch
/// gets its own isolated page with a randomized user agent and blocked
/// static subresources; the page is always released afterwards.
pub struct PageFetcher {
    session: BrowserSession,
    user_agents: UserAgentGenerator,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(session: BrowserSession, timeout: Duration) -> Self {
        Self {
            session,
            user_agents: UserAgentGenerator::new(),
            timeout,
        }
    }

    async fn fetch_on_page(&self, page: &Page, url: &str) -> Result<FetchResult> {
        let started = Instant::now();

        // Randomized user agent per fetch.
        let user_agent = self.user_agents.random_user_agent().to_string();
        let ua_params = SetUserAgentOverrideParams::builder()
            .user_agent(&user_agent)
            .build()
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to build user agent params: {}", e)))?;
        page.execute(ua_params).await?;
        debug!("Set user agent: {}", user_agent);

        // Block static subresources before navigating.
        page.execute(EnableParams::default()).await?;
        let blocked: Vec<String> = BLOCKED_RESOURCE_PATTERNS.iter().map(|p| p.to_string()).collect();
        page.execute(SetBlockedUrLsParams::new(blocked)).await?;

        // Listen for the document response so the HTTP status is available.
        let mut responses = page.event_listener::<EventResponseReceived>().await?;

        // Tiered navigation: bounded attempt loop with escalating timeouts
        // and progressively more lenient wait strategies.
        let mut navigated = false;
        let mut last_error = String::new();
        let attempts = navigation_attempts(self.timeout);

        for (index, (attempt_timeout, strategy)) in attempts.iter().enumerate() {
            let attempt = index + 1;
            debug!(
                "Navigating to {} (attempt {}, timeout {:?}, strategy {:?})",
                url, attempt, attempt_timeout, strategy
            );

            match timeout(*attempt_timeout, page.goto(url)).await {
                Ok(Ok(_)) => {
                    if let Some(extra) = strategy.extra_wait() {
                        let _ = timeout(extra, page.wait_for_navigation()).await;
                    }
                    navigated = true;
                    break;
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    warn!("Navigation attempt {} failed for {}: {}", attempt, url, last_error);
                }
                Err(_) => {
                    last_error = format!("navigation timed out after {:?}", attempt_timeout);
                    warn!("Navigation attempt {} timed out for {}", attempt, url);
                }
            }

            if attempt < attempts.len() {
                sleep(Duration::from_secs(2 * attempt as u64)).await;
            }
        }

        if !navigated {
            return Err(ScrapingError::NavigationError(format!(
                "navigation to {} failed after {} attempts: {}",
                url,
                attempts.len(),
                last_error
            ))
            .into());
        }

        // Pick the document response off the event stream, if one arrived.
        let mut status = None;
        while let Ok(Some(event)) = timeout(STATUS_WAIT, responses.next()).await {
            if matches!(event.r#type, ResourceType::Document) {
                status = Some(event.response.status);
                break;
            }
        }

        if let Some(code) = status {
            if !(200..400).contains(&code) {
                return Err(ScrapingError::NavigationError(format!("HTTP {} for {}", code, url)).into());
            }
        }

        // Let late scripts finish before snapshotting content.
        sleep(SETTLE_DELAY).await;

        let content = page.content().await?;
        let final_url = page
            .url()
            .await?
            .unwrap_or_else(|| url.to_string());

        debug!("Fetched {} ({} bytes)", final_url, content.len());
        self.session.note_success(started.elapsed()).await;

        Ok(FetchResult::succeeded(final_url, content, status))
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn prepare(&self) -> Result<()> {
        self.session.ensure_connected().await
    }

    async fn fetch(&self, url: &str) -> FetchResult {
        let page = match self.session.new_page().await {
            Ok(page) => page,
            Err(e) => return FetchResult::failed(url, e.to_string()),
        };

        let result = self.fetch_on_page(&page, url).await;

        // The page is released whether the fetch worked or not.
        if let Err(e) = page.close().await {
            warn!("Error closing page for {}: {}", url, e);
        }

        match result {
            Ok(result) => result,
            Err(e) => FetchResult::failed(url, e.to_string()),
        }
    }

    async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}
