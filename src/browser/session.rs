use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ScrapingError};
use crate::limits::{Proxy, ProxyManager};

const LAUNCH_ATTEMPTS: u32 = 3;
const LAUNCH_BACKOFF: Duration = Duration::from_secs(2);
const PAGE_CREATE_ATTEMPTS: u32 = 3;
const PAGE_CREATE_TIMEOUT: Duration = Duration::from_secs(10);

struct SessionInner {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    disconnected: Arc<AtomicBool>,
    proxy: Option<Proxy>,
}

/// A single shared headless Chromium session, reused across all concurrent
/// fetches. The session is launched lazily and health-checked before each
/// use: when the CDP event stream ends, the handler task flips the
/// disconnected flag and the next caller relaunches instead of reacting to
/// a disconnect event.
pub struct BrowserSession {
    inner: Mutex<Option<SessionInner>>,
    proxy_manager: Arc<ProxyManager>,
}

impl BrowserSession {
    pub fn new(proxy_manager: Arc<ProxyManager>) -> Self {
        Self {
            inner: Mutex::new(None),
            proxy_manager,
        }
    }

    /// Check-then-recreate: make sure a connected browser exists, launching
    /// one if needed. Launch failures past the retry ceiling are fatal to
    /// the whole crawl.
    pub async fn ensure_connected(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if let Some(session) = inner.as_ref() {
            if !session.disconnected.load(Ordering::SeqCst) {
                return Ok(());
            }
            warn!("Browser session disconnected, relaunching");
        }

        // Tear down whatever is left of the old session before relaunching.
        if let Some(mut old) = inner.take() {
            let _ = old.browser.close().await;
            old.handler_task.abort();
        }

        let session = self.launch().await?;
        *inner = Some(session);
        Ok(())
    }

    /// Open a fresh isolated page in the shared session. A transport-level
    /// failure discards the whole session so the next attempt relaunches.
    pub async fn new_page(&self) -> Result<Page> {
        let mut last_error = String::new();

        for attempt in 1..=PAGE_CREATE_ATTEMPTS {
            self.ensure_connected().await?;

            let page_result = {
                let inner = self.inner.lock().await;
                let session = inner
                    .as_ref()
                    .ok_or_else(|| ScrapingError::BrowserError("Browser session missing".to_string()))?;
                tokio::time::timeout(PAGE_CREATE_TIMEOUT, session.browser.new_page("about:blank")).await
            };

            match page_result {
                Ok(Ok(page)) => {
                    debug!("Created browser page on attempt {}", attempt);
                    return Ok(page);
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    warn!("Failed to create page (attempt {}): {}", attempt, last_error);
                    // Transport errors mean the session itself is broken.
                    if last_error.contains("Connection closed")
                        || last_error.contains("Protocol error")
                        || last_error.contains("channel")
                    {
                        self.discard_session().await;
                    }
                }
                Err(_) => {
                    last_error = "timeout creating new page".to_string();
                    warn!("Timeout creating page (attempt {})", attempt);
                    self.discard_session().await;
                }
            }

            if attempt < PAGE_CREATE_ATTEMPTS {
                sleep(Duration::from_secs(1)).await;
            }
        }

        Err(ScrapingError::BrowserError(format!(
            "Failed to create page after {} attempts: {}",
            PAGE_CREATE_ATTEMPTS, last_error
        ))
        .into())
    }

    /// Record a successful request against the proxy the session launched
    /// with, if any.
    pub async fn note_success(&self, latency: Duration) {
        let inner = self.inner.lock().await;
        if let Some(session) = inner.as_ref() {
            if let Some(proxy) = &session.proxy {
                self.proxy_manager.mark_success(proxy, latency);
            }
        }
    }

    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut session) = inner.take() {
            info!("Shutting down browser session");
            if let Err(e) = session.browser.close().await {
                warn!("Error during browser shutdown: {}", e);
            }
            session.handler_task.abort();
        }
    }

    async fn discard_session(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut session) = inner.take() {
            warn!("Discarding broken browser session");
            let _ = session.browser.close().await;
            session.handler_task.abort();
        }
    }

    async fn launch(&self) -> Result<SessionInner> {
        let proxy = self.proxy_manager.next();

        let mut args: Vec<String> = vec![
            "--headless".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-extensions".to_string(),
            "--disable-plugins".to_string(),
            "--mute-audio".to_string(),
            "--no-first-run".to_string(),
            "--disable-default-apps".to_string(),
            "--disable-sync".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-background-timer-throttling".to_string(),
            "--disable-renderer-backgrounding".to_string(),
            "--disable-backgrounding-occluded-windows".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--window-size=1920,1080".to_string(),
            "--log-level=3".to_string(),
        ];

        if let Some(proxy) = &proxy {
            args.push(format!("--proxy-server={}", proxy.url()));
        }

        let browser_config = BrowserConfig::builder()
            .no_sandbox()
            .args(args)
            .build()
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to create browser config: {}", e)))?;

        info!("Launching headless browser...");

        let mut last_error = None;
        for attempt in 1..=LAUNCH_ATTEMPTS {
            match Browser::launch(browser_config.clone()).await {
                Ok((browser, mut handler)) => {
                    info!("Browser launched successfully on attempt {}", attempt);

                    let disconnected = Arc::new(AtomicBool::new(false));
                    let flag = disconnected.clone();

                    let handler_task = tokio::spawn(async move {
                        while let Some(h) = handler.next().await {
                            if let Err(e) = h {
                                // filter out common websocket deserialization errors
                                let error_msg = e.to_string();
                                if error_msg.contains("data did not match any variant")
                                    || error_msg.contains("untagged enum Message")
                                {
                                    debug!("Ignoring WebSocket deserialization error: {}", e);
                                } else {
                                    warn!("Browser handler error: {}", e);
                                }
                            }
                        }
                        debug!("Browser handler stream ended");
                        flag.store(true, Ordering::SeqCst);
                    });

                    return Ok(SessionInner {
                        browser,
                        handler_task,
                        disconnected,
                        proxy,
                    });
                }
                Err(e) => {
                    error!("Browser launch attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < LAUNCH_ATTEMPTS {
                        sleep(LAUNCH_BACKOFF).await;
                    }
                }
            }
        }

        if let Some(proxy) = &proxy {
            self.proxy_manager.mark_failed(proxy);
        }

        Err(ScrapingError::BrowserError(format!(
            "Failed to launch browser after {} attempts: {}",
            LAUNCH_ATTEMPTS,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ))
        .into())
    }
}
