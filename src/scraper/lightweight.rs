use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, ScrapingError};
use crate::extractor::EmailExtractor;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize)]
pub struct LightweightResult {
    pub url: String,
    pub emails: Vec<String>,
    pub pages_processed: usize,
    pub emails_found: usize,
}

/// Single-page extraction over plain HTTP, for pages that render their
/// content server-side. No browser, no link following, no JavaScript; much
/// cheaper than a full crawl when one page is all that is needed.
pub struct LightweightScraper {
    client: reqwest::Client,
    extractor: EmailExtractor,
}

impl LightweightScraper {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapingError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            extractor: EmailExtractor::new()?,
        })
    }

    pub async fn scrape_emails(&self, url: &str) -> Result<LightweightResult> {
        info!("Lightweight scrape of {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapingError::NetworkError(format!("HTTP {} for {}", status, url)).into());
        }

        let body = response.text().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);

        let emails = self.extractor.extract(&body);
        let emails_found = emails.len();

        Ok(LightweightResult {
            url: url.to_string(),
            emails,
            pages_processed: 1,
            emails_found,
        })
    }
}
