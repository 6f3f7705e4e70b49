use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum ScrapingError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Navigation error: {0}")]
    NavigationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Crawl error: {0}")]
    CrawlError(String),
}

#[derive(Debug)]
pub enum RecoveryStrategy {
    RetryWithBackoff,
    RestartBrowser,
    LogAndContinue,
    WaitAndRetry,
    AbortCrawl,
}

impl ScrapingError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ScrapingError::NetworkError(_) => RecoveryStrategy::RetryWithBackoff,
            ScrapingError::BrowserError(_) => RecoveryStrategy::RestartBrowser,
            ScrapingError::NavigationError(_) => RecoveryStrategy::RetryWithBackoff,
            ScrapingError::ParseError(_) => RecoveryStrategy::LogAndContinue,
            ScrapingError::ConfigError(_) => RecoveryStrategy::AbortCrawl,
            ScrapingError::RateLimitExceeded(_) => RecoveryStrategy::WaitAndRetry,
            ScrapingError::CrawlError(_) => RecoveryStrategy::AbortCrawl,
        }
    }
}

// Conversion implementations for common error types
impl From<std::io::Error> for ScrapingError {
    fn from(err: std::io::Error) -> Self {
        ScrapingError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapingError {
    fn from(err: serde_json::Error) -> Self {
        ScrapingError::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for ScrapingError {
    fn from(err: toml::de::Error) -> Self {
        ScrapingError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ScrapingError {
    fn from(err: reqwest::Error) -> Self {
        ScrapingError::NetworkError(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapingError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapingError::BrowserError(err.to_string())
    }
}

impl From<url::ParseError> for ScrapingError {
    fn from(err: url::ParseError) -> Self {
        ScrapingError::CrawlError(err.to_string())
    }
}
