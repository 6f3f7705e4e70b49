pub mod browser;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod limits;
pub mod scraper;

pub use config::Config;
pub use crawler::{CrawlJob, CrawlOrchestrator, CrawlResult};
pub use error::{Result, ScrapingError};
pub use extractor::EmailExtractor;
