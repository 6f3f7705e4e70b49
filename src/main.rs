use std::path::PathBuf;
use std::sync::Arc;

use email_harvester::browser::BrowserSession;
use email_harvester::config::{ConfigManager, FileConfigManager};
use email_harvester::crawler::{CrawlJob, CrawlOrchestrator};
use email_harvester::extractor::EmailExtractor;
use email_harvester::fetcher::{Fetcher, PageFetcher};
use email_harvester::limits::{ProxyManager, RateLimiter};
use email_harvester::scraper::LightweightScraper;

#[tokio::main]
async fn main() -> email_harvester::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let lightweight = args.first().map(|a| a == "--lightweight").unwrap_or(false);
    if lightweight {
        args.remove(0);
    }

    if args.is_empty() {
        eprintln!("Usage: email-harvester [--lightweight] <url> [<url>...]");
        std::process::exit(2);
    }

    // Plain HTTP mode needs no config or browser.
    if lightweight {
        let scraper = LightweightScraper::new()?;
        for url in &args {
            match scraper.scrape_emails(url).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(e) => tracing::error!("Scrape of {} failed: {}", url, e),
            }
        }
        return Ok(());
    }

    let config_manager = FileConfigManager::new(PathBuf::from("config.toml"));
    let config = config_manager.load_config().await?;

    tracing::info!("Starting email harvester");

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limits.global_per_second,
        config.rate_limits.domain_per_second,
        config.rate_limits.max_concurrent,
    ));
    let proxy_manager = Arc::new(ProxyManager::new(
        config.proxies.enabled,
        config.proxies.list.clone(),
    ));
    let session = BrowserSession::new(proxy_manager);

    let job = CrawlJob::from_config(args, &config.crawl);
    let fetcher = Arc::new(PageFetcher::new(session, job.timeout));
    let orchestrator = CrawlOrchestrator::new(fetcher.clone(), rate_limiter, EmailExtractor::new()?);

    let outcome = orchestrator.run(&job).await;
    fetcher.shutdown().await;

    let result = outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    tracing::info!("Email harvester stopped.");
    Ok(())
}
