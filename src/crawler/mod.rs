pub mod frontier;
pub mod job;
pub mod orchestrator;

pub use frontier::{CrawlFrontier, FrontierEntry};
pub use job::{CrawlJob, CrawlResult, CrawlState};
pub use orchestrator::CrawlOrchestrator;

#[cfg(test)]
mod tests;
