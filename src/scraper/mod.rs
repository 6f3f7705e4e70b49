pub mod lightweight;

pub use lightweight::{LightweightResult, LightweightScraper};
