pub mod proxy;
pub mod rate_limiter;

pub use proxy::{Proxy, ProxyManager, ProxyPoolStats, ProxyStats};
pub use rate_limiter::RateLimiter;
