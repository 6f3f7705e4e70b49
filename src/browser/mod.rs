pub mod session;
pub mod stealth;

pub use session::BrowserSession;
pub use stealth::UserAgentGenerator;
