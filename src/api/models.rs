use std::time::Duration;

/// Result of a header-only probe. A size of 0 means unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub size: u64,
    pub filename: String,
    /// Why the probe came back empty-handed, if it did.
    pub failure: Option<String>,
}

impl ProbeResult {
    pub fn known_size(&self) -> Option<u64> {
        (self.size > 0).then_some(self.size)
    }
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
            user_agent: concat!("url-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
