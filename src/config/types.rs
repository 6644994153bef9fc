use serde::Deserialize;

/// Browser-like user agent; several hosts refuse obvious bot strings.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 reshelf/0.1";

/// Main configuration structure for Reshelf
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Database location
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file; the user config directory is used
    /// when unset
    pub path: Option<String>,
}

/// Refresh run behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of fetches allowed to hold a regular concurrency slot
    pub threads: u32,

    /// Total attempts per bookmark, including the first one
    pub retries: u32,

    /// Per-request timeout (seconds)
    pub timeout: u64,

    /// Pause between two attempts on the same bookmark (milliseconds)
    #[serde(rename = "retry-delay")]
    pub retry_delay: u64,

    /// Extra slots retrying fetches move into so fresh bookmarks can start;
    /// 0 disables early release
    #[serde(rename = "early-release-slots")]
    pub early_release_slots: u32,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Skip TLS certificate validation
    #[serde(rename = "accept-invalid-certs")]
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            threads: 6,
            retries: 2,
            timeout: 10,
            retry_delay: 3000,
            early_release_slots: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: true,
        }
    }
}
