//! Reshelf: keeps a personal bookmark archive fresh
//!
//! This crate re-fetches previously saved links, extracts readable text from
//! them and keeps a SQLite full-text index in step with the stored content.

pub mod config;
pub mod import;
pub mod output;
pub mod refresh;
pub mod state;
pub mod storage;
pub mod strategy;

use thiserror::Error;

/// Errors that abort a refresh run
///
/// Per-bookmark failures never end up here; they are reported as
/// [`ItemOutcome`]s.
#[derive(Debug, Error)]
pub enum ReshelfError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No usable configuration directory on this platform")]
    NoConfigDir,
}

/// Failure of a single fetch attempt
///
/// Both variants are retryable; once the retry budget is spent the item is
/// skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status code {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// True when the peer reset or aborted the connection.
    ///
    /// Hosts that actively block automated clients tend to drop the
    /// connection instead of answering with an error status.
    pub fn is_connection_reset(&self) -> bool {
        let Self::Network { source, .. } = self else {
            return false;
        };

        let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(source);
        while let Some(err) = cause {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                if matches!(
                    io.kind(),
                    std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted
                ) {
                    return true;
                }
            }
            cause = err.source();
        }
        false
    }
}

/// Failure to turn a fetched body into text
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not render HTML as text: {0}")]
    Html(#[from] html2text::Error),
}

/// Result type alias for Reshelf operations
pub type Result<T> = std::result::Result<T, ReshelfError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use refresh::{run_refresh, RefreshOptions, RefreshReport};
pub use state::{ItemOutcome, UnchangedReason};
pub use storage::{BookmarkStore, Entry, FetchCandidate, SearchResult};
pub use strategy::StrategyRegistry;
