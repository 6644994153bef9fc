//! Refresh pipeline for stored bookmarks
//!
//! This module contains the core refresh logic, including:
//! - Conditional HTTP fetching with retry and backoff
//! - Change detection (304, Last-Modified, content hash)
//! - Text extraction, site strategies first
//! - Two-tier concurrency scheduling with early release
//! - A single writer owning the batch transaction

mod coordinator;
mod detector;
mod extract;
mod fetcher;
mod scheduler;
mod worker;

pub use coordinator::{run_refresh, RefreshReport};
pub use detector::{content_hash, detect, CachedSignals, Detection};
pub use extract::{decode_body, extract_text, html_to_text, normalize_whitespace};
pub use fetcher::{
    build_http_client, fetch_page, format_http_date, parse_http_date, FetchedPage, PageBody,
};
pub use scheduler::{InFlightGauge, InFlightGuard, Scheduler, Slot};
pub use worker::{process_candidate, FetchContext, WriteRequest};

use crate::config::FetchConfig;
use crate::state::RetryPolicy;
use std::time::Duration;

/// Knobs of a single refresh run
///
/// Built from the `[fetch]` configuration table; the CLI overrides
/// individual fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Foreground concurrency slots
    pub threads: usize,

    /// Background slots retrying fetches may move into
    pub early_release_slots: usize,

    pub retry: RetryPolicy,

    /// Per-request timeout
    pub timeout: Duration,

    pub user_agent: String,

    pub accept_invalid_certs: bool,

    /// Only bookmarks without content
    pub uncached_only: bool,

    /// Ignore cached signals and rewrite every fetched bookmark
    pub overwrite: bool,

    /// Only bookmarks whose site strategy got a newer version
    pub outdated_only: bool,
}

impl RefreshOptions {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            threads: config.threads as usize,
            early_release_slots: config.early_release_slots as usize,
            retry: RetryPolicy::new(config.retries, Duration::from_millis(config.retry_delay)),
            timeout: Duration::from_secs(config.timeout),
            user_agent: config.user_agent.clone(),
            accept_invalid_certs: config.accept_invalid_certs,
            uncached_only: false,
            overwrite: false,
            outdated_only: false,
        }
    }

    /// Background slots actually available to this run
    ///
    /// Early release is off for uncached-only runs.
    pub fn effective_early_release_slots(&self) -> usize {
        if self.uncached_only {
            0
        } else {
            self.early_release_slots
        }
    }

    /// Whether cached hash and Last-Modified are discarded before fetching
    pub fn resets_cache(&self) -> bool {
        self.overwrite || self.outdated_only
    }
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}
