//! HTTP fetcher implementation
//!
//! This module handles the HTTP side of a refresh:
//! - Building the shared client (user agent, timeout, TLS policy, compression)
//! - One conditional GET per attempt, with site strategy rewrite and headers
//! - Classifying the response into a page, a 304, or a retryable error

use crate::refresh::RefreshOptions;
use crate::storage::FetchCandidate;
use crate::strategy::StrategyRegistry;
use crate::FetchError;
use chrono::{DateTime, SubsecRound, Utc};
use reqwest::header::{CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::time::Duration;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Raw response body
///
/// The bytes are hashed as received; decoding to text happens only when the
/// page changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBody {
    pub bytes: Vec<u8>,
    /// Charset declared by the Content-Type header
    pub charset: Option<String>,
}

impl PageBody {
    pub fn new(bytes: impl Into<Vec<u8>>, charset: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            charset: charset.map(str::to_string),
        }
    }
}

/// Result of a successful fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedPage {
    /// The server confirmed the cached copy (HTTP 304)
    NotModified,

    /// A full response body
    Body {
        body: PageBody,
        /// Last-Modified header, or the fetch time when absent or unparseable
        last_modified: DateTime<Utc>,
    },
}

/// Builds the HTTP client shared by all workers of a run
///
/// # Arguments
///
/// * `options` - Run options (user agent, timeout, certificate policy)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(options: &RefreshOptions) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(options.user_agent.as_str())
        .timeout(options.timeout)
        .connect_timeout(options.timeout.min(Duration::from_secs(10)))
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs one fetch attempt for a candidate
///
/// # Request Flow
///
/// 1. The site strategy may rewrite the URL
/// 2. `If-Modified-Since` is sent when a Last-Modified is cached
/// 3. Site strategy headers are added
/// 4. Response handling:
///
/// | Response | Result |
/// |----------|--------|
/// | 304 | `Ok(NotModified)` |
/// | 2xx | `Ok(Body)` |
/// | Any other status | `Err(FetchError::Status)` |
/// | Transport failure | `Err(FetchError::Network)` |
pub async fn fetch_page(
    client: &Client,
    registry: &StrategyRegistry,
    candidate: &FetchCandidate,
) -> Result<FetchedPage, FetchError> {
    let url = registry.rewrite_url(&candidate.href);

    let mut request = client.get(&url);
    if let Some(since) = candidate.last_modified {
        request = request.header(IF_MODIFIED_SINCE, format_http_date(since));
    }
    request = registry.inject_headers(request, &candidate.href);

    let response = request.send().await.map_err(|source| FetchError::Network {
        url: url.clone(),
        source,
    })?;

    let status = response.status();
    if status == StatusCode::NOT_MODIFIED {
        return Ok(FetchedPage::NotModified);
    }

    if !status.is_success() {
        return Err(FetchError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let last_modified = response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
        .unwrap_or_else(|| Utc::now().trunc_subsecs(0));

    let charset = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_param);

    let bytes = response
        .bytes()
        .await
        .map_err(|source| FetchError::Network { url, source })?;

    Ok(FetchedPage::Body {
        body: PageBody {
            bytes: bytes.to_vec(),
            charset,
        },
        last_modified,
    })
}

/// The `charset` parameter of a Content-Type value
fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        let value = value.trim().trim_matches('"');
        (name.trim().eq_ignore_ascii_case("charset") && !value.is_empty())
            .then(|| value.to_string())
    })
}

/// Formats a timestamp as an HTTP date (RFC 1123, always GMT)
pub fn format_http_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format(HTTP_DATE_FORMAT).to_string()
}

/// Parses an HTTP date header value
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
