//! Site strategies for hosts that need bespoke handling
//!
//! Some sites refuse anonymous crawlers or serve markup that generic text
//! extraction turns into noise. A [`SiteStrategy`] bundles what a refresh
//! needs to know about such a site: how to rewrite the URL, which headers to
//! add, how to pull text out of the response, and a version number. Bumping
//! the version marks every bookmark processed by an older extractor as
//! outdated, so improved extraction reaches content that never changed
//! upstream.
//!
//! The [`StrategyRegistry`] is built once at startup and only read
//! afterwards; share it with `Arc`.

pub mod reddit;
pub mod youtube;

use regex::Regex;
use reqwest::RequestBuilder;

/// Rewrites the href before it is requested
pub type Rewrite = fn(&str) -> String;

/// Pulls text out of a raw response body; `None` defers to generic extraction
pub type Extractor = fn(&str) -> Option<String>;

/// Handling for one family of URLs
#[derive(Debug, Clone)]
pub struct SiteStrategy {
    name: String,
    pattern: Regex,
    version: i64,
    rewrite: Option<Rewrite>,
    headers: Vec<(&'static str, &'static str)>,
    extractor: Option<Extractor>,
}

impl SiteStrategy {
    /// Creates a strategy applying to hrefs matched by `pattern`
    pub fn new(name: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.to_string(),
            pattern: Regex::new(pattern)?,
            version: 0,
            rewrite: None,
            headers: Vec::new(),
            extractor: None,
        })
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn with_rewrite(mut self, rewrite: Rewrite) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn matches(&self, href: &str) -> bool {
        self.pattern.is_match(href)
    }
}

/// Ordered, immutable collection of site strategies
///
/// Lookups return the first strategy whose pattern matches.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<SiteStrategy>,
}

impl StrategyRegistry {
    pub fn new(strategies: Vec<SiteStrategy>) -> Self {
        Self { strategies }
    }

    /// A registry without strategies; every href gets generic handling
    pub fn empty() -> Self {
        Self::default()
    }

    /// The strategies shipped with Reshelf
    pub fn builtin() -> Result<Self, regex::Error> {
        Ok(Self::new(vec![reddit::strategy()?, youtube::strategy()?]))
    }

    pub fn lookup(&self, href: &str) -> Option<&SiteStrategy> {
        self.strategies.iter().find(|s| s.matches(href))
    }

    /// True when a strategy matches and is newer than the stored content
    pub fn is_outdated(&self, href: &str, stored_version: i64) -> bool {
        self.lookup(href)
            .map(|s| s.version > stored_version)
            .unwrap_or(false)
    }

    /// Version to record alongside freshly extracted content
    pub fn version_for(&self, href: &str) -> i64 {
        self.lookup(href).map(|s| s.version).unwrap_or(0)
    }

    /// Returns the URL to request for `href`
    pub fn rewrite_url(&self, href: &str) -> String {
        match self.lookup(href).and_then(|s| s.rewrite) {
            Some(rewrite) => rewrite(href),
            None => href.to_string(),
        }
    }

    /// Headers a matching strategy wants on the request
    pub fn headers_for(&self, href: &str) -> &[(&'static str, &'static str)] {
        self.lookup(href)
            .map(|s| s.headers.as_slice())
            .unwrap_or(&[])
    }

    /// Adds strategy headers for `href` to a request
    pub fn inject_headers(&self, mut request: RequestBuilder, href: &str) -> RequestBuilder {
        for (name, value) in self.headers_for(href) {
            request = request.header(*name, *value);
        }
        request
    }

    /// Runs the matching strategy's extractor
    ///
    /// # Returns
    ///
    /// * `Some(text)` - A strategy produced the text
    /// * `None` - No strategy applies (or it found nothing); use generic extraction
    pub fn extract(&self, body: &str, href: &str) -> Option<String> {
        let extractor = self.lookup(href)?.extractor?;
        extractor(body)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
