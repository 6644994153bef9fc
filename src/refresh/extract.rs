//! Turns fetched bodies into indexable text

use crate::refresh::fetcher::PageBody;
use crate::strategy::StrategyRegistry;
use crate::ExtractError;
use encoding_rs::{Encoding, UTF_8};
use html2text::render::TrivialDecorator;
use regex::bytes::Regex;
use std::sync::OnceLock;

/// Line width handed to the renderer; wide enough that it never wraps words
const TEXT_WIDTH: usize = 10_000;

/// How far into a document a `<meta charset>` declaration is looked for
const META_SNIFF_LIMIT: usize = 1024;

/// Collapses every run of whitespace into one space and trims the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_charset_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-z0-9_:.\-]+)"#).ok())
        .as_ref()
}

/// Charset named by a `<meta>` tag near the top of the document
fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_SNIFF_LIMIT)];
    let label = meta_charset_pattern()?.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Decodes a body to text
///
/// The Content-Type charset wins, then a `<meta>` declaration, then UTF-8.
/// A byte order mark overrides all of them. Malformed sequences are
/// replaced rather than rejected, so every page yields some text.
pub fn decode_body(body: &PageBody) -> String {
    let encoding = body
        .charset
        .as_deref()
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| sniff_meta_charset(&body.bytes))
        .unwrap_or(UTF_8);

    let (text, used, malformed) = encoding.decode(&body.bytes);
    if malformed {
        tracing::debug!(encoding = used.name(), "Replaced malformed byte sequences");
    }
    text.into_owned()
}

/// Readable text of an HTML document
///
/// Scripts, styles and the document head are dropped, links and emphasis
/// lose their markup and tables are flattened to their cell text. The
/// result is not normalized.
pub fn html_to_text(html: &str) -> Result<String, html2text::Error> {
    html2text::config::with_decorator(TrivialDecorator::new())
        .raw_mode(true)
        .string_from_read(html.as_bytes(), TEXT_WIDTH)
}

/// Extracts normalized text from a fetched body
///
/// The site strategy for `href` gets the first chance; generic HTML-to-text
/// handles everything else.
pub fn extract_text(
    body: &PageBody,
    href: &str,
    registry: &StrategyRegistry,
) -> Result<String, ExtractError> {
    let decoded = decode_body(body);
    let text = match registry.extract(&decoded, href) {
        Some(text) => text,
        None => html_to_text(&decoded)?,
    };
    Ok(normalize_whitespace(&text))
}
