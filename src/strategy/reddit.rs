//! Reddit threads
//!
//! Thread pages are rendered client-side and anonymous requests are often
//! answered with a login wall. The JSON listing behind every thread carries
//! the post and all comments, so it is requested instead.

use crate::strategy::SiteStrategy;
use serde_json::Value;
use url::Url;

pub const PATTERN: &str = r"^https://(?:.*\.)?reddit\.com/r/.*/comments/";

pub const VERSION: i64 = 2;

/// Session cookie sent to avoid the anonymous-access interstitial
pub const SESSION_COOKIE: &str = "reddit_session=reshelf";

/// Bodies reddit leaves behind for moderated or deleted text
const PLACEHOLDERS: [&str; 2] = ["[deleted]", "[removed]"];

/// Fields holding user-written text in a listing
const TEXT_FIELDS: [&str; 2] = ["selftext", "body"];

pub fn strategy() -> Result<SiteStrategy, regex::Error> {
    Ok(SiteStrategy::new("reddit", PATTERN)?
        .with_version(VERSION)
        .with_rewrite(rewrite)
        .with_header("Cookie", SESSION_COOKIE)
        .with_extractor(extract))
}

/// Points a thread URL at its `.json` listing
pub fn rewrite(href: &str) -> String {
    match Url::parse(href) {
        Ok(mut url) => {
            let path = format!("{}/.json", url.path().trim_end_matches('/'));
            url.set_path(&path);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => format!("{}/.json", href.trim_end_matches('/')),
    }
}

/// Joins the post text and every comment body of a listing
///
/// Returns `None` when the body is not JSON (an HTML error page, usually).
pub fn extract(body: &str) -> Option<String> {
    let listing: Value = serde_json::from_str(body).ok()?;
    let mut texts = Vec::new();
    collect_texts(&listing, &mut texts);
    Some(texts.join(" "))
}

fn collect_texts<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(fields) => {
            for (key, field) in fields {
                if let (true, Value::String(text)) = (TEXT_FIELDS.contains(&key.as_str()), field) {
                    if !text.trim().is_empty() && !PLACEHOLDERS.contains(&text.as_str()) {
                        out.push(text);
                    }
                    continue;
                }
                collect_texts(field, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_texts(item, out);
            }
        }
        _ => {}
    }
}
