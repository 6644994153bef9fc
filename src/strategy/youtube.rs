//! YouTube videos
//!
//! The watch page is mostly player scaffolding. The video description is
//! embedded in the inline player response as a JSON string, which is the only
//! part worth indexing.

use crate::strategy::SiteStrategy;

pub const PATTERN: &str = r"^https://(?:www\.)?(youtube\.com/watch\?v=|youtu\.be/)";

/// Rows written before this extractor existed already carry version 0
pub const VERSION: i64 = 0;

const DESCRIPTION_KEY: &str = "\"shortDescription\":\"";

pub fn strategy() -> Result<SiteStrategy, regex::Error> {
    Ok(SiteStrategy::new("youtube", PATTERN)?
        .with_version(VERSION)
        .with_extractor(extract))
}

/// Returns the unescaped video description
///
/// `None` when the page carries no description field. An empty description
/// is still a match: the video simply has no text worth indexing.
pub fn extract(body: &str) -> Option<String> {
    let start = body.find(DESCRIPTION_KEY)? + DESCRIPTION_KEY.len();
    let rest = &body[start..];

    let mut escaped = false;
    let mut end = None;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => {
                end = Some(i);
                break;
            }
            _ => {}
        }
    }

    let raw = &rest[..end?];
    let description = serde_json::from_str::<String>(&format!("\"{}\"", raw))
        .unwrap_or_else(|_| raw.to_string());
    Some(description)
}
