//! Netscape bookmark file import
//!
//! Browsers export bookmarks as `NETSCAPE-Bookmark-file-1` HTML: nested
//! `<DL>` lists of `<A HREF ADD_DATE ICON>` anchors. Only anchors pointing
//! at http(s) URLs are imported; folders, separators and `place:` or
//! `javascript:` links are ignored.

use crate::storage::Entry;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use scraper::{Html, Node, Selector};
use std::path::Path;
use thiserror::Error;

const DOCTYPE: &str = "netscape-bookmark-file-1";

const PNG_DATA_URI: &str = "data:image/png;base64,";

/// Errors that can occur while reading a bookmark export
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read bookmark file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bookmark file is not a valid Netscape bookmark HTML file")]
    NotNetscapeFile,
}

/// Reads and parses a bookmark export from disk
pub fn read_bookmark_file(path: &Path) -> Result<Vec<Entry>, ImportError> {
    let html = std::fs::read_to_string(path)?;
    parse_bookmarks(&html)
}

/// Parses a Netscape bookmark document into entries, in document order
///
/// # Returns
///
/// * `Ok(Vec<Entry>)` - Every http(s) anchor of the document
/// * `Err(ImportError::NotNetscapeFile)` - The doctype is missing or different
pub fn parse_bookmarks(html: &str) -> Result<Vec<Entry>, ImportError> {
    let document = Html::parse_document(html);

    if !has_netscape_doctype(&document) {
        return Err(ImportError::NotNetscapeFile);
    }

    let Ok(anchors) = Selector::parse("a[href]") else {
        return Ok(Vec::new());
    };

    let entries = document
        .select(&anchors)
        .filter_map(|anchor| {
            let element = anchor.value();
            let href = element.attr("href")?.trim();
            if !href.starts_with("http") {
                return None;
            }

            Some(Entry {
                title: anchor.text().collect::<String>().trim().to_string(),
                href: href.to_string(),
                date: element
                    .attr("add_date")
                    .and_then(|date| date.trim().parse().ok())
                    .unwrap_or(0),
                icon: element.attr("icon").and_then(decode_icon),
            })
        })
        .collect();

    Ok(entries)
}

fn has_netscape_doctype(document: &Html) -> bool {
    document.tree.root().children().any(|node| match node.value() {
        Node::Doctype(doctype) => doctype.name().eq_ignore_ascii_case(DOCTYPE),
        _ => false,
    })
}

/// Decodes a base64 PNG data URI; anything else is dropped
fn decode_icon(uri: &str) -> Option<Vec<u8>> {
    let encoded = uri.strip_prefix(PNG_DATA_URI)?;
    STANDARD.decode(encoded.trim()).ok()
}
