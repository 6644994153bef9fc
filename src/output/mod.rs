//! Output module for terminal reports
//!
//! This module handles:
//! - Printing full-text search results with highlighted matches
//! - Summaries of import and refresh runs

pub mod stats;

pub use stats::{format_import_report, format_refresh_report, print_import_report, print_refresh_report};

use crate::storage::SearchResult;

/// Marks the start of a match inside a snippet (yellow)
pub const HIGHLIGHT_OPEN: &str = "\x1b[33m";

/// Marks the end of a match inside a snippet
pub const HIGHLIGHT_CLOSE: &str = "\x1b[0m";

/// Formats one search hit: id and title, href, quoted snippet
pub fn format_search_result(result: &SearchResult) -> String {
    format!(
        "{}. {}\n{}\n\"{}\"\n",
        result.id, result.title, result.href, result.snippet
    )
}

/// Formats a result list with its count header
pub fn format_search_results(results: &[SearchResult]) -> String {
    let mut out = format!(
        "Found {}{}{} search results!\n\n",
        HIGHLIGHT_OPEN,
        results.len(),
        HIGHLIGHT_CLOSE
    );
    for result in results {
        out.push_str(&format_search_result(result));
        out.push('\n');
    }
    out
}

/// Prints search results to stdout
pub fn print_search_results(results: &[SearchResult]) {
    print!("{}", format_search_results(results));
}
