//! Run summaries for import and refresh
//!
//! Formatting is separate from printing so the layout can be tested.

use crate::refresh::RefreshReport;
use crate::storage::ImportReport;

/// Formats a refresh report as an indented summary
pub fn format_refresh_report(report: &RefreshReport) -> String {
    let mut out = String::from("=== Refresh Summary ===\n\n");

    out.push_str(&format!("  Candidates: {}\n", report.candidates));
    if report.skipped > 0 {
        out.push_str(&format!("  Skipped (up to date extractor): {}\n", report.skipped));
    }
    out.push_str(&format!("  Updated: {}\n", report.updated));
    out.push_str(&format!("  Unchanged: {}\n", report.unchanged));

    if report.failed() > 0 {
        out.push_str("\nFailures:\n");
        for (label, count) in [
            ("Could not fetch", report.exhausted),
            ("Could not extract text", report.extract_failed),
            ("Could not store", report.persist_failed),
            ("Worker panicked", report.panicked),
        ] {
            if count > 0 {
                out.push_str(&format!("  {}: {}\n", label, count));
            }
        }
    }

    let processed = report.processed();
    let success_rate = if processed > 0 {
        ((processed - report.failed()) as f64 / processed as f64) * 100.0
    } else {
        0.0
    };

    out.push_str(&format!(
        "\nSuccess Rate: {:.1}% ({} / {} bookmarks fetched)\n",
        success_rate,
        processed - report.failed(),
        processed
    ));
    out.push_str(&format!(
        "Peak concurrent fetches: {}\nElapsed: {:.2}s\n",
        report.peak_in_flight,
        report.elapsed.as_secs_f64()
    ));
    out
}

/// Prints a refresh report to stdout
pub fn print_refresh_report(report: &RefreshReport) {
    print!("{}", format_refresh_report(report));
}

pub fn format_import_report(report: &ImportReport) -> String {
    format!(
        "Imported {} bookmarks ({} already known)\n",
        report.inserted, report.duplicates
    )
}

pub fn print_import_report(report: &ImportReport) {
    print!("{}", format_import_report(report));
}
