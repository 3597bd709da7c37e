// src/report/mod.rs
// =============================================================================
// Read-only presentation of a finished run.
//
// Submodules:
// - console: progress lines, result table and summary for the terminal
// - files:   JSON, CSV and HTML reports written to disk (or stdout for JSON)
//
// Nothing here influences checking; writers only consume CheckResults and
// the Summary.
// =============================================================================

mod console;
mod files;

pub use console::{print_summary, print_table, progress_line};
pub use files::{json_document, write_csv, write_html, write_json};

use crate::engine::{CheckResult, Verdict};
use std::time::Duration;

pub(crate) fn verdict_icon(verdict: Verdict, captcha: bool) -> &'static str {
    match verdict {
        Verdict::Ok => "🟢",
        Verdict::Warn if captcha => "🤖",
        Verdict::Warn => "🟡",
        Verdict::Fail => "🔴",
    }
}

pub(crate) fn format_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(d) => format!("{:.1} ms", d.as_secs_f64() * 1000.0),
        None => "-".to_string(),
    }
}

/// Results in submission order
pub(crate) fn sorted(results: &[CheckResult]) -> Vec<&CheckResult> {
    let mut sorted: Vec<&CheckResult> = results.iter().collect();
    sorted.sort_by_key(|r| r.index);
    sorted
}
