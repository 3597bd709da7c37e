// src/report/console.rs
// =============================================================================
// Terminal output: one progress line per finished URL, then a table of all
// results in input order, then the per-group summary.
// =============================================================================

use super::{format_latency, sorted, verdict_icon};
use crate::engine::{classify, CheckResult, StageOutcome, StageState, Summary, Verdict};
use std::fmt::Display;

// "value (latency)", "error", or "-" for stages that never ran
fn stage_cell<T: Display>(outcome: &StageOutcome<T>) -> String {
    match outcome.state {
        StageState::NotAttempted => "-".to_string(),
        StageState::Passed => match &outcome.value {
            Some(v) => format!("{} ({})", v, format_latency(outcome.latency)),
            None => format_latency(outcome.latency),
        },
        StageState::Failed => match (&outcome.value, &outcome.error) {
            (Some(v), _) => format!("{} ({})", v, format_latency(outcome.latency)),
            (None, Some(e)) => e.to_string(),
            (None, None) => "failed".to_string(),
        },
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// One line describing a just-finished result
pub fn progress_line(result: &CheckResult, done: usize, total: usize) -> String {
    let verdict = classify(result);
    let mut line = format!(
        "[{}/{}] {} {} {}",
        done,
        total,
        verdict_icon(verdict, result.captcha),
        result.job.group,
        result.job.url
    );
    if let Some((stage, error)) = result.failure() {
        line.push_str(&format!(" - {} {} (attempts: {})", stage, error, result.attempts_used));
    } else if result.captcha {
        line.push_str(" - bot challenge detected");
    }
    line
}

/// Prints every result as a table row, in input order
pub fn print_table(results: &[CheckResult], errors_only: bool) {
    println!(
        "{:<4} {:<50} {:<32} {:<24} {:<16} {:<8}",
        "", "URL", "DNS", "TCP", "HTTP", "ATTEMPTS"
    );
    println!("{}", "=".repeat(138));

    for result in sorted(results) {
        let verdict = classify(result);
        if errors_only && verdict == Verdict::Ok {
            continue;
        }

        println!(
            "{:<4} {:<50} {:<32} {:<24} {:<16} {:<8}",
            verdict_icon(verdict, result.captcha),
            truncate(&result.job.url, 50),
            truncate(&stage_cell(&result.dns), 32),
            truncate(&stage_cell(&result.tcp), 24),
            truncate(&stage_cell(&result.http), 16),
            result.attempts_used
        );
        if let Some((stage, error)) = result.failure() {
            println!("     └─ {} failed: {}", stage, error);
        }
    }
    println!();
}

pub fn print_summary(summary: &Summary) {
    println!("📊 Summary:");
    for (group, counts) in &summary.groups {
        println!(
            "   {}\n      ✅ OK: {}   ⚠️  Warn: {}   ❌ Fail: {}",
            group, counts.ok, counts.warn, counts.fail
        );
    }
    println!();
    println!("   ✅ OK:    {}", summary.total.ok);
    println!("   ⚠️  Warn:  {}", summary.total.warn);
    println!("   ❌ Fail:  {}", summary.total.fail);
    println!("   📋 Total: {}", summary.total.total());
    println!(
        "   📈 Availability: {:.1}% (warnings {})",
        summary.availability_percent(),
        match summary.warning_policy {
            crate::config::WarningPolicy::Degraded => "count as unavailable",
            crate::config::WarningPolicy::Available => "count as available",
        }
    );
}
