// src/report/files.rs
// =============================================================================
// Report files: JSON, CSV and a standalone HTML page.
//
// All three list results in input order (by job index), whatever order
// they completed in.
// =============================================================================

use super::{format_latency, sorted, verdict_icon};
use crate::engine::{classify, CheckResult, Summary, Verdict};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a Summary,
    results: Vec<&'a CheckResult>,
}

/// Pretty-printed `{summary, results}` document
pub fn json_document(results: &[CheckResult], summary: &Summary) -> Result<String> {
    let report = JsonReport {
        summary,
        results: sorted(results),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn write_json(path: &Path, results: &[CheckResult], summary: &Summary) -> Result<()> {
    let document = json_document(results, summary)?;
    std::fs::write(path, document).with_context(|| format!("writing {}", path.display()))
}

/// Flat row per result
#[derive(Serialize)]
struct CsvRow<'a> {
    index: usize,
    group: &'a str,
    original: &'a str,
    url: &'a str,
    verdict: Verdict,
    dns_ip: String,
    dns_ms: Option<f64>,
    dns_error: String,
    tcp_ok: bool,
    tcp_ms: Option<f64>,
    tcp_error: String,
    http_status: Option<u16>,
    http_ms: Option<f64>,
    http_error: String,
    captcha: bool,
    success: bool,
    attempts: u32,
}

fn millis(d: Option<std::time::Duration>) -> Option<f64> {
    d.map(|d| (d.as_secs_f64() * 1000.0 * 10.0).round() / 10.0)
}

fn error_text(error: &Option<crate::error::ProbeError>) -> String {
    error.as_ref().map(|e| e.to_string()).unwrap_or_default()
}

pub fn write_csv(path: &Path, results: &[CheckResult]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    for result in sorted(results) {
        writer.serialize(CsvRow {
            index: result.index,
            group: &result.job.group,
            original: &result.job.original_text,
            url: &result.job.url,
            verdict: classify(result),
            dns_ip: result.dns.value.map(|ip| ip.to_string()).unwrap_or_default(),
            dns_ms: millis(result.dns.latency),
            dns_error: error_text(&result.dns.error),
            tcp_ok: result.tcp.is_passed(),
            tcp_ms: millis(result.tcp.latency),
            tcp_error: error_text(&result.tcp.error),
            http_status: result.http.value,
            http_ms: millis(result.http.latency),
            http_error: error_text(&result.http.error),
            captcha: result.captcha,
            success: result.success,
            attempts: result.attempts_used,
        })?;
    }

    writer.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>WebCheck Report</title>
<style>
  body { font-family: Arial, sans-serif; margin: 20px; }
  .ok { color: green; } .warn { color: orange; } .fail { color: red; }
  table { border-collapse: collapse; width: 100%; margin-top: 12px; }
  td, th { border: 1px solid #aaa; padding: 6px; text-align: left; }
  th { background: #eee; }
</style>
</head>
<body>
<h1>WebCheck Report</h1>
"#;

pub fn render_html(results: &[CheckResult], summary: &Summary) -> String {
    let mut html = String::from(HTML_HEAD);

    // writing into a String cannot fail
    let _ = writeln!(html, "<h2>Summary</h2>\n<table>");
    let _ = writeln!(html, "<tr><th>Group</th><th>OK</th><th>Warnings</th><th>Failures</th></tr>");
    for (group, counts) in &summary.groups {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td class=\"ok\">{}</td><td class=\"warn\">{}</td><td class=\"fail\">{}</td></tr>",
            escape(group),
            counts.ok,
            counts.warn,
            counts.fail
        );
    }
    let _ = writeln!(
        html,
        "</table>\n<p>Availability: {:.1}%</p>\n<h2>Detailed Results</h2>\n<table>",
        summary.availability_percent()
    );
    let _ = writeln!(
        html,
        "<tr><th></th><th>Group</th><th>URL</th><th>DNS</th><th>TCP</th><th>HTTP</th><th>Challenge</th><th>Attempts</th></tr>"
    );

    for result in sorted(results) {
        let verdict = classify(result);
        let class = match verdict {
            Verdict::Ok => "ok",
            Verdict::Warn => "warn",
            Verdict::Fail => "fail",
        };
        let dns = match (&result.dns.value, &result.dns.error) {
            (Some(ip), _) => format!("{} ({})", ip, format_latency(result.dns.latency)),
            (None, Some(e)) => e.to_string(),
            _ => "-".to_string(),
        };
        let tcp = match (&result.tcp.value, &result.tcp.error) {
            (Some(_), _) => format!("open ({})", format_latency(result.tcp.latency)),
            (None, Some(e)) => e.to_string(),
            _ => "-".to_string(),
        };
        let http = match (&result.http.value, &result.http.error) {
            (Some(code), _) => format!("{} ({})", code, format_latency(result.http.latency)),
            (None, Some(e)) => e.to_string(),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            html,
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td title=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            class,
            verdict_icon(verdict, result.captcha),
            escape(&result.job.group),
            escape(&result.job.original_text),
            escape(&result.job.url),
            escape(&dns),
            escape(&tcp),
            escape(&http),
            if result.captcha { "yes" } else { "no" },
            result.attempts_used
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

pub fn write_html(path: &Path, results: &[CheckResult], summary: &Summary) -> Result<()> {
    std::fs::write(path, render_html(results, summary))
        .with_context(|| format!("writing {}", path.display()))
}
