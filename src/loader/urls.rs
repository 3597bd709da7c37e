// src/loader/urls.rs
// =============================================================================
// Parsing and normalizing grouped URL lists.
//
// Normalization handles what people actually paste into these files:
// - stray whitespace inside the URL ("https: //example.com")
// - missing scheme ("www.example.com" becomes "https://www.example.com")
//   (an explicit scheme is kept, even one the checker will not probe)
// - garbage ports ("example.com:abc/path" keeps host and path)
// Entries that still have no host afterwards are dropped.
// =============================================================================

use crate::engine::Job;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use url::Url;

const DEFAULT_GROUP: &str = "Ungrouped";
const URL_PREFIX: &str = "full url:";

/// Cleans up one raw URL, or returns None if nothing usable is left
pub fn normalize_url(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    let mut candidate = collapsed.replace(" :", ":").replace(": ", ":");

    if !has_scheme(&candidate) {
        candidate = format!("https://{}", candidate);
    }

    let url = match Url::parse(&candidate) {
        Ok(url) => url,
        Err(url::ParseError::InvalidPort) => {
            candidate = strip_port(&candidate);
            Url::parse(&candidate).ok()?
        }
        Err(_) => return None,
    };

    url.host_str().filter(|h| !h.is_empty())?;
    Some(candidate)
}

// Other schemes are kept so that the checker can report them as unsupported
fn has_scheme(candidate: &str) -> bool {
    candidate.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

// "https://host:bad/path" -> "https://host/path"
fn strip_port(candidate: &str) -> String {
    let Some((scheme, rest)) = candidate.split_once("://") else {
        return candidate.to_string();
    };
    let (authority, path) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let host = match authority.find(']') {
        // bracketed IPv6 literal: the port can only follow the ']'
        Some(end) if authority.starts_with('[') => &authority[..=end],
        _ => authority.split(':').next().unwrap_or(authority),
    };
    format!("{}://{}{}", scheme, host, path)
}

/// Extracts jobs from the text of a URL list, in file order
pub fn parse_jobs(text: &str) -> Vec<Job> {
    let mut jobs = Vec::new();
    let mut group = DEFAULT_GROUP.to_string();

    for line in text.lines() {
        let stripped = line.trim();
        let is_url_line = stripped.to_lowercase().starts_with(URL_PREFIX);

        if stripped.contains(':') && !is_url_line {
            group = stripped.to_string();
            continue;
        }
        if !is_url_line {
            continue;
        }

        let Some((_, raw)) = stripped.split_once(':') else {
            continue;
        };
        match normalize_url(raw) {
            Some(url) => jobs.push(Job {
                group: group.clone(),
                original_text: stripped.to_string(),
                url,
            }),
            None => debug!(line = stripped, "skipping entry without a usable URL"),
        }
    }

    jobs
}

/// Reads a URL list from disk
pub fn load_jobs(path: &Path) -> Result<Vec<Job>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading URL list {}", path.display()))?;
    Ok(parse_jobs(&text))
}
