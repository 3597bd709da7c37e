// src/engine/types.rs
// =============================================================================
// Data that flows through the engine.
//
// - Job: one URL to check, produced by the loader, never mutated
// - StageOutcome: what happened in one of the DNS / TCP / HTTP stages
// - ProbeReport: the three stage outcomes of a single attempt
// - CheckResult: the final, immutable record for one job
//
// A stage that was skipped because an earlier one failed is recorded as
// NotAttempted rather than left out, so every record has all three stages.
// =============================================================================

use crate::error::ProbeError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// One URL to check, as handed over by the loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    /// Group label the URL was listed under
    pub group: String,
    /// The line the URL came from, before normalization
    pub original_text: String,
    /// Absolute, scheme-prefixed URL
    pub url: String,
}

impl Job {
    pub fn new(group: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            group: group.into(),
            original_text: url.clone(),
            url,
        }
    }
}

/// The three ordered sub-checks of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Dns,
    Tcp,
    Http,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Dns => write!(f, "DNS"),
            Stage::Tcp => write!(f, "TCP"),
            Stage::Http => write!(f, "HTTP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Passed,
    Failed,
    NotAttempted,
}

/// Outcome of one stage
///
/// `value` is the stage payload: resolved IP for DNS, connected address for
/// TCP, status code for HTTP. An HTTP stage can fail and still carry a value
/// (status >= 400).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome<T> {
    pub state: StageState,
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
}

impl<T> StageOutcome<T> {
    pub fn passed(value: T, latency: Duration) -> Self {
        Self {
            state: StageState::Passed,
            latency: Some(latency),
            error: None,
            value: Some(value),
        }
    }

    pub fn failed(error: ProbeError, latency: Duration) -> Self {
        Self {
            state: StageState::Failed,
            latency: Some(latency),
            error: Some(error),
            value: None,
        }
    }

    /// Failure that still produced a payload, e.g. an HTTP 503
    pub fn failed_with(value: T, error: ProbeError, latency: Duration) -> Self {
        Self {
            value: Some(value),
            ..Self::failed(error, latency)
        }
    }

    pub fn not_attempted() -> Self {
        Self {
            state: StageState::NotAttempted,
            latency: None,
            error: None,
            value: None,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.state == StageState::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.state == StageState::Failed
    }
}

pub type DnsOutcome = StageOutcome<IpAddr>;
pub type TcpOutcome = StageOutcome<SocketAddr>;
pub type HttpOutcome = StageOutcome<u16>;

/// Everything one probe attempt observed
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub dns: DnsOutcome,
    pub tcp: TcpOutcome,
    pub http: HttpOutcome,
    /// A bot challenge was detected in the HTTP response
    pub captcha: bool,
}

impl ProbeReport {
    /// Report for a URL rejected before any network activity
    pub fn rejected(error: ProbeError) -> Self {
        Self {
            dns: StageOutcome::failed(error, Duration::ZERO),
            tcp: StageOutcome::not_attempted(),
            http: StageOutcome::not_attempted(),
            captcha: false,
        }
    }

    /// DNS resolved, TCP connected, HTTP < 400 and no challenge
    pub fn is_healthy(&self) -> bool {
        self.dns.is_passed() && self.tcp.is_passed() && self.http.is_passed() && !self.captcha
    }

    /// First failed stage and its error, in stage order
    pub fn first_failure(&self) -> Option<(Stage, &ProbeError)> {
        first_error(&self.dns, &self.tcp, &self.http)
    }
}

/// How a job left the retry state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Last attempt was healthy
    Succeeded,
    /// Transient failure on every allowed attempt
    Exhausted,
    /// Failure that retrying cannot fix (bad URL, 404, TLS, challenge, ...)
    Rejected,
    /// Run was cancelled before the retries ran out
    Interrupted,
}

/// Final record for one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    /// Position of the job in the submitted list
    pub index: usize,
    #[serde(flatten)]
    pub job: Job,
    pub dns: DnsOutcome,
    pub tcp: TcpOutcome,
    pub http: HttpOutcome,
    pub captcha: bool,
    pub success: bool,
    pub attempts_used: u32,
    pub disposition: Disposition,
}

impl CheckResult {
    pub fn from_report(
        index: usize,
        job: Job,
        report: ProbeReport,
        attempts_used: u32,
        disposition: Disposition,
    ) -> Self {
        let success = report.is_healthy();
        Self {
            index,
            job,
            dns: report.dns,
            tcp: report.tcp,
            http: report.http,
            captcha: report.captcha,
            success,
            attempts_used,
            disposition,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.http.value
    }

    /// Which stage failed and with what, for diagnostics
    pub fn failure(&self) -> Option<(Stage, &ProbeError)> {
        first_error(&self.dns, &self.tcp, &self.http)
    }
}

fn first_error<'a>(
    dns: &'a DnsOutcome,
    tcp: &'a TcpOutcome,
    http: &'a HttpOutcome,
) -> Option<(Stage, &'a ProbeError)> {
    if let Some(e) = &dns.error {
        return Some((Stage::Dns, e));
    }
    if let Some(e) = &tcp.error {
        return Some((Stage::Tcp, e));
    }
    http.error.as_ref().map(|e| (Stage::Http, e))
}

fn serialize_millis<S: Serializer>(latency: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match latency {
        Some(d) => s.serialize_some(&(d.as_secs_f64() * 1000.0)),
        None => s.serialize_none(),
    }
}
