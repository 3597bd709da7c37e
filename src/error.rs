// src/error.rs
// =============================================================================
// Typed errors produced while probing a URL.
//
// Every stage failure ends up as one of these values inside a StageOutcome.
// They never escape the retry controller: the scheduler, the summary and the
// report writers only ever see completed records.
//
// Two enums live here:
// - DnsError: what the endpoint cache stores (it must be Clone, because the
//   same cached failure is handed to every worker asking for that host)
// - ProbeError: any stage failure, plus whether retrying could help
//
// Rust concepts:
// - thiserror: derives Display / std::error::Error from attributes
// - #[from]: lets `?` convert a DnsError into a ProbeError automatically
// =============================================================================

use serde::Serialize;
use thiserror::Error;

/// Why a hostname could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DnsError {
    /// The name does not exist (NXDOMAIN) or has no address records
    #[error("NXDOMAIN: {0} does not resolve")]
    NxDomain(String),

    /// The resolver did not answer within the DNS timeout
    #[error("DNS lookup timed out after {0} ms")]
    Timeout(u64),

    /// Anything else the resolver reported (SERVFAIL, no nameservers, ...)
    #[error("DNS error: {0}")]
    Other(String),
}

/// A failure recorded against one stage of one probe attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// URL could not be parsed or has no host; checking it again is pointless
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Only http and https are probed
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error("TCP connect timed out after {0} ms")]
    ConnectTimeout(u64),

    #[error("connection refused")]
    ConnectRefused,

    #[error("connection reset")]
    ConnectReset,

    #[error("TCP connect failed: {0}")]
    Connect(String),

    #[error("HTTP request timed out after {0} ms")]
    HttpTimeout(u64),

    /// Certificate verification or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    #[error("too many redirects")]
    TooManyRedirects,

    /// Server answered with status >= 400
    #[error("HTTP {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl ProbeError {
    /// Whether another attempt could plausibly produce a different outcome.
    ///
    /// Timeouts, resets, refused connections, DNS failures, 408, 429 and 5xx
    /// are transient. Malformed input, TLS rejections, redirect loops and
    /// other 4xx answers are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProbeError::Dns(_)
            | ProbeError::ConnectTimeout(_)
            | ProbeError::ConnectRefused
            | ProbeError::ConnectReset
            | ProbeError::Connect(_)
            | ProbeError::HttpTimeout(_)
            | ProbeError::Http(_) => true,
            ProbeError::Status(code) => *code == 408 || *code == 429 || *code >= 500,
            ProbeError::InvalidUrl(_)
            | ProbeError::UnsupportedScheme(_)
            | ProbeError::Tls(_)
            | ProbeError::TooManyRedirects => false,
        }
    }
}

// Reports show the human-readable message, not the enum structure
impl Serialize for ProbeError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
