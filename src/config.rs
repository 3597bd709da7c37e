// src/config.rs
// =============================================================================
// The flat options record the engine runs with.
//
// Values come from three layers, later ones winning:
// 1. EngineConfig::default() - the documented defaults
// 2. an optional JSON config file (every field optional)
// 3. command-line flags
//
// Durations in the file and on the command line are given in seconds (f64)
// and converted once here, so the engine only ever deals with Duration.
// =============================================================================

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Whether a "warn" result (challenge detected, otherwise healthy) counts as
/// available when computing the availability figure of a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningPolicy {
    /// Warnings are reported separately and do not count as available
    #[default]
    Degraded,
    /// Warnings count toward availability
    Available,
}

/// Everything that influences the behavior of the health-check engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of jobs probed at the same time
    pub concurrency: usize,
    /// Additional attempts after the first one for transient failures
    pub retries: u32,
    pub dns_timeout: Duration,
    pub tcp_timeout: Duration,
    /// End-to-end timeout of the HTTP request, body included
    pub http_timeout: Duration,
    /// Minimum gap between two consecutive attempt starts
    pub rate_limit: Duration,
    /// Upper bound of the random delay added to pacing and backoff
    pub jitter_max: Duration,
    /// First retry waits backoff_base, then 2x, 4x, ...
    pub backoff_base: Duration,
    pub cache_ttl: Duration,
    pub verify_tls: bool,
    pub max_redirects: usize,
    /// How much of a response body is kept for challenge detection
    pub max_body_bytes: usize,
    pub warning_policy: WarningPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 30,
            retries: 3,
            dns_timeout: Duration::from_secs(3),
            tcp_timeout: Duration::from_secs(3),
            http_timeout: Duration::from_secs(10),
            rate_limit: Duration::from_millis(100),
            jitter_max: Duration::from_millis(300),
            backoff_base: Duration::from_millis(500),
            cache_ttl: Duration::from_secs(300),
            verify_tls: true,
            max_redirects: 5,
            max_body_bytes: 64 * 1024,
            warning_policy: WarningPolicy::Degraded,
        }
    }
}

impl EngineConfig {
    /// Rejects values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.dns_timeout.is_zero() || self.tcp_timeout.is_zero() || self.http_timeout.is_zero()
        {
            bail!("stage timeouts must be greater than zero");
        }
        Ok(())
    }
}

/// Converts a user-supplied number of seconds into a Duration
///
/// Negative, NaN and infinite values are rejected instead of panicking.
pub fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{} must be a non-negative number of seconds, got {}", name, value))
}

/// Shape of the JSON config file
///
/// Example:
/// ```json
/// { "concurrency": 10, "retries": 2, "rate_limit": 0.25, "verify_tls": false }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub dns_timeout: Option<f64>,
    #[serde(default)]
    pub tcp_timeout: Option<f64>,
    #[serde(default)]
    pub http_timeout: Option<f64>,
    #[serde(default)]
    pub rate_limit: Option<f64>,
    #[serde(default)]
    pub jitter: Option<f64>,
    #[serde(default)]
    pub backoff_base: Option<f64>,
    #[serde(default)]
    pub cache_ttl: Option<f64>,
    #[serde(default)]
    pub verify_tls: Option<bool>,
    #[serde(default)]
    pub max_redirects: Option<usize>,
    #[serde(default)]
    pub warning_policy: Option<WarningPolicy>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Overlays every field present in the file onto `config`
    pub fn apply(&self, config: &mut EngineConfig) -> Result<()> {
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = self.retries {
            config.retries = v;
        }
        if let Some(v) = self.dns_timeout {
            config.dns_timeout = seconds("dns_timeout", v)?;
        }
        if let Some(v) = self.tcp_timeout {
            config.tcp_timeout = seconds("tcp_timeout", v)?;
        }
        if let Some(v) = self.http_timeout {
            config.http_timeout = seconds("http_timeout", v)?;
        }
        if let Some(v) = self.rate_limit {
            config.rate_limit = seconds("rate_limit", v)?;
        }
        if let Some(v) = self.jitter {
            config.jitter_max = seconds("jitter", v)?;
        }
        if let Some(v) = self.backoff_base {
            config.backoff_base = seconds("backoff_base", v)?;
        }
        if let Some(v) = self.cache_ttl {
            config.cache_ttl = seconds("cache_ttl", v)?;
        }
        if let Some(v) = self.verify_tls {
            config.verify_tls = v;
        }
        if let Some(v) = self.max_redirects {
            config.max_redirects = v;
        }
        if let Some(v) = self.warning_policy {
            config.warning_policy = v;
        }
        Ok(())
    }
}
