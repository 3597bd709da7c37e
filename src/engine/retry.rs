// src/engine/retry.rs
// =============================================================================
// Retry supervision for a single job.
//
// State machine per job:
//
//   Pending -> Attempting -> Success                      (healthy)
//                         -> Rejected                     (terminal failure)
//                         -> Retryable -> Attempting ...  (transient failure)
//                         -> Exhausted                    (no retries left)
//
// Every attempt takes a fresh rate-limiter slot and a fresh browser identity.
// Between attempts the worker sleeps `backoff_base * 2^n + U(0, jitter)`.
//
// Cancellation is checked while waiting for a slot and while backing off.
// A job cancelled after at least one attempt returns that attempt's outcomes
// marked Interrupted; a job cancelled before its first attempt returns None.
// =============================================================================

use crate::config::EngineConfig;
use crate::engine::identity::IdentityRotator;
use crate::engine::limiter::{jitter, RateLimiter};
use crate::engine::prober::Probe;
use crate::engine::types::{CheckResult, Disposition, Job, ProbeReport};
use crate::error::ProbeError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// What a single attempt means for the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptClass {
    Success,
    Retryable,
    Terminal,
}

fn classify_attempt(report: &ProbeReport) -> AttemptClass {
    if report.is_healthy() {
        return AttemptClass::Success;
    }
    // Hammering a challenge page only makes the block stick
    if report.captcha {
        return AttemptClass::Terminal;
    }
    match report.first_failure() {
        Some((_, error)) if error.is_retryable() => AttemptClass::Retryable,
        _ => AttemptClass::Terminal,
    }
}

/// Parses the job URL; anything failing here is never retried
pub fn validate_url(raw: &str) -> Result<Url, ProbeError> {
    let url = Url::parse(raw).map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ProbeError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ProbeError::InvalidUrl(format!("{}: missing host", raw)));
    }
    Ok(url)
}

pub struct RetryController {
    prober: Arc<dyn Probe>,
    limiter: Arc<RateLimiter>,
    rotator: IdentityRotator,
    retries: u32,
    backoff_base: Duration,
    jitter_max: Duration,
    cancel: CancellationToken,
}

impl RetryController {
    pub fn new(
        prober: Arc<dyn Probe>,
        limiter: Arc<RateLimiter>,
        config: &EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            prober,
            limiter,
            rotator: IdentityRotator,
            retries: config.retries,
            backoff_base: config.backoff_base,
            jitter_max: config.jitter_max,
            cancel,
        }
    }

    /// Delay before retry number `retry` (0-based)
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.backoff_base.saturating_mul(factor) + jitter(self.jitter_max)
    }

    /// Drives one job to a terminal state
    pub async fn run_with_retry(&self, index: usize, job: Job) -> Option<CheckResult> {
        let url = match validate_url(&job.url) {
            Ok(url) => url,
            Err(e) => {
                debug!(url = %job.url, error = %e, "rejected before probing");
                let report = ProbeReport::rejected(e);
                return Some(CheckResult::from_report(index, job, report, 1, Disposition::Rejected));
            }
        };

        let mut attempts: u32 = 0;
        let mut last: Option<ProbeReport> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.limiter.await_slot() => {}
            }

            attempts += 1;
            let identity = self.rotator.next();
            debug!(url = %url, attempt = attempts, identity = identity.name, "attempting");
            let report = self.prober.probe(&url, identity).await;

            match classify_attempt(&report) {
                AttemptClass::Success => {
                    return Some(CheckResult::from_report(
                        index,
                        job,
                        report,
                        attempts,
                        Disposition::Succeeded,
                    ));
                }
                AttemptClass::Terminal => {
                    return Some(CheckResult::from_report(
                        index,
                        job,
                        report,
                        attempts,
                        Disposition::Rejected,
                    ));
                }
                AttemptClass::Retryable if attempts > self.retries => {
                    if let Some((stage, error)) = report.first_failure() {
                        warn!(url = %url, attempts, %stage, %error, "retries exhausted");
                    }
                    return Some(CheckResult::from_report(
                        index,
                        job,
                        report,
                        attempts,
                        Disposition::Exhausted,
                    ));
                }
                AttemptClass::Retryable => {
                    let delay = self.backoff(attempts - 1);
                    debug!(url = %url, attempt = attempts, delay_ms = delay.as_millis() as u64, "backing off");
                    last = Some(report);

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        // Only reachable through cancellation
        let report = last?;
        warn!(url = %url, attempts, "run cancelled, keeping partial result");
        Some(CheckResult::from_report(index, job, report, attempts, Disposition::Interrupted))
    }
}
