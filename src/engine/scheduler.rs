// src/engine/scheduler.rs
// =============================================================================
// The engine: runs every job through the retry controller on a bounded pool.
//
// The pool is a stream of job futures driven with `buffer_unordered(n)`:
// at most n jobs are in flight, and a new job starts as soon as one finishes.
// Results come back in completion order, not submission order; each carries
// its submission index so callers can sort if they care.
//
// Wiring (built once per run and shared by all workers):
//
//   SystemResolver -> EndpointCache -> StageProber --+
//                                     RateLimiter ---+--> RetryController
//
// Cancelling the token stops retries, interrupts pacing/backoff waits, and
// makes jobs that have not started yet return nothing.
// =============================================================================

use crate::config::EngineConfig;
use crate::engine::cache::{EndpointCache, SystemResolver};
use crate::engine::limiter::RateLimiter;
use crate::engine::prober::{Probe, StageProber};
use crate::engine::retry::RetryController;
use crate::engine::types::{CheckResult, Job};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Engine {
    controller: RetryController,
    concurrency: usize,
    cancel: CancellationToken,
    cache: Option<Arc<EndpointCache>>,
}

impl Engine {
    /// Builds the production engine: system DNS, real sockets, pooled HTTP
    pub fn new(config: &EngineConfig, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;

        let resolver = Arc::new(SystemResolver::new(config.dns_timeout));
        let cache = Arc::new(EndpointCache::new(resolver, config.cache_ttl, config.dns_timeout));
        let prober = StageProber::new(config, cache.clone()).context("building HTTP client")?;

        let mut engine = Self::with_prober(config, Arc::new(prober), cancel);
        engine.cache = Some(cache);
        Ok(engine)
    }

    /// Builds an engine around any prober
    pub fn with_prober(config: &EngineConfig, prober: Arc<dyn Probe>, cancel: CancellationToken) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit, config.jitter_max));
        Self {
            controller: RetryController::new(prober, limiter, config, cancel.clone()),
            concurrency: config.concurrency.max(1),
            cancel,
            cache: None,
        }
    }

    pub async fn run(&self, jobs: Vec<Job>) -> Vec<CheckResult> {
        self.run_with(jobs, |_| {}).await
    }

    /// Runs all jobs, calling `on_result` as each one completes
    pub async fn run_with<F>(&self, jobs: Vec<Job>, mut on_result: F) -> Vec<CheckResult>
    where
        F: FnMut(&CheckResult),
    {
        let submitted = jobs.len();
        let started = Instant::now();
        info!(jobs = submitted, concurrency = self.concurrency, "starting run");

        let controller = &self.controller;
        let mut pending = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| controller.run_with_retry(index, job))
            .buffer_unordered(self.concurrency);

        let mut results = Vec::with_capacity(submitted);
        while let Some(outcome) = pending.next().await {
            if let Some(result) = outcome {
                on_result(&result);
                results.push(result);
            }
        }

        if self.cancel.is_cancelled() {
            warn!(
                completed = results.len(),
                skipped = submitted - results.len(),
                "run cancelled before every job was attempted"
            );
        }
        info!(
            completed = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            cached_hosts = self.cache.as_ref().map_or(0, |c| c.len()),
            "run finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::identity::BrowserProfile;
    use crate::engine::retry::tests::{dns_failure, fast_config, healthy, http_error, ScriptedProbe};
    use crate::engine::summary::{summarize, GroupCounts};
    use crate::engine::types::{Disposition, ProbeReport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    #[tokio::test]
    async fn test_good_and_dead_hosts() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            ("https://good.example", vec![healthy(200)]),
            ("https://dead.example", vec![dns_failure("dead.example")]),
        ]));
        let engine = Engine::with_prober(&fast_config(1), probe, CancellationToken::new());

        let mut results = engine
            .run(vec![
                Job::new("A", "https://good.example"),
                Job::new("A", "https://dead.example"),
            ])
            .await;
        results.sort_by_key(|r| r.index);

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].dns.error.is_some());
        assert!(!results[1].tcp.is_passed() && !results[1].tcp.is_failed());
        assert!(!results[1].http.is_passed() && !results[1].http.is_failed());

        let summary = summarize(&results, Default::default());
        assert_eq!(summary.groups["A"], GroupCounts { ok: 1, warn: 0, fail: 1 });
    }

    #[tokio::test]
    async fn test_every_job_yields_exactly_one_result() {
        let mut scripts = Vec::new();
        let mut jobs = Vec::new();
        let urls: Vec<String> = (0..40).map(|i| format!("https://host{}.example", i)).collect();
        for (i, url) in urls.iter().enumerate() {
            let script = match i % 4 {
                0 => vec![healthy(200)],
                1 => vec![http_error(503), healthy(200)],
                2 => vec![http_error(404)],
                _ => vec![dns_failure("x")],
            };
            scripts.push((url.as_str(), script));
            jobs.push(Job::new(format!("G{}", i % 3), url.clone()));
        }
        let engine = Engine::with_prober(
            &EngineConfig {
                concurrency: 7,
                ..fast_config(2)
            },
            Arc::new(ScriptedProbe::new(scripts)),
            CancellationToken::new(),
        );

        let results = engine.run(jobs).await;

        assert_eq!(results.len(), 40);
        let mut indices: Vec<_> = results.iter().map(|r| r.index).collect();
        indices.sort();
        assert_eq!(indices, (0..40).collect::<Vec<_>>());
        assert!(results.iter().all(|r| r.attempts_used >= 1 && r.attempts_used <= 3));
    }

    /// Tracks how many probes run at the same time
    #[derive(Default)]
    struct GaugeProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Probe for GaugeProbe {
        async fn probe(&self, _url: &Url, _identity: &'static BrowserProfile) -> ProbeReport {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            healthy(200)
        }
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let probe = Arc::new(GaugeProbe::default());
        let engine = Engine::with_prober(
            &EngineConfig {
                concurrency: 3,
                ..fast_config(0)
            },
            probe.clone(),
            CancellationToken::new(),
        );
        let jobs = (0..12)
            .map(|i| Job::new("A", format!("https://h{}.example", i)))
            .collect();

        let results = engine.run(jobs).await;

        assert_eq!(results.len(), 12);
        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {}", peak);
        assert!(peak >= 2, "pool never overlapped work");
    }

    #[tokio::test]
    async fn test_callback_sees_every_result() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            ("https://a.example", vec![healthy(200)]),
            ("https://b.example", vec![healthy(204)]),
        ]));
        let engine = Engine::with_prober(&fast_config(0), probe, CancellationToken::new());

        let mut seen = Vec::new();
        let results = engine
            .run_with(
                vec![Job::new("A", "https://a.example"), Job::new("B", "https://b.example")],
                |r| seen.push(r.index),
            )
            .await;

        seen.sort();
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_well_formed_subset() {
        let mut scripts = Vec::new();
        let urls: Vec<String> = (0..50).map(|i| format!("https://slow{}.example", i)).collect();
        for url in &urls {
            scripts.push((url.as_str(), vec![http_error(503)]));
        }
        let probe = ScriptedProbe {
            delay: Duration::from_millis(10),
            ..ScriptedProbe::new(scripts)
        };
        let config = EngineConfig {
            concurrency: 5,
            rate_limit: Duration::from_millis(5),
            backoff_base: Duration::from_secs(10),
            ..fast_config(3)
        };
        let cancel = CancellationToken::new();
        let engine = Engine::with_prober(&config, Arc::new(probe), cancel.clone());

        let jobs = urls.iter().map(|u| Job::new("A", u.clone())).collect();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
        let results = tokio::time::timeout(Duration::from_secs(5), engine.run(jobs))
            .await
            .expect("cancelled run must finish promptly");
        canceller.await.unwrap();

        assert!(!results.is_empty());
        assert!(results.len() < 50);
        for result in &results {
            assert!(result.attempts_used >= 1);
            assert_eq!(result.disposition, Disposition::Interrupted);
        }
    }
}
