// src/engine/cache.rs
// =============================================================================
// DNS endpoint cache shared by every worker.
//
// URL lists often repeat the same host dozens of times, so each hostname is
// resolved once and remembered for a fixed TTL. NXDOMAIN answers are cached
// and expire like everything else. Timeouts and other resolver errors are
// not cached at all: the next attempt for that host asks the resolver again.
//
// The actual lookup sits behind the `Resolve` trait: production uses
// hickory's async resolver, tests plug in a scripted fake.
//
// Concurrency: entries live in a DashMap (sharded locks). Two workers missing
// the same host at the same moment may both look it up; the last write wins
// and the map is never left half-updated.
// =============================================================================

use crate::error::DnsError;
use async_trait::async_trait;
use dashmap::DashMap;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Something that can turn a hostname into an IP address
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn lookup(&self, host: &str) -> Result<IpAddr, DnsError>;
}

/// Resolver backed by the system's nameservers
pub struct SystemResolver {
    inner: TokioAsyncResolver,
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                warn!("could not read system resolver config, using defaults: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;
        // EndpointCache owns TTL handling
        opts.cache_size = 0;

        Self {
            inner: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }

    fn classify(&self, host: &str, error: &ResolveError) -> DnsError {
        match error.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => DnsError::NxDomain(host.to_string()),
            ResolveErrorKind::Timeout => DnsError::Timeout(self.timeout.as_millis() as u64),
            _ => DnsError::Other(error.to_string()),
        }
    }
}

#[async_trait]
impl Resolve for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<IpAddr, DnsError> {
        match self.inner.lookup_ip(host).await {
            Ok(answer) => answer
                .iter()
                .next()
                .ok_or_else(|| DnsError::NxDomain(host.to_string())),
            Err(e) => Err(self.classify(host, &e)),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: Result<IpAddr, DnsError>,
    expires_at: Instant,
}

/// TTL-bounded memo of hostname lookups
pub struct EndpointCache {
    resolver: Arc<dyn Resolve>,
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    timeout: Duration,
}

impl EndpointCache {
    pub fn new(resolver: Arc<dyn Resolve>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            resolver,
            entries: DashMap::new(),
            ttl,
            timeout,
        }
    }

    /// Resolves `host`, answering from the cache while the entry is fresh
    ///
    /// IP literals are returned as-is and never cached.
    pub async fn resolve(&self, host: &str) -> Result<IpAddr, DnsError> {
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            return Ok(ip);
        }

        let key = host.to_ascii_lowercase();
        let now = Instant::now();

        // The map guard must be gone before the lookup below awaits
        let cached = self
            .entries
            .get(&key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.result.clone());
        if let Some(result) = cached {
            debug!(host = %key, "dns cache hit");
            return result;
        }

        debug!(host = %key, "dns cache miss");
        let result = match tokio::time::timeout(self.timeout, self.resolver.lookup(&key)).await {
            Ok(result) => result,
            Err(_) => Err(DnsError::Timeout(self.timeout.as_millis() as u64)),
        };

        match &result {
            Ok(_) | Err(DnsError::NxDomain(_)) => {
                self.entries.insert(
                    key,
                    CacheEntry {
                        result: result.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            Err(e) => {
                // a stale entry must not outlive a failed refresh
                self.entries.remove(&key);
                debug!(host = %key, error = %e, "transient dns failure, not cached");
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Resolver answering from a fixed table and counting every lookup
    #[derive(Default)]
    pub(crate) struct FakeResolver {
        pub answers: HashMap<String, Result<IpAddr, DnsError>>,
        /// Returned, in order, before `answers` is consulted
        pub failures_first: Mutex<VecDeque<DnsError>>,
        pub lookups: AtomicUsize,
        pub delay: Duration,
    }

    impl FakeResolver {
        pub fn with(answers: &[(&str, Result<IpAddr, DnsError>)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(h, r)| (h.to_string(), r.clone()))
                    .collect(),
                ..Self::default()
            }
        }

        pub fn failing_first(self, errors: Vec<DnsError>) -> Self {
            Self {
                failures_first: Mutex::new(errors.into()),
                ..self
            }
        }

        pub fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolve for FakeResolver {
        async fn lookup(&self, host: &str) -> Result<IpAddr, DnsError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(error) = self.failures_first.lock().unwrap().pop_front() {
                return Err(error);
            }
            self.answers
                .get(host)
                .cloned()
                .unwrap_or_else(|| Err(DnsError::NxDomain(host.to_string())))
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_second_lookup_within_ttl_hits_cache() {
        let resolver = Arc::new(FakeResolver::with(&[("good.example", Ok(ip("10.0.0.1")))]));
        let cache = EndpointCache::new(resolver.clone(), Duration::from_secs(300), Duration::from_secs(3));

        assert_eq!(cache.resolve("good.example").await, Ok(ip("10.0.0.1")));
        assert_eq!(cache.resolve("good.example").await, Ok(ip("10.0.0.1")));
        assert_eq!(resolver.lookups(), 1);
    }

    #[tokio::test]
    async fn test_lookup_after_ttl_is_fresh() {
        let resolver = Arc::new(FakeResolver::with(&[("good.example", Ok(ip("10.0.0.1")))]));
        let cache = EndpointCache::new(resolver.clone(), Duration::from_millis(50), Duration::from_secs(3));

        cache.resolve("good.example").await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.resolve("good.example").await.unwrap();
        assert_eq!(resolver.lookups(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_cached_and_expire() {
        let resolver = Arc::new(FakeResolver::default());
        let cache = EndpointCache::new(resolver.clone(), Duration::from_millis(50), Duration::from_secs(3));

        let first = cache.resolve("dead.example").await;
        assert_eq!(first, Err(DnsError::NxDomain("dead.example".into())));
        assert!(cache.resolve("dead.example").await.is_err());
        assert_eq!(resolver.lookups(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.resolve("dead.example").await.is_err());
        assert_eq!(resolver.lookups(), 2);
    }

    #[tokio::test]
    async fn test_timeout_is_not_cached() {
        let resolver = Arc::new(
            FakeResolver::with(&[("flaky.example", Ok(ip("10.0.0.4")))])
                .failing_first(vec![DnsError::Timeout(3000)]),
        );
        let cache = EndpointCache::new(resolver.clone(), Duration::from_secs(300), Duration::from_secs(3));

        assert_eq!(cache.resolve("flaky.example").await, Err(DnsError::Timeout(3000)));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.resolve("flaky.example").await, Ok(ip("10.0.0.4")));
        assert_eq!(resolver.lookups(), 2);

        // the successful answer is cached as usual
        cache.resolve("flaky.example").await.unwrap();
        assert_eq!(resolver.lookups(), 2);
    }

    #[tokio::test]
    async fn test_resolver_errors_are_not_cached() {
        let resolver = Arc::new(
            FakeResolver::with(&[("servfail.example", Ok(ip("10.0.0.5")))])
                .failing_first(vec![DnsError::Other("SERVFAIL".into()), DnsError::Other("SERVFAIL".into())]),
        );
        let cache = EndpointCache::new(resolver.clone(), Duration::from_secs(300), Duration::from_secs(3));

        assert!(cache.resolve("servfail.example").await.is_err());
        assert!(cache.resolve("servfail.example").await.is_err());
        assert_eq!(cache.resolve("servfail.example").await, Ok(ip("10.0.0.5")));
        assert_eq!(resolver.lookups(), 3);
    }

    #[tokio::test]
    async fn test_ip_literals_skip_resolver() {
        let resolver = Arc::new(FakeResolver::default());
        let cache = EndpointCache::new(resolver.clone(), Duration::from_secs(300), Duration::from_secs(3));

        assert_eq!(cache.resolve("127.0.0.1").await, Ok(ip("127.0.0.1")));
        assert_eq!(cache.resolve("[::1]").await, Ok(ip("::1")));
        assert_eq!(resolver.lookups(), 0);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_slow_resolver_times_out() {
        let resolver = Arc::new(FakeResolver {
            delay: Duration::from_millis(200),
            ..FakeResolver::with(&[("slow.example", Ok(ip("10.0.0.2")))])
        });
        let cache = EndpointCache::new(resolver, Duration::from_secs(300), Duration::from_millis(20));

        assert_eq!(cache.resolve("slow.example").await, Err(DnsError::Timeout(20)));
    }

    #[tokio::test]
    async fn test_concurrent_resolves_agree() {
        let resolver = Arc::new(FakeResolver {
            delay: Duration::from_millis(10),
            ..FakeResolver::with(&[("busy.example", Ok(ip("10.0.0.3")))])
        });
        let cache = Arc::new(EndpointCache::new(
            resolver.clone(),
            Duration::from_secs(300),
            Duration::from_secs(3),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve("busy.example").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(ip("10.0.0.3")));
        }
        assert_eq!(cache.len(), 1);
        // a few duplicate lookups are allowed, one per waiting worker at most
        assert!(resolver.lookups() <= 16);
    }
}
