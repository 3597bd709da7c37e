// src/engine/prober.rs
// =============================================================================
// One probe attempt: DNS, then TCP, then HTTP.
//
// Stages run in order and stop at the first fatal failure. Skipped stages are
// still recorded (as NotAttempted) so every report has all three.
//
// - DNS:  EndpointCache lookup, latency of the call (cache hits are ~0 ms)
// - TCP:  raw connect to ip:port with a timeout, closed right away
// - HTTP: GET with the attempt's browser identity through a shared, pooled
//         reqwest client; status, latency and challenge detection
//
// The reqwest client resolves names through the same EndpointCache, so the
// HTTP stage talks to the address the DNS stage reported and never causes a
// second lookup.
// =============================================================================

use crate::config::EngineConfig;
use crate::engine::cache::EndpointCache;
use crate::engine::challenge::{self, ResponseSnapshot};
use crate::engine::identity::BrowserProfile;
use crate::engine::types::{HttpOutcome, ProbeReport, StageOutcome, TcpOutcome};
use crate::error::ProbeError;
use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolving};
use reqwest::header::USER_AGENT;
use reqwest::{Client, Response};
use std::error::Error as StdError;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Runs one DNS → TCP → HTTP pass against a URL
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &Url, identity: &'static BrowserProfile) -> ProbeReport;
}

// Lets reqwest resolve through the endpoint cache
struct CachedDns(Arc<EndpointCache>);

impl reqwest::dns::Resolve for CachedDns {
    fn resolve(&self, name: Name) -> Resolving {
        let cache = self.0.clone();
        Box::pin(async move {
            match cache.resolve(name.as_str()).await {
                // reqwest fills in the port
                Ok(ip) => Ok(Box::new(std::iter::once(SocketAddr::new(ip, 0))) as Addrs),
                Err(e) => Err(Box::new(e) as Box<dyn StdError + Send + Sync>),
            }
        })
    }
}

pub struct StageProber {
    cache: Arc<EndpointCache>,
    client: Client,
    tcp_timeout: Duration,
    http_timeout: Duration,
    max_body_bytes: usize,
}

impl StageProber {
    pub fn new(config: &EngineConfig, cache: Arc<EndpointCache>) -> Result<Self, reqwest::Error> {
        // One client for the whole run: connections are pooled per host
        let client = Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.tcp_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(!config.verify_tls)
            .dns_resolver(Arc::new(CachedDns(cache.clone())))
            .pool_idle_timeout(Duration::from_secs(90))
            .no_proxy()
            .build()?;

        Ok(Self {
            cache,
            client,
            tcp_timeout: config.tcp_timeout,
            http_timeout: config.http_timeout,
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn tcp_stage(&self, ip: IpAddr, port: u16) -> TcpOutcome {
        let addr = SocketAddr::new(ip, port);
        let started = Instant::now();

        match tokio::time::timeout(self.tcp_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                // reachability only, the HTTP stage brings its own connection
                drop(stream);
                StageOutcome::passed(addr, started.elapsed())
            }
            Ok(Err(e)) => StageOutcome::failed(categorize_io_error(&e, self.tcp_timeout), started.elapsed()),
            Err(_) => StageOutcome::failed(
                ProbeError::ConnectTimeout(self.tcp_timeout.as_millis() as u64),
                started.elapsed(),
            ),
        }
    }

    async fn http_stage(&self, url: &Url, identity: &'static BrowserProfile) -> (HttpOutcome, bool) {
        let mut request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, identity.user_agent);
        for (name, value) in identity.headers {
            request = request.header(*name, *value);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = categorize_error(&e, self.http_timeout, url.scheme() == "https");
                return (StageOutcome::failed(error, started.elapsed()), false);
            }
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = read_body_prefix(response, self.max_body_bytes).await;
        let latency = started.elapsed();

        let snapshot = ResponseSnapshot { status, headers, body };
        let captcha = challenge::detect(&snapshot);
        if captcha {
            if let Some(kind) = challenge::classify(&snapshot) {
                debug!(%url, %kind, status, "bot challenge detected");
            }
        }

        let outcome = if status < 400 {
            StageOutcome::passed(status, latency)
        } else {
            StageOutcome::failed_with(status, ProbeError::Status(status), latency)
        };
        (outcome, captcha)
    }
}

#[async_trait]
impl Probe for StageProber {
    async fn probe(&self, url: &Url, identity: &'static BrowserProfile) -> ProbeReport {
        let Some(host) = url.host_str() else {
            return ProbeReport::rejected(ProbeError::InvalidUrl(url.to_string()));
        };
        let port = url.port_or_known_default().unwrap_or(80);

        let started = Instant::now();
        let resolved = self.cache.resolve(host).await;
        let dns_latency = started.elapsed();

        let ip = match resolved {
            Ok(ip) => ip,
            Err(e) => {
                debug!(%url, error = %e, "dns stage failed");
                return ProbeReport {
                    dns: StageOutcome::failed(e.into(), dns_latency),
                    tcp: StageOutcome::not_attempted(),
                    http: StageOutcome::not_attempted(),
                    captcha: false,
                };
            }
        };
        let dns = StageOutcome::passed(ip, dns_latency);

        let tcp = self.tcp_stage(ip, port).await;
        if !tcp.is_passed() {
            debug!(%url, %ip, port, "tcp stage failed");
            return ProbeReport {
                dns,
                tcp,
                http: StageOutcome::not_attempted(),
                captcha: false,
            };
        }

        let (http, captcha) = self.http_stage(url, identity).await;
        debug!(%url, status = ?http.value, captcha, "http stage finished");

        ProbeReport { dns, tcp, http, captcha }
    }
}

// Reads at most `limit` bytes of the body; a body that fails half way is
// still inspected as far as it arrived
async fn read_body_prefix(mut response: Response, limit: usize) -> String {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "body read interrupted");
                break;
            }
        }
    }
    buf.truncate(limit);
    String::from_utf8_lossy(&buf).into_owned()
}

fn categorize_io_error(error: &io::Error, timeout: Duration) -> ProbeError {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => ProbeError::ConnectRefused,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => ProbeError::ConnectReset,
        io::ErrorKind::TimedOut => ProbeError::ConnectTimeout(timeout.as_millis() as u64),
        _ => ProbeError::Connect(error.to_string()),
    }
}

// Cause chain below reqwest's own message. The top level embeds the URL,
// which must not take part in keyword matching.
fn error_chain(error: &reqwest::Error) -> String {
    let mut parts = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    if parts.is_empty() {
        // only reached when reqwest gives no cause; drop the URL from the message
        return error.to_string().split(" for url (").next().unwrap_or_default().to_string();
    }
    parts.join(": ")
}

fn categorize_error(error: &reqwest::Error, timeout: Duration, https: bool) -> ProbeError {
    if error.is_timeout() {
        return ProbeError::HttpTimeout(timeout.as_millis() as u64);
    }
    if error.is_redirect() {
        return ProbeError::TooManyRedirects;
    }

    let text = error_chain(error);
    let lower = text.to_lowercase();
    let tls_failure = lower.contains("certificate")
        || lower.contains("tls")
        || lower.contains("ssl")
        || lower.contains("handshake");
    if https && tls_failure {
        ProbeError::Tls(text)
    } else if lower.contains("connection reset") {
        ProbeError::ConnectReset
    } else if lower.contains("connection refused") {
        ProbeError::ConnectRefused
    } else {
        ProbeError::Http(text)
    }
}
