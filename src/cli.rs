// src/cli.rs
// =============================================================================
// Command-line interface, built with clap's derive API.
//
//   webcheck check urls.txt [options]     check a grouped URL list
//   webcheck url https://a.example ...    check URLs given on the command line
//   webcheck profiles                     show the browser identity table
//
// Engine options are shared by `check` and `url` through a flattened struct.
// They are all optional so that a config file can supply them; whatever is
// given on the command line wins.
// =============================================================================

use webcheck::config::{seconds, EngineConfig, FileConfig, WarningPolicy};
use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "webcheck",
    version,
    about = "Health-check large URL lists with DNS, TCP and HTTP probes",
    long_about = "webcheck probes every URL in a list for DNS resolution, TCP reachability and \
                  HTTP health, with global request pacing, retries with backoff, rotating browser \
                  identities and bot-challenge detection."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every "Full URL:" entry of a grouped URL list
    ///
    /// Example: webcheck check urls.txt --concurrency 20 --report-html report.html
    Check {
        /// Path to the URL list
        file: PathBuf,

        #[command(flatten)]
        options: CheckOptions,
    },

    /// Check URLs given on the command line
    ///
    /// Example: webcheck url example.com https://www.rust-lang.org
    Url {
        /// One or more URLs; a missing scheme defaults to https
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        options: CheckOptions,
    },

    /// List the browser identity profiles used for HTTP requests
    Profiles,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckOptions {
    /// Maximum number of URLs checked at the same time [default: 30]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extra attempts for transient failures [default: 3]
    #[arg(long)]
    pub retries: Option<u32>,

    /// DNS timeout in seconds [default: 3]
    #[arg(long, value_name = "SECS")]
    pub dns_timeout: Option<f64>,

    /// TCP connect timeout in seconds [default: 3]
    #[arg(long, value_name = "SECS")]
    pub tcp_timeout: Option<f64>,

    /// End-to-end HTTP timeout in seconds [default: 10]
    #[arg(long, value_name = "SECS")]
    pub http_timeout: Option<f64>,

    /// Minimum delay between request starts in seconds [default: 0.1]
    #[arg(long, value_name = "SECS")]
    pub rate_limit: Option<f64>,

    /// Maximum random delay added to pacing and backoff in seconds [default: 0.3]
    #[arg(long, value_name = "SECS")]
    pub jitter: Option<f64>,

    /// Base delay of the exponential retry backoff in seconds [default: 0.5]
    #[arg(long, value_name = "SECS")]
    pub backoff: Option<f64>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Count challenge-protected but otherwise healthy URLs as available
    #[arg(long)]
    pub count_warnings_as_available: bool,

    /// Stop starting new attempts after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<f64>,

    /// JSON config file; command-line options take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the JSON report to stdout instead of the table
    #[arg(long)]
    pub json: bool,

    /// Only show warnings and failures in the table
    #[arg(long)]
    pub errors_only: bool,

    /// Write an HTML report
    #[arg(long, value_name = "PATH")]
    pub report_html: Option<PathBuf>,

    /// Write a JSON report
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,

    /// Write a CSV report
    #[arg(long, value_name = "PATH")]
    pub report_csv: Option<PathBuf>,
}

impl CheckOptions {
    /// Defaults, then the config file, then command-line flags
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::default();

        if let Some(path) = &self.config {
            FileConfig::load(path)?.apply(&mut config)?;
        }

        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = self.retries {
            config.retries = v;
        }
        if let Some(v) = self.dns_timeout {
            config.dns_timeout = seconds("--dns-timeout", v)?;
        }
        if let Some(v) = self.tcp_timeout {
            config.tcp_timeout = seconds("--tcp-timeout", v)?;
        }
        if let Some(v) = self.http_timeout {
            config.http_timeout = seconds("--http-timeout", v)?;
        }
        if let Some(v) = self.rate_limit {
            config.rate_limit = seconds("--rate-limit", v)?;
        }
        if let Some(v) = self.jitter {
            config.jitter_max = seconds("--jitter", v)?;
        }
        if let Some(v) = self.backoff {
            config.backoff_base = seconds("--backoff", v)?;
        }
        if self.insecure {
            config.verify_tls = false;
        }
        if self.count_warnings_as_available {
            config.warning_policy = WarningPolicy::Available;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn deadline(&self) -> Result<Option<Duration>> {
        self.deadline.map(|v| seconds("--deadline", v)).transpose()
    }
}


// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does #[command(flatten)] do?
//    - It splices the fields of CheckOptions into the subcommand
//    - Both `check` and `url` get the same flags without repeating them
//
// 2. Why Option<f64> instead of a default value?
//    - None means "not given on the command line"
//    - That lets a value from the config file survive unless overridden
//
// 3. What is ArgAction::Count?
//    - Counts how often a flag appears: -vvv gives verbose = 3
// -----------------------------------------------------------------------------
