// src/main.rs
// =============================================================================
// Entry point of the webcheck CLI.
//
// What happens here:
// 1. Parse command-line arguments and set up logging
// 2. Turn the input (URL list file or ad-hoc URLs) into jobs
// 3. Run the engine, printing a line per URL as it completes
// 4. Print/write reports
// 5. Exit with a meaningful code (0 = all ok, 1 = warnings or failures,
//    2 = error)
//
// Ctrl-C or --deadline cancel the run: in-flight checks stop retrying and
// whatever finished is still reported.
// =============================================================================

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{CheckOptions, Cli, Commands};
use webcheck::engine::{summarize, Engine, IdentityRotator, Job, PROFILE_TABLE_VERSION};
use webcheck::{loader, report};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AD_HOC_GROUP: &str = "Ad hoc";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so `--json` output on stdout stays clean
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "webcheck=warn",
        1 => "webcheck=info",
        2 => "webcheck=debug",
        _ => "webcheck=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check { file, options } => {
            let jobs = loader::load_jobs(&file)?;
            if !options.json {
                println!("🔍 Loaded {} URL(s) from {}", jobs.len(), file.display());
            }
            handle_check(jobs, &options).await
        }
        Commands::Url { urls, options } => {
            // Unusable input is passed through so it shows up as a failed result
            let jobs = urls
                .iter()
                .map(|raw| {
                    let url = loader::normalize_url(raw).unwrap_or_else(|| raw.clone());
                    Job {
                        group: AD_HOC_GROUP.to_string(),
                        original_text: raw.clone(),
                        url,
                    }
                })
                .collect();
            handle_check(jobs, &options).await
        }
        Commands::Profiles => {
            print_profiles();
            Ok(0)
        }
    }
}

async fn handle_check(jobs: Vec<Job>, options: &CheckOptions) -> Result<i32> {
    let config = options.engine_config()?;

    if jobs.is_empty() {
        if !options.json {
            println!("✅ No URLs found to check");
        }
        return Ok(0);
    }

    if !options.json {
        println!(
            "🌐 Checking {} URL(s) | concurrency {} | retries {} | pacing {:?} + up to {:?} | TLS verify {}\n",
            jobs.len(),
            config.concurrency,
            config.retries,
            config.rate_limit,
            config.jitter_max,
            config.verify_tls
        );
    }

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(cancel.clone(), options.deadline()?);

    let engine = Engine::new(&config, cancel.clone())?;
    let total = jobs.len();
    let mut done = 0;
    let results = engine
        .run_with(jobs, |result| {
            done += 1;
            if !options.json {
                println!("{}", report::progress_line(result, done, total));
            }
        })
        .await;

    let summary = summarize(&results, config.warning_policy);

    if let Some(path) = &options.report_json {
        report::write_json(path, &results, &summary)?;
    }
    if let Some(path) = &options.report_csv {
        report::write_csv(path, &results)?;
    }
    if let Some(path) = &options.report_html {
        report::write_html(path, &results, &summary)?;
    }

    if options.json {
        println!("{}", report::json_document(&results, &summary)?);
    } else {
        println!();
        report::print_table(&results, options.errors_only);
        report::print_summary(&summary);
        for path in [&options.report_json, &options.report_csv, &options.report_html]
            .into_iter()
            .flatten()
        {
            println!("📄 Report saved to: {}", path.display());
        }
    }

    if cancel.is_cancelled() || !summary.all_ok() {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Ctrl-C and the optional deadline both end up cancelling the run token
fn spawn_cancel_triggers(cancel: CancellationToken, deadline: Option<Duration>) {
    tokio::spawn(async move {
        let deadline_reached = async {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("interrupted, finishing in-flight checks");
            }
            _ = deadline_reached => {
                warn!("deadline reached, finishing in-flight checks");
            }
        }
        cancel.cancel();
    });
}

fn print_profiles() {
    println!("Browser identity profiles (table v{}):\n", PROFILE_TABLE_VERSION);
    for profile in IdentityRotator.profiles() {
        println!("{:<16} {}", profile.name, profile.user_agent);
        for (name, value) in profile.headers {
            println!("{:<16}   {}: {}", "", name, value);
        }
        println!();
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is a CancellationToken?
//    - A cheap, clonable flag from tokio-util
//    - One clone calls cancel(), every other clone can await cancelled()
//    - Workers check it while they wait, so nothing is killed mid-request
//
// 2. Why does the progress closure capture `done` mutably?
//    - run_with takes an FnMut, which may change the variables it captures
//    - The engine calls it once per finished URL, in completion order
//
// 3. What is `{:#}` in eprintln!?
//    - The alternate format of anyhow::Error prints the whole context chain:
//      "reading URL list urls.txt: No such file or directory"
// -----------------------------------------------------------------------------
