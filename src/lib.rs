// src/lib.rs
// =============================================================================
// webcheck: concurrent, rate-limited DNS / TCP / HTTP health checks for large
// URL lists.
//
// - engine: the checking core (pacing, retries, probing, aggregation)
// - loader: grouped URL list parsing and URL normalization
// - report: console, JSON, CSV and HTML output
// - config: the engine's options record and the JSON config file
// - error:  typed probe and DNS errors
//
// The `webcheck` binary (src/main.rs) is a thin CLI over these modules.
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod report;
