// src/loader/mod.rs
// =============================================================================
// Turns URL list files into engine jobs.
//
// Input files are grouped, loosely formatted text:
//
//   AK (Alaska): www.commerce.alaska.gov
//     Full URL: https://www.commerce.alaska.gov/cbp/main/Search/Professional
//   AL (Alabama): www.albme.org
//     Full URL: www.albme.org/Licensing/Verification.aspx
//
// A line with a colon sets the current group; "Full URL:" lines carry the
// URL to check. URLs are normalized before they reach the engine.
// =============================================================================

mod urls;

pub use urls::{load_jobs, normalize_url, parse_jobs};
