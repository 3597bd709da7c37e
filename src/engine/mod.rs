// src/engine/mod.rs
// =============================================================================
// The health-check engine.
//
// Submodules, leaves first:
// - identity:  random browser profile per attempt
// - cache:     TTL cache in front of DNS
// - limiter:   global pacing of attempt starts
// - challenge: bot-challenge detection on HTTP responses
// - prober:    DNS -> TCP -> HTTP for one URL
// - retry:     bounded retries with exponential backoff
// - scheduler: bounded worker pool over the whole job list
// - summary:   ok / warn / fail counts per group
// - types:     Job, StageOutcome, CheckResult
// =============================================================================

pub mod cache;
pub mod challenge;
pub mod identity;
pub mod limiter;
pub mod prober;
pub mod retry;
pub mod scheduler;
pub mod summary;
pub mod types;

pub use identity::{IdentityRotator, PROFILE_TABLE_VERSION};
pub use scheduler::Engine;
pub use summary::{classify, summarize, GroupCounts, Summary, Verdict};
pub use types::{CheckResult, Disposition, Job, StageOutcome, StageState};
