// src/engine/summary.rs
// =============================================================================
// Reduces a finished result set to ok / warn / fail counts.
//
//   fail - DNS or TCP failed, no HTTP response, or HTTP status >= 400
//   warn - a bot challenge was detected and nothing failed hard
//   ok   - everything else
//
// Pure and order-independent: the same results always give the same summary.
// =============================================================================

use crate::config::WarningPolicy;
use crate::engine::types::CheckResult;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Ok,
    Warn,
    Fail,
}

pub fn classify(result: &CheckResult) -> Verdict {
    let hard_failure = !result.dns.is_passed()
        || !result.tcp.is_passed()
        || !result.http.is_passed()
        || result.http.value.map_or(true, |status| status >= 400);

    if hard_failure {
        Verdict::Fail
    } else if result.captcha {
        Verdict::Warn
    } else {
        Verdict::Ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupCounts {
    pub ok: usize,
    pub warn: usize,
    pub fail: usize,
}

impl GroupCounts {
    fn add(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Ok => self.ok += 1,
            Verdict::Warn => self.warn += 1,
            Verdict::Fail => self.fail += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.warn + self.fail
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Per group, sorted by group label
    pub groups: BTreeMap<String, GroupCounts>,
    pub total: GroupCounts,
    pub warning_policy: WarningPolicy,
    /// Results counted as available under the warning policy
    pub available: usize,
}

impl Summary {
    /// Share of available results, 0.0 - 100.0
    pub fn availability_percent(&self) -> f64 {
        let total = self.total.total();
        if total == 0 {
            return 0.0;
        }
        self.available as f64 * 100.0 / total as f64
    }

    /// True when nothing warned or failed
    pub fn all_ok(&self) -> bool {
        self.total.warn == 0 && self.total.fail == 0
    }
}

pub fn summarize(results: &[CheckResult], policy: WarningPolicy) -> Summary {
    let mut groups: BTreeMap<String, GroupCounts> = BTreeMap::new();
    let mut total = GroupCounts::default();

    for result in results {
        let verdict = classify(result);
        groups.entry(result.job.group.clone()).or_default().add(verdict);
        total.add(verdict);
    }

    let available = match policy {
        WarningPolicy::Degraded => total.ok,
        WarningPolicy::Available => total.ok + total.warn,
    };

    Summary {
        groups,
        total,
        warning_policy: policy,
        available,
    }
}
