//! Per-strategy evaluation counters
//!
//! Counters live beside the evaluation guard and, like it, are never
//! persisted: a rehydrated strategy starts from zero.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Decision, HoldReason, Outcome};

/// Counters updated by every guarded check
#[derive(Debug, Default)]
pub struct EvaluationStats {
    checks: AtomicU64,
    skipped: AtomicU64,
    fetch_failures: AtomicU64,
    terminations: AtomicU64,
    last_fetch_failure: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`EvaluationStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Check requests received
    pub checks: u64,
    /// Checks dropped because an evaluation was already in flight
    pub skipped: u64,
    /// Evaluations that could not fetch uptime
    pub fetch_failures: u64,
    /// Evaluations that triggered an idle timeout
    pub terminations: u64,
    /// When uptime last failed to fetch
    pub last_fetch_failure: Option<DateTime<Utc>>,
}

impl EvaluationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one check
    pub fn record(&self, outcome: &Outcome<Decision>) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Evaluated(Decision::Terminate(_)) => {
                self.terminations.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Evaluated(Decision::NoAction(HoldReason::UptimeUnavailable)) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut last) = self.last_fetch_failure.lock() {
                    *last = Some(reaper_util::now());
                }
            }
            Outcome::Evaluated(Decision::NoAction(_)) => {}
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            terminations: self.terminations.load(Ordering::Relaxed),
            last_fetch_failure: self.last_fetch_failure.lock().ok().and_then(|last| *last),
        }
    }
}

impl StatsSnapshot {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let mut line = format!(
            "checks={} skipped={} fetch_failures={} terminations={}",
            self.checks, self.skipped, self.fetch_failures, self.terminations
        );
        if let Some(at) = self.last_fetch_failure {
            line.push_str(&format!(" last_fetch_failure={}", at.to_rfc3339()));
        }
        line
    }
}
