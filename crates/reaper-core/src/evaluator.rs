//! Retention policy evaluator
//!
//! Decides whether an idle node should be torn down now. Two conditions are
//! considered:
//!
//! - **idle timeout**: the node has been idle longer than the configured minutes
//! - **billing cycle**: the node is within the configured lead time of its next
//!   hourly billing boundary
//!
//! | idle enabled | cycle enabled | fires when |
//! |---|---|---|
//! | yes | yes | both elapsed |
//! | yes | no | idle elapsed |
//! | no | yes | cycle elapsed |
//! | no | no | never |
//!
//! Every failure path resolves to [`Decision::NoAction`]; a transient cloud
//! error is retried on the next tick simply by being evaluated again.

use reaper_config::{BILLING_CYCLE_MINUTES, EvaluatorSettings, RetentionPolicy};
use reaper_node_api::NodeHandle;
use reaper_util::{add_duration, minutes, whole_minutes};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Unreachable nodes younger than this are assumed to still be booting
pub const STARTUP_TIMEOUT: Duration = minutes(30);

/// Billing granularity of the cloud provider
pub const BILLING_CYCLE: Duration = minutes(BILLING_CYCLE_MINUTES as u64);

/// Re-poll hint returned to the host scheduler, in minutes
pub const RECHECK_INTERVAL_MINUTES: u64 = 1;

/// Timing facts gathered from a node for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingFacts {
    /// Time since the instance was launched
    pub uptime: Duration,
    /// Time since the instance entered the running state
    pub running: Duration,
    /// Time since the node last had work
    pub idle: Duration,
    /// Node is unreachable
    pub offline: bool,
}

/// Why an evaluation took no action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Node record no longer exists
    NodeAbsent,
    /// Neither idle nor cycle termination is configured
    RetentionDisabled,
    /// Evaluation is switched off for the whole process
    EvaluationDisabled,
    /// Node has work assigned
    NotIdle,
    /// Uptime could not be fetched; the next tick retries
    UptimeUnavailable,
    /// Node is unreachable but may still be booting
    StartupGrace,
    /// Idle duration exceeds running duration, so the idle signal is not trusted
    IdleExceedsRunning,
    /// Facts were gathered but the trigger table did not fire
    ConditionsNotMet,
}

/// Conditions that fired a termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationReason {
    /// Idle duration, when idle termination is enabled
    pub idle: Option<Duration>,
    /// Time left in the billing cycle, when cycle termination is enabled
    pub cycle_remaining: Option<Duration>,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(idle) = self.idle {
            write!(f, "after {} idle minutes", whole_minutes(idle))?;
            sep = " ";
        }
        if let Some(remaining) = self.cycle_remaining {
            write!(
                f,
                "{}with {} minutes remaining in the billing cycle",
                sep,
                whole_minutes(remaining)
            )?;
        }
        Ok(())
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoAction(HoldReason),
    Terminate(TerminationReason),
}

impl Decision {
    pub fn is_terminate(&self) -> bool {
        matches!(self, Self::Terminate(_))
    }
}

/// Time left until the next billing boundary.
///
/// Always in `(0, BILLING_CYCLE]`: a node exactly on a boundary has a full
/// cycle ahead of it.
pub fn cycle_remaining(uptime: Duration) -> Duration {
    let cycle = BILLING_CYCLE.as_millis();
    let into_cycle = uptime.as_millis() % cycle;
    Duration::from_millis((cycle - into_cycle) as u64)
}

/// Applies one node's retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    policy: RetentionPolicy,
    settings: EvaluatorSettings,
}

impl Evaluator {
    pub fn new(policy: RetentionPolicy, settings: EvaluatorSettings) -> Self {
        Self { policy, settings }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    /// Short-circuits that need no cloud call
    fn precheck(&self, node: &dyn NodeHandle) -> Option<HoldReason> {
        if !node.is_provisioned() {
            return Some(HoldReason::NodeAbsent);
        }
        if self.policy.is_disabled() {
            return Some(HoldReason::RetentionDisabled);
        }
        if self.settings.disabled {
            return Some(HoldReason::EvaluationDisabled);
        }
        if !node.is_idle() {
            return Some(HoldReason::NotIdle);
        }
        None
    }

    /// Apply the decision rules to gathered facts
    pub fn decide(&self, facts: &TimingFacts) -> Decision {
        if facts.offline && facts.uptime < STARTUP_TIMEOUT {
            return Decision::NoAction(HoldReason::StartupGrace);
        }

        let idle_enabled = self.policy.idle_enabled();
        let idle_elapsed = facts.idle > self.policy.idle_timeout();

        if idle_enabled && facts.running < facts.idle {
            return Decision::NoAction(HoldReason::IdleExceedsRunning);
        }

        let cycle_enabled = self.policy.cycle_enabled();
        let remaining = cycle_remaining(facts.uptime);
        let cycle_elapsed = remaining <= self.policy.cycle_lead_time();

        let fired = match (idle_enabled, cycle_enabled) {
            (true, true) => idle_elapsed && cycle_elapsed,
            (true, false) => idle_elapsed,
            (false, true) => cycle_elapsed,
            (false, false) => false,
        };

        if !fired {
            return Decision::NoAction(HoldReason::ConditionsNotMet);
        }

        Decision::Terminate(TerminationReason {
            idle: idle_enabled.then_some(facts.idle),
            cycle_remaining: cycle_enabled.then_some(remaining),
        })
    }

    /// Gather facts from `node`, decide, and trigger its idle timeout at most
    /// once when the decision is to terminate.
    pub async fn evaluate(&self, node: &dyn NodeHandle) -> Decision {
        if let Some(reason) = self.precheck(node) {
            return Decision::NoAction(reason);
        }

        let uptime = match node.uptime().await {
            Ok(uptime) => uptime,
            Err(e) => {
                debug!(
                    node = %node.name(),
                    error = %e,
                    transient = e.is_transient(),
                    "Failed to fetch uptime, will retry next check"
                );
                return Decision::NoAction(HoldReason::UptimeUnavailable);
            }
        };

        let facts = TimingFacts {
            uptime,
            running: node.running_duration(),
            idle: node.idle_duration(),
            offline: node.is_offline(),
        };

        let decision = self.decide(&facts);
        let Decision::Terminate(reason) = decision else {
            return decision;
        };

        // The node may have been removed while uptime was in flight
        if !node.is_provisioned() {
            return Decision::NoAction(HoldReason::NodeAbsent);
        }

        let boundary = reason
            .cycle_remaining
            .map(|remaining| add_duration(reaper_util::now(), remaining));
        info!(
            node = %node.name(),
            idle_minutes = reason.idle.map(whole_minutes),
            cycle_remaining_minutes = reason.cycle_remaining.map(whole_minutes),
            billing_boundary = ?boundary,
            "Idle timeout of {} {}",
            node.name(),
            reason
        );

        if let Err(e) = node.trigger_idle_timeout().await {
            warn!(node = %node.name(), error = %e, "Idle timeout request failed");
        }

        decision
    }
}
