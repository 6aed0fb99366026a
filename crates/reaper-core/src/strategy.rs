//! Retention strategy for one node
//!
//! Owns the node's immutable [`RetentionPolicy`] together with the
//! runtime-only pieces (evaluation guard, counters, evaluator settings).
//! Only the policy is persisted.

use reaper_config::{EvaluatorSettings, NodeEntry, RetentionPolicy};
use reaper_node_api::NodeHandle;
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::{
    Decision, EvaluationGuard, EvaluationStats, Evaluator, Outcome, RECHECK_INTERVAL_MINUTES,
    StatsSnapshot,
};

/// Retention strategy attached to one node
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RetentionStrategy {
    #[serde(flatten)]
    policy: RetentionPolicy,

    #[serde(skip)]
    settings: EvaluatorSettings,

    #[serde(skip)]
    guard: EvaluationGuard,

    #[serde(skip)]
    stats: EvaluationStats,
}

impl RetentionStrategy {
    pub fn new(policy: RetentionPolicy, settings: EvaluatorSettings) -> Self {
        Self {
            policy,
            settings,
            guard: EvaluationGuard::new(),
            stats: EvaluationStats::new(),
        }
    }

    /// Build the strategy for a configured node
    pub fn from_entry(entry: &NodeEntry, settings: EvaluatorSettings) -> Self {
        Self::new(entry.retention, settings)
    }

    /// Replace the evaluator settings, e.g. after deserializing a stored strategy
    pub fn with_settings(mut self, settings: EvaluatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether an evaluation is in flight right now
    pub fn is_evaluating(&self) -> bool {
        self.guard.is_held()
    }

    fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.policy, self.settings)
    }

    /// Evaluate `node` unless another evaluation of this strategy is running
    pub async fn evaluate_guarded(&self, node: &dyn NodeHandle) -> Outcome<Decision> {
        let evaluator = self.evaluator();
        let outcome = self.guard.run(|| evaluator.evaluate(node)).await;

        if outcome.is_skipped() {
            trace!(node = %node.name(), "Evaluation already in progress, skipping");
        }
        self.stats.record(&outcome);

        outcome
    }

    /// Periodic check entry point for the host scheduler.
    ///
    /// Returns the number of minutes until the node should be checked again.
    pub async fn check(&self, node: &dyn NodeHandle) -> u64 {
        self.evaluate_guarded(node).await;
        RECHECK_INTERVAL_MINUTES
    }

    /// Try to bring the node online as soon as possible
    pub async fn start(&self, node: &dyn NodeHandle) {
        info!(node = %node.name(), "Start requested");
        if let Err(e) = node.connect(false).await {
            warn!(node = %node.name(), error = %e, "Connect request failed");
        }
    }
}

impl Clone for RetentionStrategy {
    /// Copies the policy and settings; the clone gets its own fresh guard
    /// and counters.
    fn clone(&self) -> Self {
        Self::new(self.policy, self.settings)
    }
}
