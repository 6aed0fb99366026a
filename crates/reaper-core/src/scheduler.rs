//! Tick scheduler
//!
//! Invokes every registered node's strategy once per tick. Each check runs on
//! its own task, so a node whose cloud call hangs never delays the others;
//! its next tick is simply skipped by the evaluation guard.

use reaper_config::{DEFAULT_TICK_INTERVAL, Policy};
use reaper_node_api::NodeHandle;
use reaper_util::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::RetentionStrategy;

struct ScheduledNode {
    id: NodeId,
    strategy: Arc<RetentionStrategy>,
    handle: Arc<dyn NodeHandle>,
}

/// Periodic driver for a set of node strategies
#[derive(Default)]
pub struct Scheduler {
    nodes: Vec<ScheduledNode>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build strategies for every configured node that has a handle.
    ///
    /// Configured nodes without a handle are skipped with a warning.
    pub fn from_policy(policy: &Policy, handles: &HashMap<NodeId, Arc<dyn NodeHandle>>) -> Self {
        let mut scheduler = Self::new();
        for entry in &policy.nodes {
            match handles.get(&entry.id) {
                Some(handle) => scheduler.register(
                    entry.id.clone(),
                    Arc::new(RetentionStrategy::from_entry(entry, policy.evaluator)),
                    handle.clone(),
                ),
                None => warn!(node = %entry.id, "No handle for configured node, skipping"),
            }
        }
        scheduler
    }

    /// Add a node; a node registered twice replaces the earlier registration
    pub fn register(
        &mut self,
        id: NodeId,
        strategy: Arc<RetentionStrategy>,
        handle: Arc<dyn NodeHandle>,
    ) {
        self.nodes.retain(|n| n.id != id);
        debug!(node = %id, "Node registered");
        self.nodes.push(ScheduledNode {
            id,
            strategy,
            handle,
        });
    }

    /// Remove a node; returns whether it was registered
    pub fn unregister(&mut self, id: &NodeId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| &n.id != id);
        self.nodes.len() != before
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn strategy(&self, id: &NodeId) -> Option<&Arc<RetentionStrategy>> {
        self.nodes.iter().find(|n| &n.id == id).map(|n| &n.strategy)
    }

    /// Spawn one check per node and return without waiting for them
    pub fn tick(&self) -> Vec<JoinHandle<u64>> {
        self.nodes
            .iter()
            .map(|node| {
                let strategy = node.strategy.clone();
                let handle = node.handle.clone();
                tokio::spawn(async move { strategy.check(handle.as_ref()).await })
            })
            .collect()
    }

    /// Call `start` on every node's strategy
    pub async fn start_all(&self) {
        for node in &self.nodes {
            node.strategy.start(node.handle.as_ref()).await;
        }
    }

    /// Tick every `interval` until `shutdown` changes.
    ///
    /// A zero interval falls back to [`DEFAULT_TICK_INTERVAL`].
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let interval = if interval.is_zero() {
            warn!(
                default_secs = DEFAULT_TICK_INTERVAL.as_secs(),
                "Zero tick interval, using default"
            );
            DEFAULT_TICK_INTERVAL
        } else {
            interval
        };

        info!(
            interval_secs = interval.as_secs(),
            node_count = self.nodes.len(),
            "Retention scheduler started"
        );

        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let spawned = self.tick().len();
                    debug!(checks = spawned, "Retention tick");
                }
                _ = shutdown.changed() => {
                    info!("Retention scheduler shutting down");
                    break;
                }
            }
        }

        for node in &self.nodes {
            debug!(
                node = %node.id,
                stats = %node.strategy.stats().summary(),
                "Final evaluation stats"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaper_config::{EvaluatorSettings, RetentionPolicy, parse_config};
    use reaper_node_api::{MockFacts, MockNode};
    use reaper_util::minutes;
    use tokio::sync::Notify;

    fn idle_node(name: &str, idle_min: u64) -> Arc<MockNode> {
        Arc::new(MockNode::with_facts(
            name,
            MockFacts {
                uptime: minutes(120),
                running: minutes(120),
                idle_for: minutes(idle_min),
                ..Default::default()
            },
        ))
    }

    fn strategy(idle: u32, cycle: u32) -> Arc<RetentionStrategy> {
        Arc::new(RetentionStrategy::new(
            RetentionPolicy::from_minutes(idle, cycle),
            EvaluatorSettings::default(),
        ))
    }

    #[tokio::test]
    async fn tick_checks_every_node() {
        let busy_long = idle_node("a", 20);
        let idle_short = idle_node("b", 5);

        let mut scheduler = Scheduler::new();
        scheduler.register(NodeId::new("a"), strategy(15, 0), busy_long.clone());
        scheduler.register(NodeId::new("b"), strategy(15, 0), idle_short.clone());

        for handle in scheduler.tick() {
            assert_eq!(handle.await.unwrap(), 1);
        }

        assert_eq!(busy_long.idle_timeouts(), 1);
        assert_eq!(idle_short.idle_timeouts(), 0);
    }

    #[tokio::test]
    async fn stuck_node_does_not_block_others() {
        let stuck = idle_node("stuck", 20);
        let gate = Arc::new(Notify::new());
        stuck.hold_uptime(gate.clone());
        let healthy = idle_node("healthy", 20);

        let mut scheduler = Scheduler::new();
        scheduler.register(NodeId::new("stuck"), strategy(15, 0), stuck.clone());
        scheduler.register(NodeId::new("healthy"), strategy(15, 0), healthy.clone());

        let mut first = scheduler.tick();
        let healthy_check = first.pop().unwrap();
        healthy_check.await.unwrap();
        assert_eq!(healthy.idle_timeouts(), 1);

        // Second tick while the stuck node is still in flight
        stuck.uptime_entered().await;
        for handle in scheduler.tick() {
            handle.await.unwrap();
        }
        let stats = scheduler.strategy(&NodeId::new("stuck")).unwrap().stats();
        assert_eq!(stats.skipped, 1);

        gate.notify_one();
        first.pop().unwrap().await.unwrap();
        assert_eq!(stuck.idle_timeouts(), 1);
    }

    #[tokio::test]
    async fn register_replaces_and_unregister_removes() {
        let mut scheduler = Scheduler::new();
        scheduler.register(NodeId::new("a"), strategy(15, 0), idle_node("a", 0));
        scheduler.register(NodeId::new("a"), strategy(30, 0), idle_node("a", 0));

        assert_eq!(scheduler.len(), 1);
        assert_eq!(
            *scheduler.strategy(&NodeId::new("a")).unwrap().policy(),
            RetentionPolicy::from_minutes(30, 0)
        );

        assert!(scheduler.unregister(&NodeId::new("a")));
        assert!(!scheduler.unregister(&NodeId::new("a")));
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn from_policy_skips_nodes_without_handles() {
        let policy = parse_config(
            r#"
            config_version = 1

            [[nodes]]
            id = "a"
            idle_termination_minutes = "15"

            [[nodes]]
            id = "missing"
            idle_termination_minutes = "15"
            "#,
        )
        .unwrap();

        let mut handles: HashMap<NodeId, Arc<dyn NodeHandle>> = HashMap::new();
        handles.insert(NodeId::new("a"), idle_node("a", 20));

        let scheduler = Scheduler::from_policy(&policy, &handles);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.strategy(&NodeId::new("missing")).is_none());
    }

    #[tokio::test]
    async fn start_all_connects_every_node() {
        let a = idle_node("a", 0);
        let b = idle_node("b", 0);

        let mut scheduler = Scheduler::new();
        scheduler.register(NodeId::new("a"), strategy(15, 0), a.clone());
        scheduler.register(NodeId::new("b"), strategy(15, 0), b.clone());
        scheduler.start_all().await;

        assert_eq!(a.connects(), 1);
        assert_eq!(b.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_until_shutdown() {
        let node = idle_node("a", 20);
        let mut scheduler = Scheduler::new();
        scheduler.register(NodeId::new("a"), strategy(15, 0), node.clone());

        let (tx, rx) = watch::channel(false);
        let runner = tokio::spawn(async move {
            scheduler.run(Duration::from_secs(60), rx).await;
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        runner.await.unwrap();

        // Ticks at 0s, 60s and 120s
        assert_eq!(node.uptime_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_uses_default() {
        let node = idle_node("a", 20);
        let mut scheduler = Scheduler::new();
        scheduler.register(NodeId::new("a"), strategy(15, 0), node.clone());

        let (tx, rx) = watch::channel(false);
        let runner = tokio::spawn(async move {
            scheduler.run(Duration::ZERO, rx).await;
        });

        tokio::time::sleep(DEFAULT_TICK_INTERVAL + Duration::from_secs(30)).await;
        tx.send(true).unwrap();
        runner.await.unwrap();

        // Ticks at 0s and one default interval later
        assert_eq!(node.uptime_calls(), 2);
    }
}
