//! Mock node handle for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::{NodeError, NodeHandle, NodeResult};

/// Failure a mock operation should report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    CloudApi(String),
    Interrupted,
}

impl MockFailure {
    fn to_error(&self) -> NodeError {
        match self {
            Self::CloudApi(msg) => NodeError::CloudApi(msg.clone()),
            Self::Interrupted => NodeError::Interrupted,
        }
    }
}

/// Observable facts of a mock node
#[derive(Debug, Clone)]
pub struct MockFacts {
    pub idle: bool,
    pub offline: bool,
    pub provisioned: bool,
    pub uptime: Duration,
    pub running: Duration,
    pub idle_for: Duration,
}

impl Default for MockFacts {
    fn default() -> Self {
        Self {
            idle: true,
            offline: false,
            provisioned: true,
            uptime: Duration::ZERO,
            running: Duration::ZERO,
            idle_for: Duration::ZERO,
        }
    }
}

/// Mock node handle for unit/integration testing
pub struct MockNode {
    name: String,
    facts: Mutex<MockFacts>,
    uptime_gate: Mutex<Option<Arc<Notify>>>,
    uptime_entered: Notify,
    uptime_calls: AtomicUsize,
    idle_timeouts: AtomicUsize,
    connects: AtomicUsize,

    /// Configure uptime to fail
    pub fail_uptime: Mutex<Option<MockFailure>>,

    /// Configure idle timeout to fail
    pub fail_idle_timeout: Mutex<Option<MockFailure>>,

    /// Configure connect to fail
    pub fail_connect: Mutex<Option<MockFailure>>,

    /// Mark the node as deprovisioned as soon as uptime has been fetched
    pub deprovision_after_uptime: Mutex<bool>,
}

impl MockNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            facts: Mutex::new(MockFacts::default()),
            uptime_gate: Mutex::new(None),
            uptime_entered: Notify::new(),
            uptime_calls: AtomicUsize::new(0),
            idle_timeouts: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            fail_uptime: Mutex::new(None),
            fail_idle_timeout: Mutex::new(None),
            fail_connect: Mutex::new(None),
            deprovision_after_uptime: Mutex::new(false),
        }
    }

    /// Mock node reporting the given facts
    pub fn with_facts(name: impl Into<String>, facts: MockFacts) -> Self {
        let node = Self::new(name);
        *node.facts.lock().unwrap() = facts;
        node
    }

    /// Update the node's facts in place
    pub fn update_facts(&self, f: impl FnOnce(&mut MockFacts)) {
        f(&mut self.facts.lock().unwrap());
    }

    pub fn facts(&self) -> MockFacts {
        self.facts.lock().unwrap().clone()
    }

    /// Hold every `uptime()` call open until `gate` is notified
    pub fn hold_uptime(&self, gate: Arc<Notify>) {
        *self.uptime_gate.lock().unwrap() = Some(gate);
    }

    /// Wait until an `uptime()` call has started
    pub async fn uptime_entered(&self) {
        self.uptime_entered.notified().await;
    }

    pub fn uptime_calls(&self) -> usize {
        self.uptime_calls.load(Ordering::SeqCst)
    }

    pub fn idle_timeouts(&self) -> usize {
        self.idle_timeouts.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeHandle for MockNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idle(&self) -> bool {
        self.facts.lock().unwrap().idle
    }

    fn is_offline(&self) -> bool {
        self.facts.lock().unwrap().offline
    }

    fn is_provisioned(&self) -> bool {
        self.facts.lock().unwrap().provisioned
    }

    async fn uptime(&self) -> NodeResult<Duration> {
        self.uptime_calls.fetch_add(1, Ordering::SeqCst);
        self.uptime_entered.notify_one();

        let gate = self.uptime_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(failure) = self.fail_uptime.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }

        let mut facts = self.facts.lock().unwrap();
        if *self.deprovision_after_uptime.lock().unwrap() {
            facts.provisioned = false;
        }
        Ok(facts.uptime)
    }

    fn running_duration(&self) -> Duration {
        self.facts.lock().unwrap().running
    }

    fn idle_duration(&self) -> Duration {
        self.facts.lock().unwrap().idle_for
    }

    async fn trigger_idle_timeout(&self) -> NodeResult<()> {
        self.idle_timeouts.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.fail_idle_timeout.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }
        Ok(())
    }

    async fn connect(&self, _force_reconnect: bool) -> NodeResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.fail_connect.lock().unwrap().as_ref() {
            return Err(failure.to_error());
        }
        Ok(())
    }
}
