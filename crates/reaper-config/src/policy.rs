//! Validated policy structures

use crate::schema::{RawConfig, RawEvaluatorConfig, RawMinutes, RawNode};
use reaper_util::{NodeId, minutes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Minutes used when a termination field holds text that is not a number
pub const DEFAULT_TERMINATION_MINUTES: u32 = 15;

/// Length of one billing cycle of the cloud provider, in minutes
pub const BILLING_CYCLE_MINUTES: u32 = 60;

/// Default scheduler polling period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Validated configuration ready for use by the retention core
#[derive(Debug, Clone)]
pub struct Policy {
    /// Evaluator-wide settings
    pub evaluator: EvaluatorSettings,

    /// Managed nodes
    pub nodes: Vec<NodeEntry>,

    /// Normalizations applied while reading node retention fields
    pub notices: Vec<(NodeId, PolicyNotice)>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let mut notices = Vec::new();
        let nodes = raw
            .nodes
            .into_iter()
            .map(|n| {
                let (entry, node_notices) = NodeEntry::from_raw(n);
                notices.extend(node_notices.into_iter().map(|notice| (entry.id.clone(), notice)));
                entry
            })
            .collect();

        Self {
            evaluator: EvaluatorSettings::from_raw(raw.evaluator),
            nodes,
            notices,
        }
    }

    /// Get node by ID
    pub fn get_node(&self, id: &NodeId) -> Option<&NodeEntry> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

/// Evaluator-wide settings threaded into every retention strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorSettings {
    /// When set, no node is ever terminated by the retention evaluator
    pub disabled: bool,

    /// Scheduler polling period
    pub tick_interval: Duration,
}

impl EvaluatorSettings {
    fn from_raw(raw: RawEvaluatorConfig) -> Self {
        Self {
            disabled: raw.disabled,
            tick_interval: raw
                .tick_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TICK_INTERVAL),
        }
    }
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Validated node definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub id: NodeId,
    pub label: Option<String>,
    pub retention: RetentionPolicy,
}

impl NodeEntry {
    fn from_raw(raw: RawNode) -> (Self, Vec<PolicyNotice>) {
        let idle = raw.idle_termination_minutes.as_ref().map(RawMinutes::to_text);
        let cycle = raw.cycle_termination_minutes.as_ref().map(RawMinutes::to_text);
        let (retention, notices) = RetentionPolicy::parse(idle.as_deref(), cycle.as_deref());

        if retention.cycle_termination_minutes >= BILLING_CYCLE_MINUTES {
            warn!(
                node = %raw.id,
                cycle_termination_minutes = retention.cycle_termination_minutes,
                "Cycle lead time covers the whole billing cycle; node terminates as soon as it is idle"
            );
        }

        let entry = Self {
            id: NodeId::new(raw.id),
            label: raw.label,
            retention,
        };
        (entry, notices)
    }
}

/// Which retention field a notice refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyField {
    IdleTerminationMinutes,
    CycleTerminationMinutes,
}

impl fmt::Display for PolicyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdleTerminationMinutes => write!(f, "idle_termination_minutes"),
            Self::CycleTerminationMinutes => write!(f, "cycle_termination_minutes"),
        }
    }
}

/// A normalization applied while parsing retention fields.
///
/// Parsing never fails; these record what was substituted so hosts can
/// surface it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyNotice {
    /// Field held non-numeric text and fell back to the default
    Malformed { field: PolicyField, value: String },

    /// Negative idle minutes (legacy encoding) were moved to the cycle field
    LegacyNegativeIdle { minutes: u32 },
}

impl fmt::Display for PolicyNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { field, value } => write!(
                f,
                "malformed {} value '{}', using {} minutes",
                field, value, DEFAULT_TERMINATION_MINUTES
            ),
            Self::LegacyNegativeIdle { minutes } => write!(
                f,
                "negative idle_termination_minutes migrated to cycle_termination_minutes = {}",
                minutes
            ),
        }
    }
}

/// When an idle node should be torn down.
///
/// Both fields are whole minutes; zero disables the respective condition.
/// Unsigned storage keeps them non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Minutes of idleness before termination
    pub idle_termination_minutes: u32,

    /// Lead time before the next billing boundary during which termination may fire
    pub cycle_termination_minutes: u32,
}

impl RetentionPolicy {
    pub const fn from_minutes(idle_termination_minutes: u32, cycle_termination_minutes: u32) -> Self {
        Self {
            idle_termination_minutes,
            cycle_termination_minutes,
        }
    }

    /// Parse the free-text fields of a node definition, logging every
    /// normalization and discarding the notices.
    pub fn new(idle: Option<&str>, cycle: Option<&str>) -> Self {
        Self::parse(idle, cycle).0
    }

    /// Parse the free-text fields of a node definition.
    ///
    /// - absent or blank text disables the field
    /// - text that is not a 32-bit integer falls back to
    ///   [`DEFAULT_TERMINATION_MINUTES`]
    /// - a negative cycle value is stored as its magnitude
    /// - a negative idle value disables idle termination and its magnitude
    ///   replaces the cycle value
    pub fn parse(idle: Option<&str>, cycle: Option<&str>) -> (Self, Vec<PolicyNotice>) {
        let mut notices = Vec::new();
        let idle = parse_minutes(PolicyField::IdleTerminationMinutes, idle, &mut notices);
        let cycle = parse_minutes(PolicyField::CycleTerminationMinutes, cycle, &mut notices);

        let mut policy = Self {
            idle_termination_minutes: idle.unsigned_abs(),
            cycle_termination_minutes: cycle.unsigned_abs(),
        };

        if idle < 0 {
            policy.idle_termination_minutes = 0;
            policy.cycle_termination_minutes = idle.unsigned_abs();
            info!(
                idle_termination_minutes = idle,
                cycle_termination_minutes = policy.cycle_termination_minutes,
                "Migrated legacy negative idle termination value"
            );
            notices.push(PolicyNotice::LegacyNegativeIdle {
                minutes: policy.cycle_termination_minutes,
            });
        }

        (policy, notices)
    }

    pub fn idle_enabled(&self) -> bool {
        self.idle_termination_minutes > 0
    }

    pub fn cycle_enabled(&self) -> bool {
        self.cycle_termination_minutes > 0
    }

    /// Neither condition can ever fire
    pub fn is_disabled(&self) -> bool {
        !self.idle_enabled() && !self.cycle_enabled()
    }

    pub fn idle_timeout(&self) -> Duration {
        minutes(u64::from(self.idle_termination_minutes))
    }

    pub fn cycle_lead_time(&self) -> Duration {
        minutes(u64::from(self.cycle_termination_minutes))
    }
}

fn parse_minutes(field: PolicyField, raw: Option<&str>, notices: &mut Vec<PolicyNotice>) -> i32 {
    let text = match raw.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return 0,
    };

    match text.parse::<i32>() {
        Ok(value) => value,
        Err(_) => {
            info!(
                field = %field,
                value = %text,
                default = DEFAULT_TERMINATION_MINUTES,
                "Malformed termination minutes, using default"
            );
            notices.push(PolicyNotice::Malformed {
                field,
                value: text.to_string(),
            });
            DEFAULT_TERMINATION_MINUTES as i32
        }
    }
}
