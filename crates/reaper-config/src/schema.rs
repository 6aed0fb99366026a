//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Evaluator-wide settings
    #[serde(default)]
    pub evaluator: RawEvaluatorConfig,

    /// Managed nodes
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

/// Evaluator-wide settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEvaluatorConfig {
    /// Turn off every retention evaluation without touching node definitions
    #[serde(default)]
    pub disabled: bool,

    /// How often the scheduler re-checks each node (default: 60)
    pub tick_interval_seconds: Option<u64>,
}

/// Raw node definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawNode {
    /// Unique stable ID
    pub id: String,

    /// Display label
    pub label: Option<String>,

    /// Minutes of idleness before termination; empty or absent disables
    pub idle_termination_minutes: Option<RawMinutes>,

    /// Minutes before the billing boundary to terminate; empty or absent disables
    pub cycle_termination_minutes: Option<RawMinutes>,
}

/// Minutes value as written in the file.
///
/// Node definitions historically stored these as free text, so both
/// `idle_termination_minutes = "15"` and `idle_termination_minutes = 15`
/// are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawMinutes {
    Number(i64),
    Text(String),
}

impl RawMinutes {
    /// Text form handed to the retention policy parser
    pub fn to_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_node_entries() {
        let toml_str = r#"
            config_version = 1

            [[nodes]]
            id = "agent-1"
            label = "Build agent"
            idle_termination_minutes = "15"
            cycle_termination_minutes = 5

            [[nodes]]
            id = "agent-2"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(
            config.nodes[0].idle_termination_minutes,
            Some(RawMinutes::Text("15".into()))
        );
        assert_eq!(
            config.nodes[0].cycle_termination_minutes,
            Some(RawMinutes::Number(5))
        );
        assert!(config.nodes[1].idle_termination_minutes.is_none());
        assert!(!config.evaluator.disabled);
    }

    #[test]
    fn parse_evaluator_section() {
        let toml_str = r#"
            config_version = 1

            [evaluator]
            disabled = true
            tick_interval_seconds = 30
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert!(config.evaluator.disabled);
        assert_eq!(config.evaluator.tick_interval_seconds, Some(30));
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn raw_minutes_text_form() {
        assert_eq!(RawMinutes::Number(-10).to_text(), "-10");
        assert_eq!(RawMinutes::Text("abc".into()).to_text(), "abc");
    }
}
