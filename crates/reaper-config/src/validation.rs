//! Configuration validation

use crate::schema::{RawConfig, RawNode};
use reaper_util::NodeId;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Node '{node_id}': {message}")]
    NodeError { node_id: String, message: String },

    #[error("Duplicate node ID: {0}")]
    DuplicateNodeId(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration.
///
/// Termination-minute fields are never rejected here; malformed values are
/// normalized when the policy is built.
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.evaluator.tick_interval_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "tick_interval_seconds must be greater than 0".into(),
        ));
    }

    // Check for duplicate node IDs
    let mut seen_ids = HashSet::new();
    for node in &config.nodes {
        if !seen_ids.insert(node.id.trim()) {
            errors.push(ValidationError::DuplicateNodeId(node.id.clone()));
        }
    }

    for node in &config.nodes {
        errors.extend(validate_node(node));
    }

    errors
}

fn validate_node(node: &RawNode) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if NodeId::new(node.id.as_str()).is_empty() {
        errors.push(ValidationError::NodeError {
            node_id: node.id.clone(),
            message: "id cannot be empty".into(),
        });
    }

    if let Some(label) = &node.label
        && label.trim().is_empty()
    {
        errors.push(ValidationError::NodeError {
            node_id: node.id.clone(),
            message: "label cannot be blank when set".into(),
        });
    }

    errors
}
