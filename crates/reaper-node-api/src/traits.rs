//! Node handle traits

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from node handle operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Cloud API error: {0}")]
    CloudApi(String),

    #[error("Operation interrupted")]
    Interrupted,

    #[error("Node is no longer provisioned")]
    NotProvisioned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NodeError {
    /// Whether retrying on a later tick can reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CloudApi(_) | Self::Interrupted | Self::Io(_))
    }
}

pub type NodeResult<T> = Result<T, NodeError>;

/// Read-mostly view of one compute node, implemented by the provisioning layer.
///
/// Only `uptime` reaches out to the cloud provider and may fail; the other
/// facts are tracked locally by the implementor and are always available.
#[async_trait]
pub trait NodeHandle: Send + Sync {
    /// Display name used in diagnostics
    fn name(&self) -> &str;

    /// Whether the node currently has no work assigned
    fn is_idle(&self) -> bool;

    /// Whether the node is unreachable
    fn is_offline(&self) -> bool;

    /// Whether the node record still exists
    fn is_provisioned(&self) -> bool;

    /// Time since the underlying instance was launched
    async fn uptime(&self) -> NodeResult<Duration>;

    /// Time since the node entered the provider's running state
    fn running_duration(&self) -> Duration;

    /// Time since the node last had work assigned
    fn idle_duration(&self) -> Duration;

    /// Ask the owner to tear the node down after an idle timeout
    async fn trigger_idle_timeout(&self) -> NodeResult<()>;

    /// Try to bring the node online
    async fn connect(&self, force_reconnect: bool) -> NodeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(NodeError::CloudApi("throttled".into()).is_transient());
        assert!(NodeError::Interrupted.is_transient());
        assert!(NodeError::Io(std::io::Error::other("reset")).is_transient());
        assert!(!NodeError::NotProvisioned.is_transient());
        assert!(!NodeError::Internal("bug".into()).is_transient());
    }
}
