//! Retention evaluation for reaper
//!
//! This crate decides when an idle cloud node should be shut down:
//! - Pure termination decision from a node's timing facts
//! - Non-blocking guard so checks for one node never overlap
//! - Per-node retention strategy with counters
//! - Tick scheduler driving every registered node

mod evaluator;
mod guard;
mod scheduler;
mod stats;
mod strategy;

pub use evaluator::*;
pub use guard::*;
pub use scheduler::*;
pub use stats::*;
pub use strategy::*;
