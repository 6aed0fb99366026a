//! Shared utilities for reaper
//!
//! This crate provides:
//! - ID types (NodeId)
//! - Time utilities (minute conversions, wall-clock now, duration formatting)
//! - Default paths for the configuration file

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
