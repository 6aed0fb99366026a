//! Node handle trait interfaces for reaper
//!
//! This crate defines the boundary between the retention core and whatever
//! owns the compute nodes (a cloud provider client, a provisioning service).
//! It contains no cloud code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
