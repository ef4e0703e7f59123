//! Network topology module.
//!
//! This module contains the region and edge types and the selector that turns
//! a region list into the set of links a topology requires.

pub mod types;
pub mod connections;

// Re-export key types and functions for easier access
pub use types::{Edge, ProviderContext, Region, TopologyMode};
pub use connections::{all_pairs, check_link_names, select_edges};
