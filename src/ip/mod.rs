//! Address block allocation and management module.
//!
//! This module derives region address blocks, lays out per-region subnets
//! and detects overlapping blocks across a group.

pub mod registry;
pub mod allocator;

// Re-export commonly used types
pub use registry::{blocks_overlap, CidrRegistry};
pub use allocator::{calculate_subnets, region_to_cidr, SubnetError, SubnetLayout};
