//! Cross-region private name resolution.

pub mod fabric;

pub use fabric::{plan_associations, DnsRemoval, DnsResolutionFabric, DnsSummary, PlannedAssociation};
