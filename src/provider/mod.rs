//! Network provider seam.
//!
//! Everything RegionMesh does to the outside world goes through
//! [`NetworkProvider`]: region networks, peering links, route tables,
//! resolver rules and rule associations. Lookups are by deterministic name so
//! every stage can find what an earlier (possibly interrupted) build created.
//!
//! The crate ships [`SimulatedProvider`], a file-backed implementation used by
//! the command line and the tests.

pub mod simulated;

pub use simulated::{AcceptanceBehavior, SimulatedProvider, SimulatedState};

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-reported status of a peering link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStatus {
    InitiatingRequest,
    PendingAcceptance,
    Provisioning,
    Active,
    Rejected,
    Failed,
    Expired,
    Deleted,
}

impl LinkStatus {
    /// States a link never leaves on its own
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            LinkStatus::Rejected | LinkStatus::Failed | LinkStatus::Expired | LinkStatus::Deleted
        )
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkStatus::InitiatingRequest => "initiating-request",
            LinkStatus::PendingAcceptance => "pending-acceptance",
            LinkStatus::Provisioning => "provisioning",
            LinkStatus::Active => "active",
            LinkStatus::Rejected => "rejected",
            LinkStatus::Failed => "failed",
            LinkStatus::Expired => "expired",
            LinkStatus::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Which end of a link an option applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSide {
    Requester,
    Accepter,
}

/// Request to create one region network
#[derive(Debug, Clone)]
pub struct NetworkRequest {
    pub name: String,
    pub region: String,
    pub cidr: Ipv4Net,
    pub public_subnet: Ipv4Net,
    pub private_subnets: Vec<Ipv4Net>,
}

/// Handles of a region network, as consumed by cluster builders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub network_id: String,
    pub name: String,
    pub region: String,
    pub cidr: Ipv4Net,
    /// Route table of the private subnets; peering routes go here
    pub route_table_id: String,
    pub public_subnet_id: String,
    pub private_subnet_ids: Vec<String>,
}

/// Request to create a peering link; the requester side lives in `requester_region`
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub name: String,
    pub requester_region: String,
    pub requester_network_id: String,
    pub accepter_region: String,
    pub accepter_network_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub link_id: String,
    pub name: String,
    pub requester_region: String,
    pub requester_network_id: String,
    pub accepter_region: String,
    pub accepter_network_id: String,
    pub status: LinkStatus,
    pub requester_dns_resolution: bool,
    pub accepter_dns_resolution: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub destination: Ipv4Net,
    /// Link id, gateway id or `local`
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct ResolverRuleRequest {
    pub name: String,
    /// Region whose private zone the rule resolves
    pub region: String,
    pub domain: String,
    pub target_network_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverRule {
    pub rule_id: String,
    pub name: String,
    pub region: String,
    pub domain: String,
    pub target_network_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAssociation {
    pub association_id: String,
    pub rule_id: String,
    pub network_id: String,
}

/// Errors reported by a network provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{operation} rejected by provider: {message}")]
    Rejected { operation: String, message: String },

    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Operations RegionMesh needs from a cloud network API.
///
/// Implementations must be safe to call from several edge workers at once.
/// Lookups return `Ok(None)` (or an empty list) for missing resources; only
/// mutations of missing resources fail with [`ProviderError::NotFound`].
pub trait NetworkProvider: Send + Sync {
    fn find_network(&self, name: &str) -> Result<Option<NetworkHandle>, ProviderError>;
    fn create_network(&self, request: &NetworkRequest) -> Result<NetworkHandle, ProviderError>;
    fn delete_network(&self, network_id: &str) -> Result<(), ProviderError>;

    fn find_link(&self, name: &str) -> Result<Option<LinkRecord>, ProviderError>;
    /// Links whose name starts with `prefix`
    fn list_links(&self, prefix: &str) -> Result<Vec<LinkRecord>, ProviderError>;
    fn create_link(&self, request: &LinkRequest) -> Result<LinkRecord, ProviderError>;
    /// Accept a link from its accepter region; returns the status right after acceptance
    fn accept_link(&self, link_id: &str) -> Result<LinkStatus, ProviderError>;
    fn describe_link(&self, link_id: &str) -> Result<LinkStatus, ProviderError>;
    /// Returns true when the option changed
    fn set_link_dns_resolution(
        &self,
        link_id: &str,
        side: LinkSide,
        enabled: bool,
    ) -> Result<bool, ProviderError>;
    fn delete_link(&self, link_id: &str) -> Result<(), ProviderError>;

    fn list_routes(&self, route_table_id: &str) -> Result<Vec<RouteRecord>, ProviderError>;
    fn create_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &str,
    ) -> Result<RouteRecord, ProviderError>;
    fn delete_route(&self, route_table_id: &str, destination: Ipv4Net) -> Result<(), ProviderError>;

    fn find_resolver_rule(&self, name: &str) -> Result<Option<ResolverRule>, ProviderError>;
    fn create_resolver_rule(&self, request: &ResolverRuleRequest) -> Result<ResolverRule, ProviderError>;
    fn delete_resolver_rule(&self, rule_id: &str) -> Result<(), ProviderError>;
    fn list_rule_associations(&self, network_id: &str) -> Result<Vec<RuleAssociation>, ProviderError>;
    fn associate_rule(&self, rule_id: &str, network_id: &str) -> Result<RuleAssociation, ProviderError>;
    fn disassociate_rule(&self, association_id: &str) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_status_terminal_states() {
        assert!(LinkStatus::Rejected.is_terminal_failure());
        assert!(LinkStatus::Expired.is_terminal_failure());
        assert!(!LinkStatus::PendingAcceptance.is_terminal_failure());
        assert!(!LinkStatus::Active.is_terminal_failure());
    }

    #[test]
    fn test_link_status_serializes_like_display() {
        for status in [LinkStatus::PendingAcceptance, LinkStatus::InitiatingRequest, LinkStatus::Active] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }
}
