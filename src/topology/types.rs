//! Topology type definitions.
//!
//! This file contains the region and edge values the topology selector
//! works on.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Re-export types from config to maintain API compatibility
pub use crate::config::TopologyMode;

/// Provider-side context of a region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderContext {
    /// Region name as understood by the provider
    pub provider_region: String,
    pub availability_zones: u8,
    /// Whether the region takes part in cross-region name resolution
    pub cross_region_dns: bool,
}

/// One participating regional network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub cidr: Ipv4Net,
    pub context: ProviderContext,
}

impl Region {
    /// Region with default provider context (3 AZs, DNS enabled)
    pub fn new(id: &str, cidr: Ipv4Net) -> Self {
        Region {
            id: id.to_string(),
            cidr,
            context: ProviderContext {
                provider_region: id.to_string(),
                availability_zones: crate::config::DEFAULT_AVAILABILITY_ZONES,
                cross_region_dns: true,
            },
        }
    }
}

/// Unordered pair of region ids, stored as a sorted tuple.
///
/// `a` is always the lexicographically smaller id, so `Edge::new(x, y)` and
/// `Edge::new(y, x)` are the same value and the derived ordering is the
/// lexicographic order on the sorted pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    a: String,
    b: String,
}

impl Edge {
    /// Canonicalise a pair. Returns `None` for a self-edge.
    pub fn new(x: &str, y: &str) -> Option<Edge> {
        match x.cmp(y) {
            std::cmp::Ordering::Less => Some(Edge { a: x.to_string(), b: y.to_string() }),
            std::cmp::Ordering::Greater => Some(Edge { a: y.to_string(), b: x.to_string() }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Requester side of the link (smaller id)
    pub fn a(&self) -> &str {
        &self.a
    }

    /// Accepter side of the link (larger id)
    pub fn b(&self) -> &str {
        &self.b
    }

    pub fn contains(&self, region: &str) -> bool {
        self.a == region || self.b == region
    }

    /// The other end of the edge, if `region` is one of its ends
    pub fn peer_of(&self, region: &str) -> Option<&str> {
        if self.a == region {
            Some(&self.b)
        } else if self.b == region {
            Some(&self.a)
        } else {
            None
        }
    }

    /// Deterministic link name within a group
    ///
    /// Ends are joined with `--`, which a valid region id never contains, so
    /// distinct edges of one group never share a name.
    pub fn link_name(&self, group: &str) -> String {
        format!("{}-peering-{}--{}", group, self.a, self.b)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_is_order_independent() {
        let forward = Edge::new("us-west-2", "eu-west-1").unwrap();
        let backward = Edge::new("eu-west-1", "us-west-2").unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward.a(), "eu-west-1");
        assert_eq!(forward.b(), "us-west-2");
        assert_eq!(forward.to_string(), "eu-west-1<->us-west-2");
    }

    #[test]
    fn test_self_edge_rejected() {
        assert!(Edge::new("us-east-1", "us-east-1").is_none());
    }

    #[test]
    fn test_peer_lookup() {
        let edge = Edge::new("us-east-1", "us-west-2").unwrap();
        assert!(edge.contains("us-east-1"));
        assert!(!edge.contains("eu-west-1"));
        assert_eq!(edge.peer_of("us-west-2"), Some("us-east-1"));
        assert_eq!(edge.peer_of("eu-west-1"), None);
    }

    #[test]
    fn test_link_name() {
        let edge = Edge::new("us-west-2", "us-east-1").unwrap();
        assert_eq!(edge.link_name("prod"), "prod-peering-us-east-1--us-west-2");
    }

    #[test]
    fn test_link_names_with_dashed_ids_stay_distinct() {
        let first = Edge::new("a-to", "b").unwrap();
        let second = Edge::new("a", "to-b").unwrap();
        assert_ne!(first.link_name("g"), second.link_name("g"));
    }
}
