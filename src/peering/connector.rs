//! Peering connector.
//!
//! Creates or reuses exactly one link per edge. The requester side of the link
//! lives in the edge's smaller region id, the accepter side in the larger one.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::handshake::{AcceptancePolicy, Handshake, LinkState};
use crate::error::NetworkError;
use crate::provider::{LinkRecord, LinkRequest, LinkStatus, NetworkHandle, NetworkProvider};
use crate::topology::Edge;

/// An active link backing one edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub link_id: String,
    pub name: String,
    pub edge: Edge,
    pub state: LinkState,
    /// False when an already-active link was reused
    pub created: bool,
}

pub struct PeeringConnector<'p, P: NetworkProvider + ?Sized> {
    provider: &'p P,
    group: &'p str,
    policy: AcceptancePolicy,
}

impl<'p, P: NetworkProvider + ?Sized> PeeringConnector<'p, P> {
    pub fn new(provider: &'p P, group: &'p str, policy: AcceptancePolicy) -> Self {
        PeeringConnector { provider, group, policy }
    }

    /// Bring the link for `edge` to the active state
    ///
    /// # Arguments
    /// * `edge` - The edge to connect
    /// * `requester` - Network of `edge.a()`
    /// * `accepter` - Network of `edge.b()`
    ///
    /// # Returns
    /// The active link. Never returns a link that is not active.
    pub fn connect(
        &self,
        edge: &Edge,
        requester: &NetworkHandle,
        accepter: &NetworkHandle,
    ) -> Result<Link, NetworkError> {
        let name = edge.link_name(self.group);
        let existing = self
            .provider
            .find_link(&name)
            .map_err(|e| NetworkError::provider(edge.to_string(), e))?;

        let (record, created) = match existing {
            Some(record) if record.status == LinkStatus::Active => {
                info!("Reusing active link {} for {}", record.link_id, edge);
                return Ok(Link {
                    link_id: record.link_id,
                    name,
                    edge: edge.clone(),
                    state: LinkState::Active,
                    created: false,
                });
            }
            Some(record) if record.status.is_terminal_failure() => {
                // A failed link is left for the operator; no retry within a build
                return Err(NetworkError::Peering {
                    edge: edge.clone(),
                    link_id: record.link_id,
                    status: record.status,
                });
            }
            Some(record) => {
                warn!(
                    "Link {} for {} found in state '{}', resuming acceptance",
                    record.link_id, edge, record.status
                );
                (record, false)
            }
            None => {
                let request = LinkRequest {
                    name: name.clone(),
                    requester_region: edge.a().to_string(),
                    requester_network_id: requester.network_id.clone(),
                    accepter_region: edge.b().to_string(),
                    accepter_network_id: accepter.network_id.clone(),
                };
                let record = self
                    .provider
                    .create_link(&request)
                    .map_err(|e| NetworkError::provider(edge.to_string(), e))?;
                info!(
                    "Requested link {} from {} to {}",
                    record.link_id,
                    edge.a(),
                    edge.b()
                );
                (record, true)
            }
        };

        let status = self.accept(edge, &record)?;
        let mut handshake = Handshake::new(edge, &record.link_id, status);
        handshake.wait(self.provider, &self.policy)?;

        info!(
            "Link {} for {} is active after {} poll(s)",
            record.link_id,
            edge,
            handshake.polls()
        );

        Ok(Link {
            link_id: record.link_id.clone(),
            name,
            edge: edge.clone(),
            state: handshake.state(),
            created,
        })
    }

    fn accept(&self, edge: &Edge, record: &LinkRecord) -> Result<LinkStatus, NetworkError> {
        match record.status {
            LinkStatus::InitiatingRequest | LinkStatus::PendingAcceptance => self
                .provider
                .accept_link(&record.link_id)
                .map_err(|e| NetworkError::provider(edge.to_string(), e)),
            // Already accepted, only waiting on the provider
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AcceptanceBehavior, NetworkRequest, SimulatedProvider};
    use std::time::Duration;

    fn fast_policy() -> AcceptancePolicy {
        AcceptancePolicy {
            timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn network(provider: &SimulatedProvider, region: &str, cidr: &str) -> NetworkHandle {
        let cidr = cidr.parse().unwrap();
        let layout = crate::ip::calculate_subnets(cidr, 1).unwrap();
        provider
            .create_network(&NetworkRequest {
                name: format!("test-{}", region),
                region: region.to_string(),
                cidr,
                public_subnet: layout.public,
                private_subnets: layout.private,
            })
            .unwrap()
    }

    fn setup(provider: &SimulatedProvider) -> (Edge, NetworkHandle, NetworkHandle) {
        let a = network(provider, "us-east-1", "10.1.0.0/16");
        let b = network(provider, "us-west-2", "10.0.0.0/16");
        (Edge::new("us-west-2", "us-east-1").unwrap(), a, b)
    }

    #[test]
    fn test_creates_then_reuses_link() {
        let provider = SimulatedProvider::new();
        let (edge, a, b) = setup(&provider);
        let connector = PeeringConnector::new(&provider, "test", fast_policy());

        let first = connector.connect(&edge, &a, &b).unwrap();
        assert!(first.created);
        assert_eq!(first.state, LinkState::Active);
        assert_eq!(first.name, "test-peering-us-east-1--us-west-2");

        let second = connector.connect(&edge, &a, &b).unwrap();
        assert!(!second.created);
        assert_eq!(second.link_id, first.link_id);
        assert_eq!(provider.snapshot().links.len(), 1);

        let record = provider.snapshot().link_by_name(&first.name).cloned().unwrap();
        assert_eq!(record.requester_region, "us-east-1");
        assert_eq!(record.accepter_region, "us-west-2");
    }

    #[test]
    fn test_polls_until_active() {
        let provider = SimulatedProvider::new().with_default_behavior(AcceptanceBehavior::AfterPolls(3));
        let (edge, a, b) = setup(&provider);
        let connector = PeeringConnector::new(
            &provider,
            "test",
            AcceptancePolicy {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(1),
            },
        );

        let link = connector.connect(&edge, &a, &b).unwrap();
        assert_eq!(link.state, LinkState::Active);
    }

    #[test]
    fn test_rejected_link_fails_without_retry() {
        let provider = SimulatedProvider::new();
        let (edge, a, b) = setup(&provider);
        provider.set_behavior(&edge.link_name("test"), AcceptanceBehavior::Reject);
        let connector = PeeringConnector::new(&provider, "test", fast_policy());

        let err = connector.connect(&edge, &a, &b).unwrap_err();
        assert!(matches!(err, NetworkError::Peering { status: LinkStatus::Rejected, .. }));

        // The rejected link is reported again, never replaced
        let err = connector.connect(&edge, &a, &b).unwrap_err();
        assert!(matches!(err, NetworkError::Peering { .. }));
        assert_eq!(provider.snapshot().links.len(), 1);
    }

    #[test]
    fn test_stuck_link_times_out() {
        let provider = SimulatedProvider::new().with_default_behavior(AcceptanceBehavior::NeverAccept);
        let (edge, a, b) = setup(&provider);
        let connector = PeeringConnector::new(&provider, "test", fast_policy());

        let err = connector.connect(&edge, &a, &b).unwrap_err();
        match err {
            NetworkError::PeeringTimeout { edge: failed, status, waited, .. } => {
                assert_eq!(failed, edge);
                assert_eq!(status, LinkStatus::PendingAcceptance);
                assert!(waited >= Duration::from_millis(50));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_resumes_pending_link() {
        let provider = SimulatedProvider::new().with_default_behavior(AcceptanceBehavior::NeverAccept);
        let (edge, a, b) = setup(&provider);
        let connector = PeeringConnector::new(&provider, "test", fast_policy());
        assert!(connector.connect(&edge, &a, &b).is_err());

        // The peer starts accepting; the same link is picked up again
        provider.set_behavior(&edge.link_name("test"), AcceptanceBehavior::Immediate);
        let link = connector.connect(&edge, &a, &b).unwrap();
        assert!(!link.created);
        assert_eq!(link.state, LinkState::Active);
        assert_eq!(provider.snapshot().links.len(), 1);
    }
}
