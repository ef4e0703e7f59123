//! Route table reconciliation.
//!
//! Every active link (A, B) implies two routes: one in A's private route table
//! towards B's block and the symmetric one in B's table towards A's block,
//! both targeting the link.

use ipnet::Ipv4Net;
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ValidationError;
use crate::error::NetworkError;
use crate::ip::CidrRegistry;
use crate::peering::Link;
use crate::provider::{NetworkHandle, NetworkProvider, ProviderError};
use crate::topology::{Edge, Region};

/// Pairwise overlap check across all region blocks, O(n²)
pub fn check_cidr_overlap(regions: &[Region]) -> Result<(), ValidationError> {
    let mut registry = CidrRegistry::new();
    for region in regions {
        registry.register(region.cidr, &region.id)?;
    }
    Ok(())
}

/// A route a build would write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRoute {
    pub region: String,
    pub destination: Ipv4Net,
    pub via: Edge,
}

/// Routes implied by an edge set, both directions per edge, in edge order
pub fn planned_routes(edges: &[Edge], regions: &[Region]) -> Vec<PlannedRoute> {
    let cidr_of = |id: &str| regions.iter().find(|r| r.id == id).map(|r| r.cidr);

    let mut routes = Vec::with_capacity(edges.len() * 2);
    for edge in edges {
        for (from, to) in [(edge.a(), edge.b()), (edge.b(), edge.a())] {
            if let Some(destination) = cidr_of(to) {
                routes.push(PlannedRoute {
                    region: from.to_string(),
                    destination,
                    via: edge.clone(),
                });
            }
        }
    }
    routes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Created,
    /// An identical entry was already present
    Unchanged,
}

/// Applies link routes, serialising writes per region route table
pub struct RouteReconciler<'p, P: NetworkProvider + ?Sized> {
    provider: &'p P,
    locks: HashMap<String, Mutex<()>>,
}

impl<'p, P: NetworkProvider + ?Sized> RouteReconciler<'p, P> {
    pub fn new<'r>(provider: &'p P, region_ids: impl IntoIterator<Item = &'r str>) -> Self {
        let locks = region_ids
            .into_iter()
            .map(|id| (id.to_string(), Mutex::new(())))
            .collect();
        RouteReconciler { provider, locks }
    }

    /// Write both routes of an active link
    ///
    /// # Arguments
    /// * `link` - The active link of edge (A, B)
    /// * `a` - Network of `link.edge.a()`
    /// * `b` - Network of `link.edge.b()`
    ///
    /// # Returns
    /// The outcome at A followed by the outcome at B
    pub fn reconcile_link(
        &self,
        link: &Link,
        a: &NetworkHandle,
        b: &NetworkHandle,
    ) -> Result<[RouteOutcome; 2], NetworkError> {
        let at_a = self.ensure_route(a, b.cidr, &link.link_id)?;
        let at_b = self.ensure_route(b, a.cidr, &link.link_id)?;

        info!(
            "Routes for {} via {}: {} {:?}, {} {:?}",
            link.edge, link.link_id, a.region, at_a, b.region, at_b
        );
        Ok([at_a, at_b])
    }

    /// Ensure `network` routes `destination` through `target`
    pub fn ensure_route(
        &self,
        network: &NetworkHandle,
        destination: Ipv4Net,
        target: &str,
    ) -> Result<RouteOutcome, NetworkError> {
        let _guard = self.locks.get(&network.region).map(|lock| lock.lock());

        let routes = self
            .provider
            .list_routes(&network.route_table_id)
            .map_err(|e| NetworkError::provider(network.region.as_str(), e))?;

        if let Some(existing) = routes.iter().find(|r| r.destination == destination) {
            if existing.target == target {
                debug!("Route {} -> {} already present in {}", destination, target, network.region);
                return Ok(RouteOutcome::Unchanged);
            }
            return Err(NetworkError::RouteConflict {
                region: network.region.clone(),
                destination,
                existing: existing.target.clone(),
                requested: target.to_string(),
            });
        }

        self.provider
            .create_route(&network.route_table_id, destination, target)
            .map_err(|e| NetworkError::provider(network.region.as_str(), e))?;
        Ok(RouteOutcome::Created)
    }

    /// Remove every route in `network` that targets `target`; returns how many went
    pub fn remove_routes_to(&self, network: &NetworkHandle, target: &str) -> Result<usize, NetworkError> {
        let _guard = self.locks.get(&network.region).map(|lock| lock.lock());

        let routes = match self.provider.list_routes(&network.route_table_id) {
            Ok(routes) => routes,
            Err(ProviderError::NotFound { .. }) => return Ok(0),
            Err(e) => return Err(NetworkError::provider(network.region.as_str(), e)),
        };

        let mut removed = 0;
        for route in routes.iter().filter(|r| r.target == target) {
            self.provider
                .delete_route(&network.route_table_id, route.destination)
                .map_err(|e| NetworkError::provider(network.region.as_str(), e))?;
            removed += 1;
        }
        Ok(removed)
    }
}
