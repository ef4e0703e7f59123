//! Cross-region resolution fabric.
//!
//! Each region owns one resolver rule forwarding its private zone
//! `<region>.<zone_suffix>`. A region resolves a peer's names once the peer's
//! rule is associated with its network. Associations mirror the edge set in
//! both directions, which gives every pair under full mesh (O(n²)) and only
//! hub/spoke pairs under hub-and-spoke (O(n)).

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::NetworkError;
use crate::peering::Link;
use crate::provider::{
    LinkSide, NetworkHandle, NetworkProvider, ProviderError, ResolverRule, ResolverRuleRequest,
};
use crate::topology::{Edge, Region};

/// `region` resolves the zone of `target_region`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlannedAssociation {
    pub region: String,
    pub target_region: String,
}

/// Associations implied by an edge set.
///
/// An association exists for every direction of every edge whose two regions
/// both take part in cross-region resolution. The result is sorted.
pub fn plan_associations(edges: &[Edge], regions: &[Region]) -> Vec<PlannedAssociation> {
    let participating: BTreeSet<&str> = regions
        .iter()
        .filter(|r| r.context.cross_region_dns)
        .map(|r| r.id.as_str())
        .collect();

    let mut planned: Vec<PlannedAssociation> = edges
        .iter()
        .filter(|e| participating.contains(e.a()) && participating.contains(e.b()))
        .flat_map(|e| {
            [
                PlannedAssociation {
                    region: e.a().to_string(),
                    target_region: e.b().to_string(),
                },
                PlannedAssociation {
                    region: e.b().to_string(),
                    target_region: e.a().to_string(),
                },
            ]
        })
        .collect();
    planned.sort();
    planned
}

/// Counters of one DNS pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSummary {
    pub rules_created: usize,
    pub rules_reused: usize,
    pub associations_created: usize,
    pub associations_reused: usize,
    /// Group associations outside the current plan, dissociated
    pub associations_removed: usize,
    /// Link-side resolution options switched on
    pub link_options_enabled: usize,
}

/// What a DNS teardown removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsRemoval {
    pub associations: usize,
    pub rules: usize,
}

pub struct DnsResolutionFabric<'p, P: NetworkProvider + ?Sized> {
    provider: &'p P,
    group: &'p str,
    zone_suffix: &'p str,
}

impl<'p, P: NetworkProvider + ?Sized> DnsResolutionFabric<'p, P> {
    pub fn new(provider: &'p P, group: &'p str, zone_suffix: &'p str) -> Self {
        DnsResolutionFabric { provider, group, zone_suffix }
    }

    pub fn rule_name(&self, region: &str) -> String {
        format!("{}-dns-{}", self.group, region)
    }

    pub fn zone(&self, region: &str) -> String {
        format!("{}.{}", region, self.zone_suffix)
    }

    /// Wire resolution for the converged edges
    ///
    /// # Arguments
    /// * `edges` - The group's edge set
    /// * `regions` - All regions of the group
    /// * `networks` - Network of every region, keyed by region id
    /// * `links` - The active link of every edge
    pub fn converge(
        &self,
        edges: &[Edge],
        regions: &[Region],
        networks: &BTreeMap<String, NetworkHandle>,
        links: &BTreeMap<Edge, Link>,
    ) -> Result<DnsSummary, NetworkError> {
        let mut summary = DnsSummary::default();

        for edge in edges {
            if let Some(link) = links.get(edge) {
                summary.link_options_enabled += self.enable_link_resolution(link)?;
            }
        }

        let planned = plan_associations(edges, regions);
        let wanted: BTreeSet<(&str, &str)> = planned
            .iter()
            .map(|a| (a.region.as_str(), a.target_region.as_str()))
            .collect();

        // Rules of every region, so associations of an earlier topology are recognised
        let mut rules = self.find_rules(regions.iter().map(|r| r.id.as_str()))?;
        let rule_targets: HashMap<String, String> = rules
            .iter()
            .map(|(region, rule)| (rule.rule_id.clone(), region.clone()))
            .collect();

        let mut present: BTreeSet<(String, String)> = BTreeSet::new();
        for region in regions {
            let network = match networks.get(&region.id) {
                Some(network) => network,
                None => continue,
            };
            let current = self
                .provider
                .list_rule_associations(&network.network_id)
                .map_err(|e| NetworkError::provider(region.id.as_str(), e))?;

            for association in current {
                let target = match rule_targets.get(&association.rule_id) {
                    Some(target) => target,
                    None => continue,
                };
                if wanted.contains(&(region.id.as_str(), target.as_str())) {
                    present.insert((region.id.clone(), target.clone()));
                    continue;
                }
                match self.provider.disassociate_rule(&association.association_id) {
                    Ok(()) | Err(ProviderError::NotFound { .. }) => {}
                    Err(e) => return Err(NetworkError::provider(region.id.as_str(), e)),
                }
                info!(
                    "Removed stale association: {} no longer resolves {}",
                    region.id,
                    self.zone(target)
                );
                summary.associations_removed += 1;
            }
        }

        let targets: BTreeSet<&str> = planned.iter().map(|a| a.target_region.as_str()).collect();
        for target in targets {
            let network = network_of(networks, target)?;
            match rules.get(target) {
                Some(rule) => {
                    if rule.target_network_id != network.network_id {
                        warn!(
                            "Resolver rule {} targets {} instead of {}",
                            rule.name, rule.target_network_id, network.network_id
                        );
                    }
                    summary.rules_reused += 1;
                }
                None => {
                    let rule = self.create_rule(target, network)?;
                    summary.rules_created += 1;
                    rules.insert(target.to_string(), rule);
                }
            }
        }

        for association in &planned {
            let key = (association.region.clone(), association.target_region.clone());
            if present.contains(&key) {
                debug!(
                    "{} already resolves {}",
                    association.region,
                    self.zone(&association.target_region)
                );
                summary.associations_reused += 1;
                continue;
            }

            let network = network_of(networks, &association.region)?;
            let rule = match rules.get(&association.target_region) {
                Some(rule) => rule,
                None => continue,
            };
            self.provider
                .associate_rule(&rule.rule_id, &network.network_id)
                .map_err(|e| NetworkError::provider(association.region.as_str(), e))?;
            summary.associations_created += 1;
        }

        info!(
            "DNS fabric: {} association(s) planned, {} created, {} reused, {} stale removed; {} rule(s) created",
            planned.len(),
            summary.associations_created,
            summary.associations_reused,
            summary.associations_removed,
            summary.rules_created
        );
        Ok(summary)
    }

    /// The group's rules that already exist, keyed by the region they resolve
    fn find_rules<'r>(
        &self,
        region_ids: impl IntoIterator<Item = &'r str>,
    ) -> Result<BTreeMap<String, ResolverRule>, NetworkError> {
        let mut rules = BTreeMap::new();
        for region in region_ids {
            if let Some(rule) = self
                .provider
                .find_resolver_rule(&self.rule_name(region))
                .map_err(|e| NetworkError::provider(region, e))?
            {
                rules.insert(region.to_string(), rule);
            }
        }
        Ok(rules)
    }

    fn create_rule(&self, region: &str, network: &NetworkHandle) -> Result<ResolverRule, NetworkError> {
        let rule = self
            .provider
            .create_resolver_rule(&ResolverRuleRequest {
                name: self.rule_name(region),
                region: region.to_string(),
                domain: self.zone(region),
                target_network_id: network.network_id.clone(),
            })
            .map_err(|e| NetworkError::provider(region, e))?;
        info!("Created resolver rule {} for {}", rule.rule_id, rule.domain);
        Ok(rule)
    }

    /// Allow remote name resolution on both sides of a link
    fn enable_link_resolution(&self, link: &Link) -> Result<usize, NetworkError> {
        let mut changed = 0;
        for side in [LinkSide::Requester, LinkSide::Accepter] {
            if self
                .provider
                .set_link_dns_resolution(&link.link_id, side, true)
                .map_err(|e| NetworkError::provider(link.edge.to_string(), e))?
            {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Remove the group's associations, then its rules
    ///
    /// Only associations of rules named after this group are touched.
    pub fn remove_all(
        &self,
        region_ids: &[String],
        networks: &BTreeMap<String, NetworkHandle>,
    ) -> Result<DnsRemoval, NetworkError> {
        let mut removal = DnsRemoval::default();

        let rules = self.find_rules(region_ids.iter().map(String::as_str))?;
        let rule_ids: BTreeSet<&str> = rules.values().map(|r| r.rule_id.as_str()).collect();

        for (region, network) in networks {
            let associations = self
                .provider
                .list_rule_associations(&network.network_id)
                .map_err(|e| NetworkError::provider(region.as_str(), e))?;
            for association in associations.iter().filter(|a| rule_ids.contains(a.rule_id.as_str())) {
                match self.provider.disassociate_rule(&association.association_id) {
                    Ok(()) | Err(ProviderError::NotFound { .. }) => removal.associations += 1,
                    Err(e) => return Err(NetworkError::provider(region.as_str(), e)),
                }
            }
        }

        for (region, rule) in &rules {
            match self.provider.delete_resolver_rule(&rule.rule_id) {
                Ok(()) => removal.rules += 1,
                Err(ProviderError::NotFound { .. }) => {}
                Err(e) => return Err(NetworkError::provider(region.as_str(), e)),
            }
        }

        Ok(removal)
    }
}

fn network_of<'n>(
    networks: &'n BTreeMap<String, NetworkHandle>,
    region: &str,
) -> Result<&'n NetworkHandle, NetworkError> {
    networks.get(region).ok_or_else(|| {
        NetworkError::provider(
            region,
            ProviderError::NotFound {
                kind: "network",
                id: region.to_string(),
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peering::LinkState;
    use crate::provider::{LinkRequest, NetworkRequest, SimulatedProvider};
    use crate::topology::{select_edges, TopologyMode};

    fn regions() -> Vec<Region> {
        ["us-west-2", "us-east-1", "eu-west-1"]
            .iter()
            .map(|id| Region::new(id, crate::ip::region_to_cidr(id)))
            .collect()
    }

    fn ids(regions: &[Region]) -> Vec<String> {
        regions.iter().map(|r| r.id.clone()).collect()
    }

    fn setup(
        provider: &SimulatedProvider,
        regions: &[Region],
        edges: &[Edge],
    ) -> (BTreeMap<String, NetworkHandle>, BTreeMap<Edge, Link>) {
        let mut networks = BTreeMap::new();
        for region in regions {
            let layout = crate::ip::calculate_subnets(region.cidr, 1).unwrap();
            let handle = provider
                .create_network(&NetworkRequest {
                    name: format!("g-{}", region.id),
                    region: region.id.clone(),
                    cidr: region.cidr,
                    public_subnet: layout.public,
                    private_subnets: layout.private,
                })
                .unwrap();
            networks.insert(region.id.clone(), handle);
        }

        let mut links = BTreeMap::new();
        for edge in edges {
            let record = provider
                .create_link(&LinkRequest {
                    name: edge.link_name("g"),
                    requester_region: edge.a().to_string(),
                    requester_network_id: networks[edge.a()].network_id.clone(),
                    accepter_region: edge.b().to_string(),
                    accepter_network_id: networks[edge.b()].network_id.clone(),
                })
                .unwrap();
            provider.accept_link(&record.link_id).unwrap();
            links.insert(
                edge.clone(),
                Link {
                    link_id: record.link_id,
                    name: record.name,
                    edge: edge.clone(),
                    state: LinkState::Active,
                    created: true,
                },
            );
        }
        (networks, links)
    }

    fn pairs(planned: &[PlannedAssociation]) -> Vec<(&str, &str)> {
        planned
            .iter()
            .map(|a| (a.region.as_str(), a.target_region.as_str()))
            .collect()
    }

    #[test]
    fn test_full_mesh_plan_is_all_ordered_pairs() {
        let regions = regions();
        let edges = select_edges(&ids(&regions), TopologyMode::FullMesh, None).unwrap();
        let planned = plan_associations(&edges, &regions);
        assert_eq!(planned.len(), 6);
        assert!(planned.iter().all(|a| a.region != a.target_region));
    }

    #[test]
    fn test_hub_and_spoke_plan() {
        let regions = regions();
        let edges = select_edges(&ids(&regions), TopologyMode::HubAndSpoke, Some("us-west-2")).unwrap();
        let planned = plan_associations(&edges, &regions);
        assert_eq!(
            pairs(&planned),
            vec![
                ("eu-west-1", "us-west-2"),
                ("us-east-1", "us-west-2"),
                ("us-west-2", "eu-west-1"),
                ("us-west-2", "us-east-1"),
            ]
        );
    }

    #[test]
    fn test_opted_out_region_is_left_out_both_ways() {
        let mut regions = regions();
        regions[2].context.cross_region_dns = false;
        let edges = select_edges(&ids(&regions), TopologyMode::FullMesh, None).unwrap();
        let planned = plan_associations(&edges, &regions);
        assert_eq!(pairs(&planned), vec![("us-east-1", "us-west-2"), ("us-west-2", "us-east-1")]);
    }

    #[test]
    fn test_converge_is_idempotent() {
        let provider = SimulatedProvider::new();
        let regions = regions();
        let edges = select_edges(&ids(&regions), TopologyMode::FullMesh, None).unwrap();
        let (networks, links) = setup(&provider, &regions, &edges);
        let fabric = DnsResolutionFabric::new(&provider, "g", "internal");

        let first = fabric.converge(&edges, &regions, &networks, &links).unwrap();
        assert_eq!(first.rules_created, 3);
        assert_eq!(first.associations_created, 6);
        assert_eq!(first.link_options_enabled, 6);

        let mutations = provider.snapshot().mutations;
        let second = fabric.converge(&edges, &regions, &networks, &links).unwrap();
        assert_eq!(second.rules_created, 0);
        assert_eq!(second.rules_reused, 3);
        assert_eq!(second.associations_created, 0);
        assert_eq!(second.associations_reused, 6);
        assert_eq!(second.associations_removed, 0);
        assert_eq!(second.link_options_enabled, 0);
        assert_eq!(provider.snapshot().mutations, mutations);

        let state = provider.snapshot();
        let rule = state.resolver_rules.values().find(|r| r.name == "g-dns-eu-west-1").unwrap();
        assert_eq!(rule.domain, "eu-west-1.internal");
        assert!(state.links.values().all(|l| l.requester_dns_resolution && l.accepter_dns_resolution));
    }

    #[test]
    fn test_remove_all_clears_group_resources() {
        let provider = SimulatedProvider::new();
        let regions = regions();
        let edges = select_edges(&ids(&regions), TopologyMode::HubAndSpoke, Some("us-west-2")).unwrap();
        let (networks, links) = setup(&provider, &regions, &edges);
        let fabric = DnsResolutionFabric::new(&provider, "g", "internal");
        fabric.converge(&edges, &regions, &networks, &links).unwrap();

        let removal = fabric.remove_all(&ids(&regions), &networks).unwrap();
        assert_eq!(removal, DnsRemoval { associations: 4, rules: 3 });

        let state = provider.snapshot();
        assert!(state.associations.is_empty());
        assert!(state.resolver_rules.is_empty());
        assert_eq!(fabric.remove_all(&ids(&regions), &networks).unwrap(), DnsRemoval::default());
    }

    #[test]
    fn test_narrowed_topology_drops_spoke_associations() {
        let provider = SimulatedProvider::new();
        let regions = regions();
        let mesh = select_edges(&ids(&regions), TopologyMode::FullMesh, None).unwrap();
        let (networks, links) = setup(&provider, &regions, &mesh);
        let fabric = DnsResolutionFabric::new(&provider, "g", "internal");
        fabric.converge(&mesh, &regions, &networks, &links).unwrap();
        assert_eq!(provider.snapshot().associations.len(), 6);

        let star = select_edges(&ids(&regions), TopologyMode::HubAndSpoke, Some("us-west-2")).unwrap();
        let summary = fabric.converge(&star, &regions, &networks, &links).unwrap();
        assert_eq!(summary.associations_removed, 2);
        assert_eq!(summary.associations_reused, 4);
        assert_eq!(summary.associations_created, 0);

        let hub_rule = provider.find_resolver_rule("g-dns-us-west-2").unwrap().unwrap();
        for spoke in ["us-east-1", "eu-west-1"] {
            let current = provider.list_rule_associations(&networks[spoke].network_id).unwrap();
            assert_eq!(current.len(), 1, "{} still resolves another spoke", spoke);
            assert_eq!(current[0].rule_id, hub_rule.rule_id);
        }

        let again = fabric.converge(&star, &regions, &networks, &links).unwrap();
        assert_eq!(again.associations_removed, 0);
    }

    #[test]
    fn test_foreign_associations_are_left_alone() {
        let provider = SimulatedProvider::new();
        let regions = regions();
        let edges = select_edges(&ids(&regions), TopologyMode::FullMesh, None).unwrap();
        let (networks, links) = setup(&provider, &regions, &edges);

        let other = DnsResolutionFabric::new(&provider, "other", "internal");
        let foreign = other.create_rule("us-west-2", &networks["us-west-2"]).unwrap();
        provider
            .associate_rule(&foreign.rule_id, &networks["eu-west-1"].network_id)
            .unwrap();

        let fabric = DnsResolutionFabric::new(&provider, "g", "internal");
        let summary = fabric.converge(&edges, &regions, &networks, &links).unwrap();
        assert_eq!(summary.associations_removed, 0);
        assert_eq!(provider.snapshot().associations.len(), 7);
    }
}
