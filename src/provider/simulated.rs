//! File-backed simulated provider.
//!
//! Keeps every resource in memory behind a lock and can persist itself to a
//! JSON state file, so consecutive command-line runs see the resources earlier
//! runs created. Link acceptance is scripted per link name, which lets tests
//! reproduce slow, rejected and stuck handshakes.

use chrono::Utc;
use ipnet::Ipv4Net;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use super::{
    LinkRecord, LinkRequest, LinkSide, LinkStatus, NetworkHandle, NetworkProvider, NetworkRequest,
    ProviderError, ResolverRule, ResolverRuleRequest, RouteRecord, RuleAssociation,
};

/// How the simulated peer responds when a link is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceBehavior {
    /// Link becomes active as soon as it is accepted
    Immediate,
    /// Link stays provisioning for this many status polls
    AfterPolls(u32),
    /// The accepter rejects the link
    Reject,
    /// Acceptance is never observed; the link stays pending
    NeverAccept,
}

/// Everything the simulated provider knows, as persisted to the state file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedState {
    #[serde(default)]
    next_id: u64,
    /// Number of create/delete/update calls that changed something
    #[serde(default)]
    pub mutations: u64,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkHandle>,
    #[serde(default)]
    pub links: BTreeMap<String, LinkRecord>,
    #[serde(default)]
    pub route_tables: BTreeMap<String, Vec<RouteRecord>>,
    #[serde(default)]
    pub resolver_rules: BTreeMap<String, ResolverRule>,
    #[serde(default)]
    pub associations: BTreeMap<String, RuleAssociation>,
    /// Remaining polls before a provisioning link turns active
    #[serde(default)]
    pending_polls: BTreeMap<String, u32>,
}

impl SimulatedState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08x}", prefix, self.next_id)
    }

    /// True when no network resources are left
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
            && self.links.is_empty()
            && self.route_tables.is_empty()
            && self.resolver_rules.is_empty()
            && self.associations.is_empty()
    }

    /// Total number of routes pointing at a target
    pub fn routes_targeting(&self, target: &str) -> usize {
        self.route_tables
            .values()
            .flat_map(|routes| routes.iter())
            .filter(|route| route.target == target)
            .count()
    }

    pub fn network_by_region(&self, region: &str) -> Option<&NetworkHandle> {
        self.networks.values().find(|n| n.region == region)
    }

    pub fn link_by_name(&self, name: &str) -> Option<&LinkRecord> {
        self.links.values().find(|l| l.name == name)
    }
}

/// In-memory network provider with optional JSON persistence
#[derive(Debug)]
pub struct SimulatedProvider {
    state: Mutex<SimulatedState>,
    default_behavior: AcceptanceBehavior,
    behaviors: Mutex<HashMap<String, AcceptanceBehavior>>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::from_state(SimulatedState::default())
    }

    pub fn from_state(state: SimulatedState) -> Self {
        SimulatedProvider {
            state: Mutex::new(state),
            default_behavior: AcceptanceBehavior::Immediate,
            behaviors: Mutex::new(HashMap::new()),
        }
    }

    /// Acceptance behavior for links without a scripted one
    pub fn with_default_behavior(mut self, behavior: AcceptanceBehavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// Script the acceptance behavior of one link, by link name
    pub fn set_behavior(&self, link_name: &str, behavior: AcceptanceBehavior) {
        self.behaviors.lock().insert(link_name.to_string(), behavior);
    }

    /// Load state from a JSON file; a missing file yields an empty provider
    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        if !path.exists() {
            debug!("No provider state at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let state: SimulatedState = serde_json::from_str(&content)?;
        debug!(
            "Loaded provider state from {:?}: {} networks, {} links",
            path,
            state.networks.len(),
            state.links.len()
        );
        Ok(Self::from_state(state))
    }

    pub fn save(&self, path: &Path) -> Result<(), ProviderError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&*self.state.lock())?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SimulatedState {
        self.state.lock().clone()
    }

    /// Add a route that RegionMesh did not create (e.g. towards a transit gateway)
    pub fn insert_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let routes = state
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| not_found("route table", route_table_id))?;
        routes.push(RouteRecord {
            destination,
            target: target.to_string(),
        });
        Ok(())
    }

    /// Force a link into a status, as the provider itself would (expiry, deletion)
    pub fn set_link_status(&self, link_id: &str, status: LinkStatus) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let link = state
            .links
            .get_mut(link_id)
            .ok_or_else(|| not_found("link", link_id))?;
        link.status = status;
        Ok(())
    }

    fn behavior_for(&self, link_name: &str) -> AcceptanceBehavior {
        self.behaviors
            .lock()
            .get(link_name)
            .copied()
            .unwrap_or(self.default_behavior)
    }
}

fn not_found(kind: &'static str, id: &str) -> ProviderError {
    ProviderError::NotFound {
        kind,
        id: id.to_string(),
    }
}

impl NetworkProvider for SimulatedProvider {
    fn find_network(&self, name: &str) -> Result<Option<NetworkHandle>, ProviderError> {
        let state = self.state.lock();
        Ok(state.networks.values().find(|n| n.name == name).cloned())
    }

    fn create_network(&self, request: &NetworkRequest) -> Result<NetworkHandle, ProviderError> {
        let mut state = self.state.lock();
        if state.networks.values().any(|n| n.name == request.name) {
            return Err(ProviderError::Rejected {
                operation: "CreateNetwork".to_string(),
                message: format!("a network named '{}' already exists", request.name),
            });
        }

        let network_id = state.allocate_id("vpc");
        let route_table_id = state.allocate_id("rtb");
        let public_subnet_id = state.allocate_id("subnet");
        let private_subnet_ids = request
            .private_subnets
            .iter()
            .map(|_| state.allocate_id("subnet"))
            .collect();

        let handle = NetworkHandle {
            network_id: network_id.clone(),
            name: request.name.clone(),
            region: request.region.clone(),
            cidr: request.cidr,
            route_table_id: route_table_id.clone(),
            public_subnet_id,
            private_subnet_ids,
        };

        state.route_tables.insert(
            route_table_id,
            vec![RouteRecord {
                destination: request.cidr,
                target: "local".to_string(),
            }],
        );
        state.networks.insert(network_id, handle.clone());
        state.mutations += 1;
        Ok(handle)
    }

    fn delete_network(&self, network_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let network = state
            .networks
            .remove(network_id)
            .ok_or_else(|| not_found("network", network_id))?;
        state.route_tables.remove(&network.route_table_id);
        state.mutations += 1;
        Ok(())
    }

    fn find_link(&self, name: &str) -> Result<Option<LinkRecord>, ProviderError> {
        Ok(self.state.lock().link_by_name(name).cloned())
    }

    fn list_links(&self, prefix: &str) -> Result<Vec<LinkRecord>, ProviderError> {
        let state = self.state.lock();
        Ok(state
            .links
            .values()
            .filter(|l| l.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn create_link(&self, request: &LinkRequest) -> Result<LinkRecord, ProviderError> {
        let mut state = self.state.lock();
        for network_id in [&request.requester_network_id, &request.accepter_network_id] {
            if !state.networks.contains_key(network_id) {
                return Err(not_found("network", network_id));
            }
        }

        let link_id = state.allocate_id("pcx");
        let record = LinkRecord {
            link_id: link_id.clone(),
            name: request.name.clone(),
            requester_region: request.requester_region.clone(),
            requester_network_id: request.requester_network_id.clone(),
            accepter_region: request.accepter_region.clone(),
            accepter_network_id: request.accepter_network_id.clone(),
            status: LinkStatus::PendingAcceptance,
            requester_dns_resolution: false,
            accepter_dns_resolution: false,
            created_at: Utc::now(),
        };
        state.links.insert(link_id, record.clone());
        state.mutations += 1;
        Ok(record)
    }

    fn accept_link(&self, link_id: &str) -> Result<LinkStatus, ProviderError> {
        let name = {
            let state = self.state.lock();
            let link = state.links.get(link_id).ok_or_else(|| not_found("link", link_id))?;
            if !matches!(link.status, LinkStatus::PendingAcceptance | LinkStatus::InitiatingRequest) {
                return Ok(link.status);
            }
            link.name.clone()
        };
        let behavior = self.behavior_for(&name);

        let mut state = self.state.lock();
        let next = match behavior {
            AcceptanceBehavior::Immediate | AcceptanceBehavior::AfterPolls(0) => LinkStatus::Active,
            AcceptanceBehavior::AfterPolls(polls) => {
                state.pending_polls.insert(link_id.to_string(), polls);
                LinkStatus::Provisioning
            }
            AcceptanceBehavior::Reject => LinkStatus::Rejected,
            AcceptanceBehavior::NeverAccept => return Ok(LinkStatus::PendingAcceptance),
        };
        let link = state
            .links
            .get_mut(link_id)
            .ok_or_else(|| not_found("link", link_id))?;
        link.status = next;
        state.mutations += 1;
        Ok(next)
    }

    fn describe_link(&self, link_id: &str) -> Result<LinkStatus, ProviderError> {
        let mut state = self.state.lock();
        let status = state
            .links
            .get(link_id)
            .map(|l| l.status)
            .ok_or_else(|| not_found("link", link_id))?;

        if status != LinkStatus::Provisioning {
            return Ok(status);
        }

        let remaining = state.pending_polls.get(link_id).copied().unwrap_or(0);
        if remaining > 1 {
            state.pending_polls.insert(link_id.to_string(), remaining - 1);
            return Ok(LinkStatus::Provisioning);
        }

        state.pending_polls.remove(link_id);
        if let Some(link) = state.links.get_mut(link_id) {
            link.status = LinkStatus::Active;
        }
        Ok(LinkStatus::Active)
    }

    fn set_link_dns_resolution(
        &self,
        link_id: &str,
        side: LinkSide,
        enabled: bool,
    ) -> Result<bool, ProviderError> {
        let mut state = self.state.lock();
        let link = state
            .links
            .get_mut(link_id)
            .ok_or_else(|| not_found("link", link_id))?;
        let option = match side {
            LinkSide::Requester => &mut link.requester_dns_resolution,
            LinkSide::Accepter => &mut link.accepter_dns_resolution,
        };
        if *option == enabled {
            return Ok(false);
        }
        *option = enabled;
        state.mutations += 1;
        Ok(true)
    }

    fn delete_link(&self, link_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state
            .links
            .remove(link_id)
            .ok_or_else(|| not_found("link", link_id))?;
        state.pending_polls.remove(link_id);
        state.mutations += 1;
        Ok(())
    }

    fn list_routes(&self, route_table_id: &str) -> Result<Vec<RouteRecord>, ProviderError> {
        let state = self.state.lock();
        state
            .route_tables
            .get(route_table_id)
            .cloned()
            .ok_or_else(|| not_found("route table", route_table_id))
    }

    fn create_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &str,
    ) -> Result<RouteRecord, ProviderError> {
        let mut state = self.state.lock();
        let routes = state
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| not_found("route table", route_table_id))?;
        if routes.iter().any(|r| r.destination == destination) {
            return Err(ProviderError::Rejected {
                operation: "CreateRoute".to_string(),
                message: format!("route for {} already exists in {}", destination, route_table_id),
            });
        }
        let record = RouteRecord {
            destination,
            target: target.to_string(),
        };
        routes.push(record.clone());
        state.mutations += 1;
        Ok(record)
    }

    fn delete_route(&self, route_table_id: &str, destination: Ipv4Net) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let routes = state
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| not_found("route table", route_table_id))?;
        let before = routes.len();
        routes.retain(|r| r.destination != destination);
        if routes.len() == before {
            return Err(not_found("route", &destination.to_string()));
        }
        state.mutations += 1;
        Ok(())
    }

    fn find_resolver_rule(&self, name: &str) -> Result<Option<ResolverRule>, ProviderError> {
        let state = self.state.lock();
        Ok(state.resolver_rules.values().find(|r| r.name == name).cloned())
    }

    fn create_resolver_rule(&self, request: &ResolverRuleRequest) -> Result<ResolverRule, ProviderError> {
        let mut state = self.state.lock();
        if !state.networks.contains_key(&request.target_network_id) {
            return Err(not_found("network", &request.target_network_id));
        }
        let rule_id = state.allocate_id("rslvr-rr");
        let rule = ResolverRule {
            rule_id: rule_id.clone(),
            name: request.name.clone(),
            region: request.region.clone(),
            domain: request.domain.clone(),
            target_network_id: request.target_network_id.clone(),
            created_at: Utc::now(),
        };
        state.resolver_rules.insert(rule_id, rule.clone());
        state.mutations += 1;
        Ok(rule)
    }

    fn delete_resolver_rule(&self, rule_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        if state.associations.values().any(|a| a.rule_id == rule_id) {
            return Err(ProviderError::Rejected {
                operation: "DeleteResolverRule".to_string(),
                message: format!("rule {} still has associations", rule_id),
            });
        }
        state
            .resolver_rules
            .remove(rule_id)
            .ok_or_else(|| not_found("resolver rule", rule_id))?;
        state.mutations += 1;
        Ok(())
    }

    fn list_rule_associations(&self, network_id: &str) -> Result<Vec<RuleAssociation>, ProviderError> {
        let state = self.state.lock();
        Ok(state
            .associations
            .values()
            .filter(|a| a.network_id == network_id)
            .cloned()
            .collect())
    }

    fn associate_rule(&self, rule_id: &str, network_id: &str) -> Result<RuleAssociation, ProviderError> {
        let mut state = self.state.lock();
        if !state.resolver_rules.contains_key(rule_id) {
            return Err(not_found("resolver rule", rule_id));
        }
        if !state.networks.contains_key(network_id) {
            return Err(not_found("network", network_id));
        }
        if state
            .associations
            .values()
            .any(|a| a.rule_id == rule_id && a.network_id == network_id)
        {
            return Err(ProviderError::Rejected {
                operation: "AssociateResolverRule".to_string(),
                message: format!("rule {} is already associated with {}", rule_id, network_id),
            });
        }
        let association_id = state.allocate_id("rslvr-rrassoc");
        let association = RuleAssociation {
            association_id: association_id.clone(),
            rule_id: rule_id.to_string(),
            network_id: network_id.to_string(),
        };
        state.associations.insert(association_id, association.clone());
        state.mutations += 1;
        Ok(association)
    }

    fn disassociate_rule(&self, association_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state
            .associations
            .remove(association_id)
            .ok_or_else(|| not_found("rule association", association_id))?;
        state.mutations += 1;
        Ok(())
    }
}
