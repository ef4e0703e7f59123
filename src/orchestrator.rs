//! Network group orchestrator.
//!
//! This module drives a build through its stages in a fixed order:
//! validation, edge selection, region networks, per-edge peering and routes,
//! cross-region DNS, and finally the published outputs. Build state lives in
//! an explicit [`BuildContext`] threaded through every stage.

use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Config, TopologyMode, ValidationError};
use crate::dns::{plan_associations, DnsResolutionFabric, DnsSummary, PlannedAssociation};
use crate::error::NetworkError;
use crate::ip::calculate_subnets;
use crate::peering::{AcceptancePolicy, Link, PeeringConnector};
use crate::provider::{NetworkHandle, NetworkProvider, NetworkRequest, ProviderError};
use crate::registry::{OutputRegistry, RegionOutput};
use crate::routes::{check_cidr_overlap, planned_routes, PlannedRoute, RouteOutcome, RouteReconciler};
use crate::topology::{all_pairs, check_link_names, select_edges, Edge, Region};
use crate::utils::validation::{validate_group_name, validate_regions};

/// Runtime options of a build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub acceptance: AcceptancePolicy,
    /// Edges converged concurrently; 1 runs them in order on the caller's thread
    pub parallelism: usize,
    pub dns_enabled: bool,
    pub zone_suffix: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            acceptance: AcceptancePolicy::default(),
            parallelism: 1,
            dns_enabled: true,
            zone_suffix: "internal".to_string(),
        }
    }
}

impl BuildOptions {
    pub fn from_config(config: &Config) -> Self {
        BuildOptions {
            acceptance: AcceptancePolicy {
                timeout: config.peering.acceptance_timeout,
                poll_interval: config.peering.poll_interval,
            },
            parallelism: config.peering.parallelism,
            dns_enabled: config.dns.enabled,
            zone_suffix: config.dns.zone_suffix.clone(),
        }
    }
}

/// Created vs. reused resources of one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceCounts {
    pub networks_created: usize,
    pub networks_reused: usize,
    pub links_created: usize,
    pub links_reused: usize,
    pub routes_created: usize,
    pub routes_unchanged: usize,
    pub rules_created: usize,
    pub associations_created: usize,
    pub associations_reused: usize,
    /// Associations of an earlier topology, dissociated
    pub associations_removed: usize,
}

impl ConvergenceCounts {
    /// Resources this build created
    pub fn total_created(&self) -> usize {
        self.networks_created
            + self.links_created
            + self.routes_created
            + self.rules_created
            + self.associations_created
    }
}

/// Result of a build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub group: String,
    pub topology: TopologyMode,
    pub hub: Option<String>,
    pub edges: Vec<Edge>,
    /// Link name to active link id, for converged edges
    pub links: BTreeMap<String, String>,
    /// Keyed by region id
    pub outputs: BTreeMap<String, RegionOutput>,
    pub counts: ConvergenceCounts,
    /// Group links outside the current edge set, left in place
    pub orphaned_links: Vec<String>,
}

impl BuildReport {
    pub fn registry(&self) -> OutputRegistry {
        OutputRegistry {
            group: self.group.clone(),
            topology: self.topology,
            hub: self.hub.clone(),
            generated_at: Utc::now(),
            regions: self.outputs.clone(),
            links: self.links.clone(),
        }
    }
}

/// A build that stopped on an error, with what had converged up to that point
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct BuildFailure {
    pub error: NetworkError,
    pub report: Box<BuildReport>,
}

/// What a teardown removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub associations_removed: usize,
    pub rules_removed: usize,
    pub routes_removed: usize,
    pub links_removed: usize,
    pub networks_removed: usize,
}

impl TeardownReport {
    pub fn is_noop(&self) -> bool {
        *self == TeardownReport::default()
    }
}

/// Planned region network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedNetwork {
    pub region: String,
    pub name: String,
    pub cidr: ipnet::Ipv4Net,
    pub public_subnet: ipnet::Ipv4Net,
    pub private_subnets: Vec<ipnet::Ipv4Net>,
}

/// Planned link of one edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedLink {
    pub name: String,
    pub requester: String,
    pub accepter: String,
}

/// Everything a build would converge, computed without touching a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub group: String,
    pub topology: TopologyMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub: Option<String>,
    pub networks: Vec<PlannedNetwork>,
    pub links: Vec<PlannedLink>,
    pub routes: Vec<PlannedRoute>,
    pub dns_associations: Vec<PlannedAssociation>,
}

/// Mutable state threaded through the build stages
#[derive(Debug, Default)]
struct BuildContext {
    networks: BTreeMap<String, NetworkHandle>,
    links: BTreeMap<Edge, Link>,
    /// Edges with an active link and both routes in place
    converged: BTreeSet<Edge>,
    dns_converged: bool,
    counts: ConvergenceCounts,
    orphaned_links: Vec<String>,
}

impl BuildContext {
    fn record_edge(&mut self, link: Link, routes: [RouteOutcome; 2]) {
        if link.created {
            self.counts.links_created += 1;
        } else {
            self.counts.links_reused += 1;
        }
        for outcome in routes {
            match outcome {
                RouteOutcome::Created => self.counts.routes_created += 1,
                RouteOutcome::Unchanged => self.counts.routes_unchanged += 1,
            }
        }
        self.converged.insert(link.edge.clone());
        self.links.insert(link.edge.clone(), link);
    }

    fn record_dns(&mut self, summary: &DnsSummary) {
        self.counts.rules_created += summary.rules_created;
        self.counts.associations_created += summary.associations_created;
        self.counts.associations_reused += summary.associations_reused;
        self.counts.associations_removed += summary.associations_removed;
        self.dns_converged = true;
    }
}

/// A validated group of peered region networks
#[derive(Debug, Clone)]
pub struct NetworkGroup {
    name: String,
    /// Sorted by id
    regions: Vec<Region>,
    mode: TopologyMode,
    hub: Option<String>,
    edges: Vec<Edge>,
    options: BuildOptions,
}

impl NetworkGroup {
    /// Validate inputs and compute the edge set
    ///
    /// All configuration errors surface here, before any provider call.
    pub fn new(
        name: &str,
        mut regions: Vec<Region>,
        mode: TopologyMode,
        hub: Option<&str>,
        options: BuildOptions,
    ) -> Result<Self, NetworkError> {
        validate_group_name(name)?;
        validate_regions(&regions)?;
        check_cidr_overlap(&regions)?;

        if options.parallelism == 0 {
            return Err(ValidationError::InvalidPeering("parallelism must be at least 1".to_string()).into());
        }

        regions.sort_by(|x, y| x.id.cmp(&y.id));
        let ids: Vec<String> = regions.iter().map(|r| r.id.clone()).collect();
        let edges = select_edges(&ids, mode, hub)?;
        // Teardown and orphan detection look links up over every pair
        check_link_names(name, &all_pairs(&ids))?;

        info!(
            "Network group '{}': {} region(s), topology {}, {} edge(s)",
            name,
            regions.len(),
            mode,
            edges.len()
        );

        Ok(NetworkGroup {
            name: name.to_string(),
            regions,
            mode,
            hub: hub.map(str::to_string),
            edges,
            options,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, NetworkError> {
        config.validate()?;
        Self::new(
            &config.name,
            config.resolve_regions(),
            config.topology,
            config.hub.as_deref(),
            BuildOptions::from_config(config),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn mode(&self) -> TopologyMode {
        self.mode
    }

    pub fn hub(&self) -> Option<&str> {
        self.hub.as_deref()
    }

    /// The deterministic, sorted edge set
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn network_name(&self, region: &str) -> String {
        format!("{}-{}", self.name, region)
    }

    fn region_ids(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.id.clone()).collect()
    }

    /// Everything a build would converge
    pub fn plan(&self) -> Result<BuildPlan, NetworkError> {
        let mut networks = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let layout = calculate_subnets(region.cidr, region.context.availability_zones).map_err(|e| {
                ValidationError::InvalidSubnets {
                    region: region.id.clone(),
                    reason: e.to_string(),
                }
            })?;
            networks.push(PlannedNetwork {
                region: region.id.clone(),
                name: self.network_name(&region.id),
                cidr: region.cidr,
                public_subnet: layout.public,
                private_subnets: layout.private,
            });
        }

        let links = self
            .edges
            .iter()
            .map(|edge| PlannedLink {
                name: edge.link_name(&self.name),
                requester: edge.a().to_string(),
                accepter: edge.b().to_string(),
            })
            .collect();

        let dns_associations = if self.options.dns_enabled {
            plan_associations(&self.edges, &self.regions)
        } else {
            Vec::new()
        };

        Ok(BuildPlan {
            group: self.name.clone(),
            topology: self.mode,
            hub: self.hub.clone(),
            networks,
            links,
            routes: planned_routes(&self.edges, &self.regions),
            dns_associations,
        })
    }

    /// Converge the group against a provider
    ///
    /// A failure on one edge stops the edges not yet started; edges that
    /// already converged stay in place and are reported in the failure.
    /// Re-running the build resumes from where it stopped.
    pub fn build<P: NetworkProvider + ?Sized>(&self, provider: &P) -> Result<BuildReport, BuildFailure> {
        let mut ctx = BuildContext::default();
        let result = self.converge(provider, &mut ctx);
        let report = self.report(&ctx);

        match result {
            Ok(()) => {
                info!(
                    "Network group '{}' converged: {} created, links {}/{} reused, routes {} unchanged",
                    self.name,
                    report.counts.total_created(),
                    report.counts.links_reused,
                    self.edges.len(),
                    report.counts.routes_unchanged
                );
                Ok(report)
            }
            Err(error) => Err(BuildFailure {
                error,
                report: Box::new(report),
            }),
        }
    }

    fn converge<P: NetworkProvider + ?Sized>(
        &self,
        provider: &P,
        ctx: &mut BuildContext,
    ) -> Result<(), NetworkError> {
        self.ensure_networks(provider, ctx)?;
        self.find_orphaned_links(provider, ctx)?;
        self.converge_edges(provider, ctx)?;

        if self.options.dns_enabled {
            let fabric = DnsResolutionFabric::new(provider, &self.name, &self.options.zone_suffix);
            let summary = fabric.converge(&self.edges, &self.regions, &ctx.networks, &ctx.links)?;
            ctx.record_dns(&summary);
        } else {
            debug!("DNS disabled for '{}', skipping resolver wiring", self.name);
            ctx.dns_converged = true;
        }
        Ok(())
    }

    /// Look up every region's network before creating any
    ///
    /// A network that exists with a different block is a configuration error,
    /// and it must surface before this build writes anything.
    fn ensure_networks<P: NetworkProvider + ?Sized>(
        &self,
        provider: &P,
        ctx: &mut BuildContext,
    ) -> Result<(), NetworkError> {
        let mut missing = Vec::new();
        for region in &self.regions {
            let existing = provider
                .find_network(&self.network_name(&region.id))
                .map_err(|e| NetworkError::provider(region.id.as_str(), e))?;

            match existing {
                Some(handle) if handle.cidr != region.cidr => {
                    return Err(ValidationError::InvalidRegion {
                        region: region.id.clone(),
                        reason: format!(
                            "existing network {} uses {}, configuration asks for {}",
                            handle.network_id, handle.cidr, region.cidr
                        ),
                    }
                    .into());
                }
                Some(handle) => {
                    debug!("Reusing network {} for {}", handle.network_id, region.id);
                    ctx.counts.networks_reused += 1;
                    ctx.networks.insert(region.id.clone(), handle);
                }
                None => {
                    let layout = calculate_subnets(region.cidr, region.context.availability_zones)
                        .map_err(|e| ValidationError::InvalidSubnets {
                            region: region.id.clone(),
                            reason: e.to_string(),
                        })?;
                    missing.push((region, layout));
                }
            }
        }

        for (region, layout) in missing {
            let handle = provider
                .create_network(&NetworkRequest {
                    name: self.network_name(&region.id),
                    region: region.id.clone(),
                    cidr: region.cidr,
                    public_subnet: layout.public,
                    private_subnets: layout.private,
                })
                .map_err(|e| NetworkError::provider(region.id.as_str(), e))?;
            info!(
                "Created network {} for {} ({}, {} private subnet(s))",
                handle.network_id,
                region.id,
                region.cidr,
                handle.private_subnet_ids.len()
            );
            ctx.counts.networks_created += 1;
            ctx.networks.insert(region.id.clone(), handle);
        }
        Ok(())
    }

    /// Group links outside the edge set are reported, never deleted here
    fn find_orphaned_links<P: NetworkProvider + ?Sized>(
        &self,
        provider: &P,
        ctx: &mut BuildContext,
    ) -> Result<(), NetworkError> {
        // Other groups may share the name prefix, so only exact pair names count
        let expected: BTreeSet<String> = self.edges.iter().map(|e| e.link_name(&self.name)).collect();
        let candidates: BTreeSet<String> = all_pairs(&self.region_ids())
            .iter()
            .map(|e| e.link_name(&self.name))
            .filter(|name| !expected.contains(name))
            .collect();

        let prefix = format!("{}-peering-", self.name);
        let links = provider
            .list_links(&prefix)
            .map_err(|e| NetworkError::provider(self.name.as_str(), e))?;
        for link in links {
            if candidates.contains(&link.name) {
                warn!(
                    "Link {} ({}) is not part of the {} edge set; run a teardown to remove it",
                    link.name, link.link_id, self.mode
                );
                ctx.orphaned_links.push(link.name);
            }
        }
        ctx.orphaned_links.sort();
        Ok(())
    }

    fn converge_edges<P: NetworkProvider + ?Sized>(
        &self,
        provider: &P,
        ctx: &mut BuildContext,
    ) -> Result<(), NetworkError> {
        let connector = PeeringConnector::new(provider, &self.name, self.options.acceptance);
        let reconciler = RouteReconciler::new(provider, self.regions.iter().map(|r| r.id.as_str()));

        if self.options.parallelism <= 1 || self.edges.len() <= 1 {
            for edge in &self.edges {
                let (link, routes) = converge_edge(&connector, &reconciler, &ctx.networks, edge)?;
                ctx.record_edge(link, routes);
            }
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallelism)
            .build()?;
        let halted = AtomicBool::new(false);
        let networks = &ctx.networks;

        let results: Vec<Option<Result<(Link, [RouteOutcome; 2]), NetworkError>>> = pool.install(|| {
            self.edges
                .par_iter()
                .map(|edge| {
                    if halted.load(Ordering::SeqCst) {
                        debug!("Skipping {} after an earlier edge failed", edge);
                        return None;
                    }
                    let result = converge_edge(&connector, &reconciler, networks, edge);
                    if result.is_err() {
                        halted.store(true, Ordering::SeqCst);
                    }
                    Some(result)
                })
                .collect()
        });

        let mut first_error = None;
        for result in results.into_iter().flatten() {
            match result {
                Ok((link, routes)) => ctx.record_edge(link, routes),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn report(&self, ctx: &BuildContext) -> BuildReport {
        let outputs = ctx
            .networks
            .iter()
            .map(|(region, handle)| {
                let wired = self
                    .edges
                    .iter()
                    .filter(|e| e.contains(region))
                    .all(|e| ctx.converged.contains(e));
                (region.clone(), RegionOutput::from_handle(handle, wired && ctx.dns_converged))
            })
            .collect();

        BuildReport {
            group: self.name.clone(),
            topology: self.mode,
            hub: self.hub.clone(),
            edges: self.edges.clone(),
            links: ctx
                .links
                .iter()
                .map(|(_, link)| (link.name.clone(), link.link_id.clone()))
                .collect(),
            outputs,
            counts: ctx.counts.clone(),
            orphaned_links: ctx.orphaned_links.clone(),
        }
    }

    /// Remove every group resource in reverse dependency order
    ///
    /// Associations go first, then resolver rules, routes, links and finally
    /// the networks. Every region pair is considered, so links left by an
    /// earlier topology are removed as well. Missing resources are skipped.
    pub fn teardown<P: NetworkProvider + ?Sized>(&self, provider: &P) -> Result<TeardownReport, NetworkError> {
        let mut report = TeardownReport::default();
        let ids = self.region_ids();

        let mut networks = BTreeMap::new();
        for region in &ids {
            if let Some(handle) = provider
                .find_network(&self.network_name(region))
                .map_err(|e| NetworkError::provider(region.as_str(), e))?
            {
                networks.insert(region.clone(), handle);
            }
        }

        let fabric = DnsResolutionFabric::new(provider, &self.name, &self.options.zone_suffix);
        let removed = fabric.remove_all(&ids, &networks)?;
        report.associations_removed = removed.associations;
        report.rules_removed = removed.rules;

        let mut links = Vec::new();
        for edge in all_pairs(&ids) {
            if let Some(link) = provider
                .find_link(&edge.link_name(&self.name))
                .map_err(|e| NetworkError::provider(edge.to_string(), e))?
            {
                links.push((edge, link));
            }
        }

        let reconciler = RouteReconciler::new(provider, ids.iter().map(String::as_str));
        for (edge, link) in &links {
            for region in [edge.a(), edge.b()] {
                if let Some(network) = networks.get(region) {
                    report.routes_removed += reconciler.remove_routes_to(network, &link.link_id)?;
                }
            }
        }

        for (edge, link) in &links {
            match provider.delete_link(&link.link_id) {
                Ok(()) => {
                    info!("Deleted link {} for {}", link.link_id, edge);
                    report.links_removed += 1;
                }
                Err(ProviderError::NotFound { .. }) => {}
                Err(e) => return Err(NetworkError::provider(edge.to_string(), e)),
            }
        }

        for (region, network) in &networks {
            match provider.delete_network(&network.network_id) {
                Ok(()) => {
                    info!("Deleted network {} for {}", network.network_id, region);
                    report.networks_removed += 1;
                }
                Err(ProviderError::NotFound { .. }) => {}
                Err(e) => return Err(NetworkError::provider(region.as_str(), e)),
            }
        }

        if report.is_noop() {
            info!("Nothing to tear down for '{}'", self.name);
        }
        Ok(report)
    }
}

/// Peering then routes for one edge; routes are never written for a non-active link
fn converge_edge<P: NetworkProvider + ?Sized>(
    connector: &PeeringConnector<'_, P>,
    reconciler: &RouteReconciler<'_, P>,
    networks: &BTreeMap<String, NetworkHandle>,
    edge: &Edge,
) -> Result<(Link, [RouteOutcome; 2]), NetworkError> {
    let network = |region: &str| {
        networks.get(region).ok_or_else(|| {
            NetworkError::provider(
                region,
                ProviderError::NotFound {
                    kind: "network",
                    id: region.to_string(),
                },
            )
        })
    };
    let a = network(edge.a())?;
    let b = network(edge.b())?;

    let link = connector.connect(edge, a, b)?;
    let routes = reconciler.reconcile_link(&link, a, b)?;
    Ok((link, routes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SimulatedProvider;
    use std::time::Duration;

    fn regions(ids: &[&str]) -> Vec<Region> {
        ids.iter()
            .map(|id| Region::new(id, crate::ip::region_to_cidr(id)))
            .collect()
    }

    fn options() -> BuildOptions {
        BuildOptions {
            acceptance: AcceptancePolicy {
                timeout: Duration::from_millis(100),
                poll_interval: Duration::from_millis(1),
            },
            ..BuildOptions::default()
        }
    }

    #[test]
    fn test_edges_are_sorted() {
        let group = NetworkGroup::new(
            "test",
            regions(&["us-west-2", "us-east-1", "eu-west-1"]),
            TopologyMode::FullMesh,
            None,
            options(),
        )
        .unwrap();

        let edges: Vec<String> = group.edges().iter().map(Edge::to_string).collect();
        assert_eq!(
            edges,
            vec!["eu-west-1<->us-east-1", "eu-west-1<->us-west-2", "us-east-1<->us-west-2"]
        );
        assert_eq!(group.regions()[0].id, "eu-west-1");
    }

    #[test]
    fn test_invalid_hub_is_a_configuration_error() {
        let err = NetworkGroup::new(
            "test",
            regions(&["us-west-2", "us-east-1"]),
            TopologyMode::HubAndSpoke,
            Some("ap-south-1"),
            options(),
        )
        .unwrap_err();
        assert!(matches!(err, NetworkError::Configuration(ValidationError::InvalidHub { .. })));
        assert_eq!(err.subject().as_deref(), Some("ap-south-1"));
    }

    #[test]
    fn test_plan_lists_everything_a_build_writes() {
        let group = NetworkGroup::new(
            "test",
            regions(&["us-west-2", "us-east-1", "eu-west-1"]),
            TopologyMode::HubAndSpoke,
            Some("us-west-2"),
            options(),
        )
        .unwrap();

        let plan = group.plan().unwrap();
        assert_eq!(plan.networks.len(), 3);
        assert_eq!(plan.networks[0].private_subnets.len(), 3);
        assert_eq!(plan.links.len(), 2);
        assert_eq!(plan.links[0].name, "test-peering-eu-west-1--us-west-2");
        assert_eq!(plan.routes.len(), 4);
        assert_eq!(plan.dns_associations.len(), 4);
    }

    #[test]
    fn test_single_region_builds_without_edges() {
        let provider = SimulatedProvider::new();
        let group =
            NetworkGroup::new("solo", regions(&["us-west-2"]), TopologyMode::FullMesh, None, options()).unwrap();

        let report = group.build(&provider).unwrap();
        assert!(report.edges.is_empty());
        assert_eq!(report.counts.networks_created, 1);
        assert!(report.outputs["us-west-2"].ready);
    }

    #[test]
    fn test_existing_network_with_other_block_is_rejected() {
        let provider = SimulatedProvider::new();
        let group =
            NetworkGroup::new("test", regions(&["us-west-2"]), TopologyMode::FullMesh, None, options()).unwrap();
        group.build(&provider).unwrap();

        let mut moved = regions(&["us-west-2"]);
        moved[0].cidr = "10.50.0.0/16".parse().unwrap();
        let group = NetworkGroup::new("test", moved, TopologyMode::FullMesh, None, options()).unwrap();
        let failure = group.build(&provider).unwrap_err();
        assert!(matches!(failure.error, NetworkError::Configuration(_)));
    }

    #[test]
    fn test_mismatched_network_fails_before_any_create() {
        let provider = SimulatedProvider::new();
        let group =
            NetworkGroup::new("test", regions(&["us-west-2"]), TopologyMode::FullMesh, None, options()).unwrap();
        group.build(&provider).unwrap();
        let mutations = provider.snapshot().mutations;

        // eu-west-1 sorts first and has no network yet
        let mut moved = regions(&["eu-west-1", "us-west-2"]);
        moved[1].cidr = "10.50.0.0/16".parse().unwrap();
        let group = NetworkGroup::new("test", moved, TopologyMode::FullMesh, None, options()).unwrap();
        let failure = group.build(&provider).unwrap_err();

        assert!(matches!(failure.error, NetworkError::Configuration(ValidationError::InvalidRegion { .. })));
        assert_eq!(failure.error.subject().as_deref(), Some("us-west-2"));
        let state = provider.snapshot();
        assert_eq!(state.networks.len(), 1);
        assert_eq!(state.mutations, mutations);
        assert_eq!(failure.report.counts.networks_created, 0);
    }

    #[test]
    fn test_dashed_region_ids_build_one_link_per_edge() {
        let provider = SimulatedProvider::new();
        let ids = ["a", "a-to", "b", "to-b"];
        let regions: Vec<Region> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Region::new(id, format!("10.{}.0.0/16", 60 + i).parse().unwrap()))
            .collect();
        let group = NetworkGroup::new("g", regions, TopologyMode::FullMesh, None, options()).unwrap();

        let report = group.build(&provider).unwrap();
        assert_eq!(report.links.len(), 6);
        assert_eq!(report.counts.links_created, 6);
        assert!(report.links.contains_key("g-peering-a-to--b"));
        assert!(report.links.contains_key("g-peering-a--to-b"));

        let state = provider.snapshot();
        assert_eq!(state.links.len(), 6);
        let names: BTreeSet<&str> = state.links.values().map(|l| l.name.as_str()).collect();
        assert_eq!(names.len(), 6);
        assert!(report.outputs.values().all(|o| o.ready));
    }

    #[test]
    fn test_teardown_report_noop() {
        assert!(TeardownReport::default().is_noop());
        let report = TeardownReport {
            links_removed: 1,
            ..TeardownReport::default()
        };
        assert!(!report.is_noop());
    }
}
