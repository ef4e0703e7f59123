use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ip::region_to_cidr;
use crate::topology::{ProviderContext, Region};

/// Default number of availability zones per region network
pub const DEFAULT_AVAILABILITY_ZONES: u8 = 3;

/// Topology modes for a network group
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopologyMode {
    /// Every region peers with every other region
    #[default]
    FullMesh,
    /// Only the hub peers with the other regions; spokes do not peer directly
    HubAndSpoke,
}

impl std::fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyMode::FullMesh => write!(f, "full_mesh"),
            TopologyMode::HubAndSpoke => write!(f, "hub_and_spoke"),
        }
    }
}

/// Network group configuration, as read from YAML
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Group name, used as the prefix of every resource name
    pub name: String,
    #[serde(default)]
    pub topology: TopologyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<String>,
    pub regions: Vec<RegionConfig>,
    #[serde(default)]
    pub peering: PeeringConfig,
    #[serde(default)]
    pub dns: DnsConfig,
}

impl Config {
    /// Validate group-level settings.
    ///
    /// Region membership, topology and address block checks happen when the
    /// `NetworkGroup` is assembled, since they need the resolved CIDRs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        crate::utils::validation::validate_group_name(&self.name)?;

        if self.regions.is_empty() {
            return Err(ValidationError::NoRegions);
        }

        self.peering.validate()?;

        if self.dns.enabled && self.dns.zone_suffix.trim().is_empty() {
            return Err(ValidationError::InvalidDns(
                "zone_suffix cannot be empty when dns is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve configured regions into `Region` values.
    ///
    /// Regions without an explicit `cidr` get the deterministic block for their id.
    pub fn resolve_regions(&self) -> Vec<Region> {
        self.regions.iter().map(RegionConfig::to_region).collect()
    }
}

/// A single region entry
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegionConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<Ipv4Net>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<u8>,
    /// Whether this region takes part in cross-region name resolution (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_region_dns: Option<bool>,
}

impl RegionConfig {
    pub fn to_region(&self) -> Region {
        let cidr = self.cidr.unwrap_or_else(|| region_to_cidr(&self.id));
        Region {
            id: self.id.clone(),
            cidr,
            context: ProviderContext {
                provider_region: self.id.clone(),
                availability_zones: self.availability_zones.unwrap_or(DEFAULT_AVAILABILITY_ZONES),
                cross_region_dns: self.cross_region_dns.unwrap_or(true),
            },
        }
    }
}

/// Peering link settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeeringConfig {
    /// Upper bound on waiting for a link to leave the pending state
    #[serde(with = "humantime_serde", default = "default_acceptance_timeout")]
    pub acceptance_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Number of edges converged concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

impl PeeringConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.acceptance_timeout.is_zero() {
            return Err(ValidationError::InvalidPeering(
                "acceptance_timeout must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ValidationError::InvalidPeering(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval > self.acceptance_timeout {
            return Err(ValidationError::InvalidPeering(format!(
                "poll_interval ({:?}) cannot exceed acceptance_timeout ({:?})",
                self.poll_interval, self.acceptance_timeout
            )));
        }
        if self.parallelism == 0 {
            return Err(ValidationError::InvalidPeering(
                "parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cross-region DNS settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DnsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Private zone suffix; region `r` owns zone `r.<suffix>`
    #[serde(default = "default_zone_suffix")]
    pub zone_suffix: String,
}

fn default_acceptance_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_parallelism() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_zone_suffix() -> String {
    "internal".to_string()
}

/// Default implementations
impl Default for PeeringConfig {
    fn default() -> Self {
        Self {
            acceptance_timeout: default_acceptance_timeout(),
            poll_interval: default_poll_interval(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zone_suffix: default_zone_suffix(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Region list cannot be empty")]
    NoRegions,
    #[error("Invalid group name '{name}': {reason}")]
    InvalidGroupName { name: String, reason: String },
    #[error("Invalid region '{region}': {reason}")]
    InvalidRegion { region: String, reason: String },
    #[error("Duplicate region id '{region}'")]
    DuplicateRegion { region: String },
    #[error("Address block {first_cidr} of region '{first}' overlaps {second_cidr} of region '{second}'")]
    CidrOverlap {
        first: String,
        first_cidr: Ipv4Net,
        second: String,
        second_cidr: Ipv4Net,
    },
    #[error("Invalid hub '{hub}': {reason}")]
    InvalidHub { hub: String, reason: String },
    #[error("Edges {first} and {second} both map to link name '{name}'")]
    LinkNameCollision { name: String, first: String, second: String },
    #[error("Topology {mode} requires a hub region")]
    MissingHub { mode: TopologyMode },
    #[error("Invalid subnet layout for region '{region}': {reason}")]
    InvalidSubnets { region: String, reason: String },
    #[error("Invalid peering configuration: {0}")]
    InvalidPeering(String),
    #[error("Invalid dns configuration: {0}")]
    InvalidDns(String),
}

impl ValidationError {
    /// The region (or hub, or group) the error is about, if any
    pub fn subject(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidGroupName { name, .. } => Some(name),
            ValidationError::InvalidRegion { region, .. }
            | ValidationError::DuplicateRegion { region }
            | ValidationError::InvalidSubnets { region, .. } => Some(region),
            ValidationError::CidrOverlap { first, .. } => Some(first),
            ValidationError::InvalidHub { hub, .. } => Some(hub),
            ValidationError::LinkNameCollision { first, .. } => Some(first),
            ValidationError::NoRegions
            | ValidationError::MissingHub { .. }
            | ValidationError::InvalidPeering(_)
            | ValidationError::InvalidDns(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing_with_defaults() {
        let yaml = r#"
name: ml-platform
regions:
  - id: us-west-2
  - id: us-east-1
    cidr: 10.50.0.0/16
    availability_zones: 2
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.topology, TopologyMode::FullMesh);
        assert_eq!(config.hub, None);
        assert_eq!(config.peering.acceptance_timeout, Duration::from_secs(600));
        assert_eq!(config.peering.poll_interval, Duration::from_secs(5));
        assert_eq!(config.peering.parallelism, 1);
        assert!(config.dns.enabled);
        assert_eq!(config.dns.zone_suffix, "internal");

        let regions = config.resolve_regions();
        assert_eq!(regions[0].cidr, "10.0.0.0/16".parse::<Ipv4Net>().unwrap());
        assert_eq!(regions[0].context.availability_zones, DEFAULT_AVAILABILITY_ZONES);
        assert!(regions[0].context.cross_region_dns);
        assert_eq!(regions[1].cidr, "10.50.0.0/16".parse::<Ipv4Net>().unwrap());
        assert_eq!(regions[1].context.availability_zones, 2);
    }

    #[test]
    fn test_hub_and_spoke_parsing() {
        let yaml = r#"
name: skypilot
topology: hub_and_spoke
hub: us-west-2
regions:
  - id: us-west-2
  - id: eu-west-1
    cross_region_dns: false
peering:
  acceptance_timeout: 2m
  poll_interval: 500ms
  parallelism: 4
dns:
  zone_suffix: corp.internal
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.topology, TopologyMode::HubAndSpoke);
        assert_eq!(config.hub.as_deref(), Some("us-west-2"));
        assert_eq!(config.peering.acceptance_timeout, Duration::from_secs(120));
        assert_eq!(config.peering.poll_interval, Duration::from_millis(500));
        assert_eq!(config.peering.parallelism, 4);
        assert_eq!(config.dns.zone_suffix, "corp.internal");
        assert!(!config.resolve_regions()[1].context.cross_region_dns);
    }

    #[test]
    fn test_peering_validation() {
        let mut config: Config = serde_yaml::from_str(
            r#"
name: test
regions:
  - id: us-west-2
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());

        config.peering.parallelism = 0;
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPeering(_))));

        config.peering.parallelism = 1;
        config.peering.poll_interval = Duration::from_secs(900);
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPeering(_))));

        config.peering.poll_interval = Duration::from_secs(1);
        config.peering.acceptance_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_regions_rejected() {
        let config: Config = serde_yaml::from_str("name: test\nregions: []\n").unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::NoRegions)));
    }

    #[test]
    fn test_invalid_cidr_fails_to_parse() {
        let yaml = r#"
name: test
regions:
  - id: us-west-2
    cidr: 10.0.0.0/33
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_topology_mode_display() {
        assert_eq!(TopologyMode::FullMesh.to_string(), "full_mesh");
        assert_eq!(TopologyMode::HubAndSpoke.to_string(), "hub_and_spoke");
    }
}
