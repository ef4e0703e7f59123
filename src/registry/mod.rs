//! # Output Registry Module
//!
//! Publishes the per-region network handles a build produced, for the cluster
//! and tenant provisioners that run after RegionMesh.
//!
//! ## Readiness
//!
//! Each region carries a `ready` flag. It is true only when the region's
//! network exists, every edge touching the region has an active link with
//! routes in both directions, and cross-region resolution has been wired.
//! Consumers should not schedule workloads that need peer regions on a region
//! that is not ready.
//!
//! ## File Layout
//!
//! The registry is written as pretty-printed JSON, by default to
//! `regionmesh_output/outputs.json`:
//!
//! ```json
//! {
//!   "group": "ml-platform",
//!   "topology": "full_mesh",
//!   "generated_at": "2026-01-01T00:00:00Z",
//!   "regions": {
//!     "us-east-1": {
//!       "network_id": "vpc-00000005",
//!       "cidr": "10.1.0.0/16",
//!       "route_table_id": "rtb-00000006",
//!       "public_subnet_id": "subnet-00000007",
//!       "private_subnet_ids": ["subnet-00000008"],
//!       "ready": true
//!     }
//!   },
//!   "links": {
//!     "ml-platform-peering-us-east-1--us-west-2": "pcx-0000000d"
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use color_eyre::eyre::WrapErr;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::TopologyMode;
use crate::provider::NetworkHandle;

/// Handles and readiness of one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOutput {
    pub network_id: String,
    pub cidr: Ipv4Net,
    pub route_table_id: String,
    pub public_subnet_id: String,
    pub private_subnet_ids: Vec<String>,
    pub ready: bool,
}

impl RegionOutput {
    pub fn from_handle(handle: &NetworkHandle, ready: bool) -> Self {
        RegionOutput {
            network_id: handle.network_id.clone(),
            cidr: handle.cidr,
            route_table_id: handle.route_table_id.clone(),
            public_subnet_id: handle.public_subnet_id.clone(),
            private_subnet_ids: handle.private_subnet_ids.clone(),
            ready,
        }
    }
}

/// Everything downstream provisioners read about a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRegistry {
    pub group: String,
    pub topology: TopologyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Keyed by region id
    pub regions: BTreeMap<String, RegionOutput>,
    /// Link name to link id
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

impl OutputRegistry {
    /// Regions whose wiring has fully converged
    pub fn ready_regions(&self) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|(_, output)| output.ready)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn all_ready(&self) -> bool {
        !self.regions.is_empty() && self.regions.values().all(|output| output.ready)
    }
}

/// Write the registry as pretty JSON, creating parent directories
pub fn write_outputs(registry: &OutputRegistry, path: &Path) -> color_eyre::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create output directory {:?}", parent))?;
        }
    }

    let json = serde_json::to_string_pretty(registry).wrap_err("Failed to serialize outputs")?;
    fs::write(path, json).wrap_err_with(|| format!("Failed to write outputs to {:?}", path))?;
    Ok(())
}

pub fn read_outputs(path: &Path) -> color_eyre::Result<OutputRegistry> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read outputs from {:?}", path))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("Failed to parse outputs in {:?}", path))
}
