//! # RegionMesh - Peered multi-region virtual network convergence
//!
//! This library builds and converges a group of regional virtual networks that
//! are privately peered with each other, so workloads in any region can reach
//! and resolve services in peer regions without touching the public internet.
//!
//! ## Overview
//!
//! Given a list of regions and a topology, RegionMesh works out every
//! pairwise link the topology needs, creates (or reuses) one peering link per
//! pair, writes symmetric routes for each active link and wires private DNS
//! resolution across regions. Every stage is idempotent: running a build again
//! on unchanged input creates nothing new.
//!
//! ## Key Features
//!
//! - **Topologies**: full mesh (every pair linked) or hub-and-spoke
//! - **Deterministic edges**: pairs are canonicalised and sorted, so repeated
//!   builds are diff-free
//! - **Acceptance handshake**: explicit polling state machine with a bounded
//!   timeout
//! - **Route safety**: overlapping address blocks are rejected up front and
//!   conflicting route targets are never overwritten
//! - **DNS fan-out**: O(n²) associations for full mesh, O(n) for hub-and-spoke
//! - **Resumable**: a failed or interrupted build is fixed by re-running it
//!
//! ## Architecture
//!
//! - `config`: YAML configuration structures and validation errors
//! - `config_loader`: configuration file loading
//! - `topology`: regions, edges and the topology edge selector
//! - `ip`: address block derivation, subnet layout and overlap registry
//! - `provider`: the network provider seam and a file-backed simulated provider
//! - `peering`: peering connector and acceptance handshake
//! - `routes`: route table reconciliation
//! - `dns`: cross-region resolver fabric
//! - `orchestrator`: the `NetworkGroup` build and teardown driver
//! - `registry`: per-region output publishing
//! - `utils`: validation helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use regionmesh::{config_loader, orchestrator::NetworkGroup, provider::SimulatedProvider};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("regions.yaml"))?;
//! let group = NetworkGroup::from_config(&config)?;
//!
//! let provider = SimulatedProvider::load(Path::new("regionmesh_state.json"))?;
//! let report = group.build(&provider)?;
//! provider.save(Path::new("regionmesh_state.json"))?;
//!
//! for (region, output) in &report.outputs {
//!     println!("{} -> {} (ready: {})", region, output.network_id, output.ready);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! name: ml-platform
//! topology: hub_and_spoke   # or full_mesh
//! hub: us-west-2
//! regions:
//!   - id: us-west-2
//!     availability_zones: 3
//!   - id: us-east-1
//!     cidr: 10.1.0.0/16     # optional, derived from the id when absent
//!   - id: eu-west-1
//!     cross_region_dns: false
//! peering:
//!   acceptance_timeout: 10m
//!   poll_interval: 5s
//!   parallelism: 4
//! dns:
//!   enabled: true
//!   zone_suffix: internal
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`error::NetworkError`], whose variants follow the
//! failure taxonomy: configuration, peering, peering timeout, route conflict
//! and provider errors. Each carries the offending region or edge. The binary
//! and loader use `color_eyre` for reporting with context.

pub mod config;
pub mod config_loader;
pub mod error;

pub mod ip;
pub mod topology;
pub mod provider;
pub mod peering;
pub mod routes;
pub mod dns;
pub mod registry;
pub mod utils;
pub mod orchestrator;

pub use error::NetworkError;
pub use orchestrator::{BuildReport, NetworkGroup};
pub use topology::{Edge, Region, TopologyMode};
