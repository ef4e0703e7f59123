//! Edge selection.
//!
//! Turns a region list and topology mode into the set of pairwise links the
//! group needs. The hub-and-spoke edge set is a subset of the full-mesh one,
//! and both use the same canonical pair naming, so switching topologies only
//! adds or removes the difference.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ValidationError;
use crate::topology::types::{Edge, TopologyMode};

/// Compute the required edge set for a topology
///
/// # Arguments
/// * `region_ids` - Ids of all regions in the group
/// * `mode` - Full mesh or hub-and-spoke
/// * `hub` - Hub region id; required for hub-and-spoke, rejected for full mesh
///
/// # Returns
/// Edges sorted lexicographically on their sorted pair. A single region
/// yields an empty set.
pub fn select_edges(
    region_ids: &[String],
    mode: TopologyMode,
    hub: Option<&str>,
) -> Result<Vec<Edge>, ValidationError> {
    let mut edges = BTreeSet::new();

    match mode {
        TopologyMode::FullMesh => {
            if let Some(hub) = hub {
                return Err(ValidationError::InvalidHub {
                    hub: hub.to_string(),
                    reason: "a hub can only be used with the hub_and_spoke topology".to_string(),
                });
            }
            edges.extend(all_pairs(region_ids));
        }
        TopologyMode::HubAndSpoke => {
            let hub = hub.ok_or(ValidationError::MissingHub { mode })?;
            if !region_ids.iter().any(|id| id == hub) {
                return Err(ValidationError::InvalidHub {
                    hub: hub.to_string(),
                    reason: format!("hub must be one of the group's regions {:?}", region_ids),
                });
            }
            // Only the hub is connected to the other regions
            for spoke in region_ids {
                if let Some(edge) = Edge::new(hub, spoke) {
                    edges.insert(edge);
                }
            }
        }
    }

    Ok(edges.into_iter().collect())
}

/// Every unordered pair of distinct regions, sorted
pub fn all_pairs(region_ids: &[String]) -> Vec<Edge> {
    let mut pairs = BTreeSet::new();
    for (i, x) in region_ids.iter().enumerate() {
        for y in &region_ids[i + 1..] {
            if let Some(edge) = Edge::new(x, y) {
                pairs.insert(edge);
            }
        }
    }
    pairs.into_iter().collect()
}

/// Reject edge sets in which two edges derive the same link name
///
/// Links are found again by name, so a shared name would make one edge adopt
/// the other's link.
pub fn check_link_names(group: &str, edges: &[Edge]) -> Result<(), ValidationError> {
    let mut seen: BTreeMap<String, &Edge> = BTreeMap::new();
    for edge in edges {
        let name = edge.link_name(group);
        if let Some(first) = seen.get(&name) {
            return Err(ValidationError::LinkNameCollision {
                name,
                first: first.to_string(),
                second: edge.to_string(),
            });
        }
        seen.insert(name, edge);
    }
    Ok(())
}
