//! Address block registry.
//!
//! Tracks which region owns which block so overlapping blocks are caught
//! before any route is written.

use ipnet::Ipv4Net;

use crate::config::ValidationError;

/// Registry of region address blocks
#[derive(Debug, Default)]
pub struct CidrRegistry {
    /// Registered blocks in registration order
    assigned: Vec<(Ipv4Net, String)>,
}

impl CidrRegistry {
    pub fn new() -> Self {
        CidrRegistry { assigned: Vec::new() }
    }

    /// Register a block for a region
    ///
    /// Every registration is compared with every earlier one, so filling the
    /// registry is O(n²) in the number of regions. Registering the same block
    /// for the same region twice is accepted.
    pub fn register(&mut self, cidr: Ipv4Net, region: &str) -> Result<(), ValidationError> {
        for (existing, owner) in &self.assigned {
            if owner == region && *existing == cidr {
                return Ok(());
            }
            if blocks_overlap(existing, &cidr) {
                return Err(ValidationError::CidrOverlap {
                    first: owner.clone(),
                    first_cidr: *existing,
                    second: region.to_string(),
                    second_cidr: cidr,
                });
            }
        }
        self.assigned.push((cidr, region.to_string()));
        Ok(())
    }

    /// Region whose block contains the given address block
    pub fn get_region_for(&self, cidr: &Ipv4Net) -> Option<&str> {
        self.assigned
            .iter()
            .find(|(block, _)| block.contains(cidr))
            .map(|(_, owner)| owner.as_str())
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Two prefixes overlap exactly when one contains the other's network address
pub fn blocks_overlap(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_disjoint_blocks_register() {
        let mut registry = CidrRegistry::new();
        registry.register(net("10.0.0.0/16"), "us-west-2").unwrap();
        registry.register(net("10.1.0.0/16"), "us-east-1").unwrap();
        registry.register(net("10.2.0.0/16"), "eu-west-1").unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get_region_for(&net("10.1.4.0/24")), Some("us-east-1"));
        assert_eq!(registry.get_region_for(&net("10.9.0.0/24")), None);
    }

    #[test]
    fn test_identical_blocks_conflict() {
        let mut registry = CidrRegistry::new();
        registry.register(net("10.0.0.0/16"), "a").unwrap();
        let err = registry.register(net("10.0.0.0/16"), "b").unwrap_err();
        match err {
            ValidationError::CidrOverlap { first, second, .. } => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_nested_blocks_conflict() {
        let mut registry = CidrRegistry::new();
        registry.register(net("10.1.128.0/17"), "inner").unwrap();
        assert!(registry.register(net("10.0.0.0/8"), "outer").is_err());
    }

    #[test]
    fn test_same_region_reregistration_is_idempotent() {
        let mut registry = CidrRegistry::new();
        registry.register(net("10.0.0.0/16"), "a").unwrap();
        registry.register(net("10.0.0.0/16"), "a").unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_blocks_overlap() {
        assert!(blocks_overlap(&net("10.0.0.0/16"), &net("10.0.255.0/24")));
        assert!(!blocks_overlap(&net("10.0.0.0/16"), &net("10.1.0.0/16")));
    }
}
