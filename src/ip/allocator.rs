//! Address block allocation logic.
//!
//! This file derives a region's address block from its id and splits a
//! block into one public subnet and one private subnet per availability zone.

use ipnet::Ipv4Net;
use sha2::{Digest, Sha256};
use std::net::Ipv4Addr;

/// Well-known regions and their fixed second octet (10.N.0.0/16)
const KNOWN_REGIONS: &[(&str, u8)] = &[
    ("us-west-2", 0),
    ("us-east-1", 1),
    ("eu-west-1", 2),
    ("us-east-2", 3),
    ("us-west-1", 4),
    ("eu-central-1", 5),
    ("eu-west-2", 6),
    ("eu-west-3", 7),
    ("eu-north-1", 8),
    ("ap-southeast-1", 9),
    ("ap-southeast-2", 10),
    ("ap-northeast-1", 11),
    ("ap-northeast-2", 12),
    ("ap-south-1", 13),
    ("sa-east-1", 14),
    ("ca-central-1", 15),
];

/// Second octets 100..=199 are reserved for hashed region ids
const HASHED_OCTET_BASE: u32 = 100;
const HASHED_OCTET_RANGE: u32 = 100;

/// Prefix length of the public subnet carved from the end of each block
pub const PUBLIC_SUBNET_PREFIX: u8 = 28;

/// Errors from splitting a region block into subnets
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubnetError {
    #[error("Address block {cidr} is too small: at least a /{min} is required")]
    TooSmall { cidr: Ipv4Net, min: u8 },

    #[error("Address block {cidr} cannot provide {num_azs} private subnets next to the public /28")]
    CannotProvide { cidr: Ipv4Net, num_azs: u8 },

    #[error("At least one availability zone is required")]
    NoAvailabilityZones,
}

/// Public and private subnets of one region network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetLayout {
    pub public: Ipv4Net,
    pub private: Vec<Ipv4Net>,
}

/// Deterministic /16 block for a region id.
///
/// Known regions get a fixed block; any other id hashes into
/// 10.100.0.0/16 ..= 10.199.0.0/16.
///
/// # Examples
/// ```
/// use regionmesh::ip::region_to_cidr;
///
/// assert_eq!(region_to_cidr("us-east-1").to_string(), "10.1.0.0/16");
/// assert_eq!(region_to_cidr("me-central-1"), region_to_cidr("me-central-1"));
/// ```
pub fn region_to_cidr(region: &str) -> Ipv4Net {
    let second_octet = KNOWN_REGIONS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, octet)| *octet)
        .unwrap_or_else(|| hashed_octet(region));

    Ipv4Net::new(Ipv4Addr::new(10, second_octet, 0, 0), 16)
        .expect("16 is a valid IPv4 prefix length")
}

fn hashed_octet(region: &str) -> u8 {
    let digest = Sha256::digest(region.as_bytes());
    let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (HASHED_OCTET_BASE + value % HASHED_OCTET_RANGE) as u8
}

/// Split a region block into subnets
///
/// The public subnet is the last /28 of the block. Private subnets use the
/// smallest prefix that yields strictly more blocks than `num_azs` (so the
/// last block stays free for the public subnet) and take the first `num_azs`
/// contiguous blocks.
///
/// # Arguments
/// * `cidr` - The region's address block
/// * `num_azs` - Number of availability zones, one private subnet each
pub fn calculate_subnets(cidr: Ipv4Net, num_azs: u8) -> Result<SubnetLayout, SubnetError> {
    let cidr = cidr.trunc();

    if cidr.prefix_len() > PUBLIC_SUBNET_PREFIX {
        return Err(SubnetError::TooSmall { cidr, min: PUBLIC_SUBNET_PREFIX });
    }
    if num_azs == 0 {
        return Err(SubnetError::NoAvailabilityZones);
    }

    let last_block = u32::from(cidr.broadcast()) - ((1u32 << (32 - PUBLIC_SUBNET_PREFIX)) - 1);
    let public = Ipv4Net::new(Ipv4Addr::from(last_block), PUBLIC_SUBNET_PREFIX)
        .map_err(|_| SubnetError::TooSmall { cidr, min: PUBLIC_SUBNET_PREFIX })?;

    for prefix in cidr.prefix_len()..=PUBLIC_SUBNET_PREFIX {
        let total_subnets = 1u64 << (prefix - cidr.prefix_len());
        if total_subnets > u64::from(num_azs) {
            let private: Vec<Ipv4Net> = cidr
                .subnets(prefix)
                .map_err(|_| SubnetError::CannotProvide { cidr, num_azs })?
                .take(usize::from(num_azs))
                .collect();
            return Ok(SubnetLayout { public, private });
        }
    }

    Err(SubnetError::CannotProvide { cidr, num_azs })
}
