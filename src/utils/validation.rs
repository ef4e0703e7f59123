//! Configuration validation utilities.
//!
//! These checks run before any provider call. Each failure names the offending
//! group, region or hub.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::ValidationError;
use crate::ip::{calculate_subnets, SubnetError};
use crate::topology::Region;

/// Group names become resource name prefixes
static GROUP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,62}$").expect("Invalid group name regex"));

/// Provider region identifiers, e.g. `us-west-2`, `europe-west4`
///
/// Never contains `--`, which separates the two ends of a link name.
static REGION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("Invalid region id regex"));

/// Validate a network group name
///
/// # Examples
/// ```
/// use regionmesh::utils::validation::validate_group_name;
///
/// assert!(validate_group_name("ml-platform").is_ok());
/// assert!(validate_group_name("ML Platform").is_err());
/// ```
pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    if GROUP_NAME.is_match(name) && !name.ends_with('-') {
        return Ok(());
    }
    Err(ValidationError::InvalidGroupName {
        name: name.to_string(),
        reason: "must be 1-63 lowercase letters, digits or '-', starting with a letter or digit"
            .to_string(),
    })
}

pub fn validate_region_id(id: &str) -> Result<(), ValidationError> {
    if REGION_ID.is_match(id) {
        return Ok(());
    }
    Err(ValidationError::InvalidRegion {
        region: id.to_string(),
        reason: "region ids are lowercase words separated by '-'".to_string(),
    })
}

/// Validate the region list of a group
///
/// Checks for:
/// - At least one region
/// - Well-formed and unique region ids
/// - Address blocks without host bits
/// - A subnet layout that fits each block
///
/// Pairwise overlap between blocks is checked separately by
/// [`crate::routes::check_cidr_overlap`].
pub fn validate_regions(regions: &[Region]) -> Result<(), ValidationError> {
    if regions.is_empty() {
        return Err(ValidationError::NoRegions);
    }

    let mut seen = HashSet::new();
    for region in regions {
        validate_region_id(&region.id)?;

        if !seen.insert(region.id.as_str()) {
            return Err(ValidationError::DuplicateRegion {
                region: region.id.clone(),
            });
        }

        if region.cidr.trunc() != region.cidr {
            return Err(ValidationError::InvalidRegion {
                region: region.id.clone(),
                reason: format!(
                    "address block {} has host bits set (did you mean {}?)",
                    region.cidr,
                    region.cidr.trunc()
                ),
            });
        }

        validate_subnet_layout(region)?;
    }

    Ok(())
}

fn validate_subnet_layout(region: &Region) -> Result<(), ValidationError> {
    calculate_subnets(region.cidr, region.context.availability_zones)
        .map(|_| ())
        .map_err(|e: SubnetError| ValidationError::InvalidSubnets {
            region: region.id.clone(),
            reason: e.to_string(),
        })
}
