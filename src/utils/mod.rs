//! Shared utilities: input validation.

pub mod validation;

pub use validation::{validate_group_name, validate_region_id, validate_regions};
