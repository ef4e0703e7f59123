//! Route table reconciliation for active peering links.

pub mod reconciler;

pub use reconciler::{check_cidr_overlap, planned_routes, PlannedRoute, RouteOutcome, RouteReconciler};
