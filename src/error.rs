//! Error taxonomy for network group convergence.
//!
//! Validation problems surface as [`NetworkError::Configuration`] before any
//! provider call is made. The remaining variants are raised while converging a
//! single edge or region and always name it.

use ipnet::Ipv4Net;
use std::time::Duration;

use crate::config::ValidationError;
use crate::provider::{LinkStatus, ProviderError};
use crate::topology::Edge;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ValidationError),

    /// The provider reports the link in a terminal state (rejected, failed, expired, deleted)
    #[error("Peering link {link_id} for edge {edge} is in terminal state '{status}'")]
    Peering {
        edge: Edge,
        link_id: String,
        status: LinkStatus,
    },

    #[error("Peering link {link_id} for edge {edge} was not accepted within {waited:?} (last state '{status}')")]
    PeeringTimeout {
        edge: Edge,
        link_id: String,
        waited: Duration,
        status: LinkStatus,
    },

    #[error("Route conflict in region '{region}': {destination} already targets {existing}, refusing to point it at {requested}")]
    RouteConflict {
        region: String,
        destination: Ipv4Net,
        existing: String,
        requested: String,
    },

    #[error("Provider error for {subject}: {source}")]
    Provider {
        subject: String,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to start edge worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl NetworkError {
    pub fn provider(subject: impl Into<String>, source: ProviderError) -> Self {
        NetworkError::Provider {
            subject: subject.into(),
            source,
        }
    }

    /// Identifier of the offending edge or region
    pub fn subject(&self) -> Option<String> {
        match self {
            NetworkError::Configuration(e) => e.subject().map(str::to_string),
            NetworkError::Peering { edge, .. } | NetworkError::PeeringTimeout { edge, .. } => {
                Some(edge.to_string())
            }
            NetworkError::RouteConflict { region, .. } => Some(region.clone()),
            NetworkError::Provider { subject, .. } => Some(subject.clone()),
            NetworkError::WorkerPool(_) => None,
        }
    }

    /// The edge this error belongs to, for per-edge failures
    pub fn edge(&self) -> Option<&Edge> {
        match self {
            NetworkError::Peering { edge, .. } | NetworkError::PeeringTimeout { edge, .. } => Some(edge),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_name_their_subject() {
        let edge = Edge::new("us-west-2", "eu-west-1").unwrap();

        let peering = NetworkError::Peering {
            edge: edge.clone(),
            link_id: "pcx-00000001".to_string(),
            status: LinkStatus::Rejected,
        };
        assert_eq!(peering.subject().as_deref(), Some("eu-west-1<->us-west-2"));
        assert!(peering.to_string().contains("rejected"));
        assert_eq!(peering.edge(), Some(&edge));

        let conflict = NetworkError::RouteConflict {
            region: "us-east-1".to_string(),
            destination: "10.2.0.0/16".parse().unwrap(),
            existing: "tgw-1234".to_string(),
            requested: "pcx-00000002".to_string(),
        };
        assert_eq!(conflict.subject().as_deref(), Some("us-east-1"));
        assert_eq!(conflict.edge(), None);

        let config: NetworkError = ValidationError::DuplicateRegion {
            region: "us-east-1".to_string(),
        }
        .into();
        assert_eq!(config.subject().as_deref(), Some("us-east-1"));
    }
}
