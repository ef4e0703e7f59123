//! Peering link management.
//!
//! `connector` creates or reuses the link for an edge; `handshake` drives
//! the asynchronous acceptance to a terminal state within a bounded time.

pub mod connector;
pub mod handshake;

pub use connector::{Link, PeeringConnector};
pub use handshake::{AcceptancePolicy, Handshake, LinkState};
