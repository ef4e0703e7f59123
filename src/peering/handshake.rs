//! Link acceptance handshake.
//!
//! Acceptance is asynchronous on the provider side. The handshake is an
//! explicit state machine fed by observed provider statuses:
//!
//! ```text
//! Requested --(pending/provisioning)--> Pending
//! Requested | Pending --(active)--> Active
//! Requested | Pending --(rejected/failed/expired/deleted)--> Failed
//! Requested | Pending --(deadline)--> TimedOut
//! ```
//!
//! `Active`, `Failed` and `TimedOut` are terminal.

use log::debug;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::NetworkError;
use crate::provider::{LinkStatus, NetworkProvider};
use crate::topology::Edge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Requested,
    Pending,
    Active,
    Failed,
    TimedOut,
}

impl LinkState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Active | LinkState::Failed | LinkState::TimedOut)
    }
}

impl From<LinkStatus> for LinkState {
    fn from(status: LinkStatus) -> Self {
        match status {
            LinkStatus::InitiatingRequest => LinkState::Requested,
            LinkStatus::PendingAcceptance | LinkStatus::Provisioning => LinkState::Pending,
            LinkStatus::Active => LinkState::Active,
            LinkStatus::Rejected | LinkStatus::Failed | LinkStatus::Expired | LinkStatus::Deleted => {
                LinkState::Failed
            }
        }
    }
}

/// Bound and cadence of acceptance polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptancePolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        AcceptancePolicy {
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Acceptance handshake of one link
#[derive(Debug)]
pub struct Handshake<'a> {
    edge: &'a Edge,
    link_id: &'a str,
    state: LinkState,
    last_status: LinkStatus,
    polls: u32,
}

impl<'a> Handshake<'a> {
    /// Start from the status the provider returned on creation or acceptance
    pub fn new(edge: &'a Edge, link_id: &'a str, initial: LinkStatus) -> Self {
        Handshake {
            edge,
            link_id,
            state: LinkState::from(initial),
            last_status: initial,
            polls: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Feed one observed provider status. Terminal states are sticky.
    pub fn observe(&mut self, status: LinkStatus) -> LinkState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.last_status = status;
        self.state = LinkState::from(status);
        self.state
    }

    /// The deadline passed without a terminal status
    pub fn expire(&mut self) -> LinkState {
        if !self.state.is_terminal() {
            self.state = LinkState::TimedOut;
        }
        self.state
    }

    /// Poll the provider until the link is active, failed or the timeout elapses.
    ///
    /// # Returns
    /// * `Ok(())` once the link is active
    /// * `Err(NetworkError::Peering)` when the provider reports a terminal failure
    /// * `Err(NetworkError::PeeringTimeout)` when the bound elapses first
    pub fn wait<P: NetworkProvider + ?Sized>(
        &mut self,
        provider: &P,
        policy: &AcceptancePolicy,
    ) -> Result<(), NetworkError> {
        let started = Instant::now();

        loop {
            match self.state {
                LinkState::Active => return Ok(()),
                LinkState::Failed => {
                    return Err(NetworkError::Peering {
                        edge: self.edge.clone(),
                        link_id: self.link_id.to_string(),
                        status: self.last_status,
                    })
                }
                LinkState::TimedOut => {
                    return Err(NetworkError::PeeringTimeout {
                        edge: self.edge.clone(),
                        link_id: self.link_id.to_string(),
                        waited: started.elapsed(),
                        status: self.last_status,
                    })
                }
                LinkState::Requested | LinkState::Pending => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.timeout {
                self.expire();
                continue;
            }

            thread::sleep(policy.poll_interval.min(policy.timeout - elapsed));

            let status = provider
                .describe_link(self.link_id)
                .map_err(|e| NetworkError::provider(self.edge.to_string(), e))?;
            self.polls += 1;
            debug!(
                "Link {} for {} reports '{}' after {} poll(s)",
                self.link_id, self.edge, status, self.polls
            );
            self.observe(status);
        }
    }
}
