//! Common types for connectivity module

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which client a monitored P2P port belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ClientRole {
    /// Execution-layer client
    Execution,
    /// Consensus-layer client
    Consensus,
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRole::Execution => write!(f, "Execution"),
            ClientRole::Consensus => write!(f, "Consensus"),
        }
    }
}

/// A port to check, derived from settings once per cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCheckTarget {
    /// Owning client
    pub client_role: ClientRole,
    /// Configured P2P port
    pub port: u16,
    /// Whether the client is run by this node
    pub is_locally_managed: bool,
}

/// Outcome of a conclusive reachability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortReachability {
    /// Whether the port accepted a connection from outside
    pub open: bool,
    /// Human-readable detail reported by the checker (may be empty)
    pub detail: String,
}

/// Strategy that decided the final open/closed value for a port
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Direct TCP dial to our own public IP
    NatReflection,
    /// Third-party port checking service
    ExternalService,
}

/// Result of checking one role within a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCheck {
    /// Role that was checked
    pub role: ClientRole,
    /// Port that was checked
    pub port: u16,
    /// Final reachability
    pub open: bool,
    /// Strategy that produced `open`
    pub decided_by: ProbeStrategy,
    /// Whether this observation fired an alert
    pub alert_fired: bool,
}

/// Summary of one connectivity cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Roles checked, in check order
    pub checks: Vec<RoleCheck>,
}

impl CycleReport {
    /// Look up the check for a role, if it ran
    pub fn for_role(&self, role: ClientRole) -> Option<&RoleCheck> {
        self.checks.iter().find(|c| c.role == role)
    }

    /// Whether no role was checked (early exit)
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Errors that can occur while probing connectivity
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// Network timeout waiting for a response
    #[error("Request timed out")]
    Timeout,

    /// DNS server reported a failure
    #[error("DNS error: {0}")]
    Dns(String),

    /// Malformed or unexpected response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Every public IP resolver failed
    #[error("all public IP resolvers failed; last error: {last}")]
    AllResolversFailed {
        /// Failure reported by the last resolver tried
        last: Box<ConnectivityError>,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Port checker answered with a non-200 status
    #[error("Port checker returned HTTP status {0}")]
    HttpStatus(u16),

    /// Port checker body contained neither result marker
    #[error("unable to parse result; unexpected response")]
    UnparseableResult,

    /// IO error during communication
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
