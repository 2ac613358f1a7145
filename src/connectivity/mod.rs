//! Connectivity module for P2P port reachability checks
//!
//! This module determines whether the node's P2P ports can be reached from
//! the internet using two strategies:
//! - NAT reflection (dial our own public IP, discovered via DNS echo)
//! - An external port checking service, as the authoritative fallback
//!
//! The orchestrator runs both per locally managed client and tracks
//! open/closed transitions so an alert fires only when a port closes.

// Submodules
pub mod dns;
pub mod external_service;
pub mod nat_reflection;
pub mod orchestrator;
pub mod resolver;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use types::{
    ClientRole, ConnectivityError, CycleReport, PortCheckTarget, PortReachability, ProbeStrategy,
    RoleCheck,
};

// Re-export strategies
pub use external_service::{CanYouSeeMeChecker, FallbackChecker};
pub use nat_reflection::{ReachabilityProber, TcpReflectionProber};
pub use orchestrator::PortConnectivityCheck;
pub use resolver::{DnsEchoResolver, PUBLIC_IP_RESOLVERS, PublicIpResolver, ResolverEndpoint};
pub use tracker::{AlertStateTracker, Transition};
