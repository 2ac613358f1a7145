//! p2p-portcheck - public reachability monitor for blockchain client P2P ports
//!
//! This library checks whether the P2P listening ports of a node's locally
//! managed execution and consensus clients can be reached from the internet,
//! and raises an alert the moment a previously reachable port closes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alerting;
pub mod config;
pub mod connectivity;

/// Result type alias for portcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for portcheck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings could not be loaded or saved
    #[error("Config error: {0}")]
    Config(String),

    /// A connectivity check could not reach a conclusion
    #[error("error checking port connectivity: {0}")]
    Connectivity(#[from] connectivity::ConnectivityError),

    /// Alert delivery failed
    #[error("Alert error: {0}")]
    Alert(#[from] alerting::AlertError),
}

/// Initialize logging for the portcheck binary
pub fn init() {
    tracing_subscriber::fmt::init();
}

#[cfg(test)]
mod tests;
