//! NAT reflection probe
//!
//! Dials our own public IP. If the router supports hairpin NAT the
//! connection is routed back to the forwarded port, which proves the
//! forwarding works. Routers without hairpin support make this probe report
//! "closed" even for correctly forwarded ports, so a negative result is never
//! final on its own.

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Timeout for the TCP dial
pub const PORT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes whether a host accepts TCP connections on a port
#[async_trait]
pub trait ReachabilityProber: Send + Sync {
    /// Return `true` only if a connection to `host:port` succeeded
    async fn is_port_reachable(&self, host: IpAddr, port: u16) -> bool;
}

/// Prober that opens a TCP connection and closes it immediately
#[derive(Debug, Clone)]
pub struct TcpReflectionProber {
    timeout: Duration,
}

impl TcpReflectionProber {
    /// Create a prober with the default dial timeout
    pub fn new() -> Self {
        Self::with_timeout(PORT_CHECK_TIMEOUT)
    }

    /// Create a prober with a custom dial timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpReflectionProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReachabilityProber for TcpReflectionProber {
    async fn is_port_reachable(&self, host: IpAddr, port: u16) -> bool {
        let addr = SocketAddr::new(host, port);
        dial_within(addr, self.timeout, TcpStream::connect(addr)).await
    }
}

/// Drive a pending connect to completion or until `limit` elapses
async fn dial_within<F>(addr: SocketAddr, limit: Duration, connect: F) -> bool
where
    F: Future<Output = io::Result<TcpStream>>,
{
    match tokio::time::timeout(limit, connect).await {
        Ok(Ok(stream)) => {
            drop(stream);
            debug!("NAT reflection dial to {} succeeded", addr);
            true
        }
        Ok(Err(e)) => {
            debug!("NAT reflection dial to {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("NAT reflection dial to {} timed out", addr);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = TcpReflectionProber::new();
        assert!(
            prober
                .is_port_reachable(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
                .await
        );
    }

    #[tokio::test]
    async fn test_closed_port() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = TcpReflectionProber::with_timeout(Duration::from_secs(2));
        assert!(
            !prober
                .is_port_reachable(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
                .await
        );
    }

    #[tokio::test]
    async fn test_stalled_dial_times_out() {
        // A connect that never completes stands in for a silently dropped SYN
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 30303);
        let stalled = std::future::pending::<io::Result<TcpStream>>();

        let started = tokio::time::Instant::now();
        assert!(!dial_within(addr, Duration::from_millis(100), stalled).await);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_failed_dial_is_unreachable() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 30303);
        let refused = async {
            Err::<TcpStream, _>(io::Error::from(io::ErrorKind::ConnectionRefused))
        };

        assert!(!dial_within(addr, Duration::from_secs(1), refused).await);
    }

    #[tokio::test]
    #[ignore = "depends on the host dropping traffic to TEST-NET-2"]
    async fn test_unroutable_address_times_out() {
        let prober = TcpReflectionProber::with_timeout(Duration::from_millis(200));
        let host = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));
        assert!(!prober.is_port_reachable(host, 30303).await);
    }
}
