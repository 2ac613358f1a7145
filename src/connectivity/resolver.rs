//! Public IP discovery via DNS echo resolvers
//!
//! Some authoritative DNS servers answer a special hostname with the address
//! the query came from. Asking them directly tells us the node's public IP
//! without depending on an HTTP service. Resolvers are addressed by IP literal
//! so that finding them never needs DNS itself.

use super::dns::lookup_host;
use super::types::ConnectivityError;
use async_trait::async_trait;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for a single resolver lookup
pub const DNS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A DNS server that echoes the caller's public IP for `echo_hostname`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverEndpoint {
    /// Resolver address (always an IP literal)
    pub address: SocketAddr,
    /// Hostname the resolver answers with the caller's address
    pub echo_hostname: &'static str,
}

impl ResolverEndpoint {
    /// Create an endpoint
    pub const fn new(address: SocketAddr, echo_hostname: &'static str) -> Self {
        Self {
            address,
            echo_hostname,
        }
    }
}

/// Well-known echo resolvers, tried in order
pub const PUBLIC_IP_RESOLVERS: &[ResolverEndpoint] = &[
    // OpenDNS primary
    ResolverEndpoint::new(
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222)), 53),
        "myip.opendns.com",
    ),
    // OpenDNS secondary
    ResolverEndpoint::new(
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(208, 67, 220, 220)), 53),
        "myip.opendns.com",
    ),
    // Google ns1
    ResolverEndpoint::new(
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(216, 239, 32, 10)), 53),
        "o-o.myaddr.l.google.com",
    ),
];

/// Discovers the node's public IP address
#[async_trait]
pub trait PublicIpResolver: Send + Sync {
    /// Return the node's public IP
    async fn public_ip(&self) -> Result<IpAddr, ConnectivityError>;
}

/// Resolver that queries DNS echo endpoints directly over UDP
#[derive(Debug, Clone)]
pub struct DnsEchoResolver {
    endpoints: Vec<ResolverEndpoint>,
    lookup_timeout: Duration,
}

impl DnsEchoResolver {
    /// Create a resolver over the default endpoint list
    pub fn new() -> Self {
        Self::with_endpoints(PUBLIC_IP_RESOLVERS.to_vec(), DNS_LOOKUP_TIMEOUT)
    }

    /// Create a resolver over a custom endpoint list
    pub fn with_endpoints(endpoints: Vec<ResolverEndpoint>, lookup_timeout: Duration) -> Self {
        Self {
            endpoints,
            lookup_timeout,
        }
    }

    /// Endpoints in query order
    pub fn endpoints(&self) -> &[ResolverEndpoint] {
        &self.endpoints
    }
}

impl Default for DnsEchoResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PublicIpResolver for DnsEchoResolver {
    async fn public_ip(&self) -> Result<IpAddr, ConnectivityError> {
        let timeout = self.lookup_timeout;
        resolve_first(&self.endpoints, |endpoint| async move {
            lookup_host(endpoint.address, endpoint.echo_hostname, timeout).await
        })
        .await
    }
}

/// Try each endpoint in order and return the first address any of them yields
///
/// An endpoint fails when the lookup errors or returns no addresses. Later
/// endpoints are not queried once one succeeds.
pub async fn resolve_first<F, Fut>(
    endpoints: &[ResolverEndpoint],
    mut lookup: F,
) -> Result<IpAddr, ConnectivityError>
where
    F: FnMut(ResolverEndpoint) -> Fut,
    Fut: Future<Output = Result<Vec<IpAddr>, ConnectivityError>>,
{
    let mut last_error = ConnectivityError::Dns("no resolvers configured".to_string());

    for endpoint in endpoints {
        debug!(
            "Querying {} for {}",
            endpoint.address, endpoint.echo_hostname
        );

        match lookup(*endpoint).await {
            Ok(addrs) => match addrs.first() {
                Some(ip) => {
                    info!("Public IP resolved: {} (from {})", ip, endpoint.address);
                    return Ok(*ip);
                }
                None => {
                    debug!("{} returned no addresses", endpoint.address);
                    last_error = ConnectivityError::Dns(format!(
                        "{} returned no addresses for {}",
                        endpoint.address, endpoint.echo_hostname
                    ));
                }
            },
            Err(e) => {
                debug!("Resolver {} failed: {}", endpoint.address, e);
                last_error = e;
            }
        }
    }

    warn!("All public IP resolvers failed");
    Err(ConnectivityError::AllResolversFailed {
        last: Box::new(last_error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolvers_are_ip_literals() {
        assert_eq!(PUBLIC_IP_RESOLVERS.len(), 3);
        for endpoint in PUBLIC_IP_RESOLVERS {
            assert_eq!(endpoint.address.port(), 53);
            assert!(
                endpoint.address.to_string().parse::<SocketAddr>().is_ok(),
                "{} should be an IP literal",
                endpoint.address
            );
        }
        assert_eq!(PUBLIC_IP_RESOLVERS[0].echo_hostname, "myip.opendns.com");
        assert_eq!(PUBLIC_IP_RESOLVERS[2].echo_hostname, "o-o.myaddr.l.google.com");
    }

    #[test]
    fn test_default_resolver_uses_static_list() {
        let resolver = DnsEchoResolver::default();
        assert_eq!(resolver.endpoints(), PUBLIC_IP_RESOLVERS);
    }

    #[tokio::test]
    async fn test_resolve_first_with_no_endpoints() {
        let result = resolve_first(&[], |_| async { Ok(Vec::new()) }).await;
        assert!(matches!(
            result,
            Err(ConnectivityError::AllResolversFailed { .. })
        ));
    }
}
