//! Minimal DNS client for "echo my IP" lookups
//!
//! Public IP discovery only needs one thing from DNS: ask a specific
//! resolver, addressed by IP literal, for the address records of a single
//! hostname. This module builds that query, sends it over UDP, and parses the
//! answer section, without touching the system resolver configuration.
//!
//! # Protocol Details
//!
//! Queries follow RFC 1035: a 12-byte header, one question with QCLASS IN,
//! recursion desired. An `A` query is sent first; if the answer carries no
//! address records an `AAAA` query follows on the same socket.

use super::types::ConnectivityError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// DNS header length in bytes
pub(crate) const DNS_HEADER_LEN: usize = 12;

/// Internet class
pub(crate) const DNS_CLASS_IN: u16 = 1;

/// Recursion desired flag
const DNS_FLAG_RD: u16 = 0x0100;

/// Response flag
const DNS_FLAG_QR: u16 = 0x8000;

/// Longest label allowed in a name
const MAX_LABEL_LEN: usize = 63;

/// Longest textual hostname allowed
const MAX_NAME_LEN: usize = 253;

/// Receive buffer size; EDNS is never requested so 512 is the protocol limit
const RECV_BUF_LEN: usize = 512;

/// Address record types we query for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DnsRecordType {
    /// IPv4 host address
    A = 1,
    /// IPv6 host address
    Aaaa = 28,
}

/// DNS response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum DnsResponseCode {
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NxDomain = 3,
    NotImplemented = 4,
    Refused = 5,
}

impl DnsResponseCode {
    pub(crate) fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NoError),
            1 => Some(Self::FormatError),
            2 => Some(Self::ServerFailure),
            3 => Some(Self::NxDomain),
            4 => Some(Self::NotImplemented),
            5 => Some(Self::Refused),
            _ => None,
        }
    }

    pub(crate) fn to_error_message(self) -> &'static str {
        match self {
            Self::NoError => "No error",
            Self::FormatError => "Format error",
            Self::ServerFailure => "Server failure",
            Self::NxDomain => "No such domain (NXDOMAIN)",
            Self::NotImplemented => "Not implemented",
            Self::Refused => "Query refused",
        }
    }
}

/// Look up the address records of `hostname` by asking `resolver` directly
///
/// The whole exchange (both the `A` and the `AAAA` attempt) is bounded by
/// `timeout`. An empty vector means the resolver answered but had no
/// address records for the name.
pub async fn lookup_host(
    resolver: SocketAddr,
    hostname: &str,
    timeout: Duration,
) -> Result<Vec<IpAddr>, ConnectivityError> {
    tokio::time::timeout(timeout, lookup_host_inner(resolver, hostname))
        .await
        .map_err(|_| ConnectivityError::Timeout)?
}

async fn lookup_host_inner(
    resolver: SocketAddr,
    hostname: &str,
) -> Result<Vec<IpAddr>, ConnectivityError> {
    let bind_addr = match resolver {
        SocketAddr::V4(_) => "0.0.0.0:0",
        SocketAddr::V6(_) => "[::]:0",
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(resolver).await?;

    for record_type in [DnsRecordType::A, DnsRecordType::Aaaa] {
        let addrs = exchange(&socket, hostname, record_type).await?;
        if !addrs.is_empty() {
            return Ok(addrs);
        }
        debug!("{} has no {:?} records at {}", hostname, record_type, resolver);
    }

    Ok(Vec::new())
}

/// Send one query on a connected socket and wait for its answer
async fn exchange(
    socket: &UdpSocket,
    hostname: &str,
    record_type: DnsRecordType,
) -> Result<Vec<IpAddr>, ConnectivityError> {
    let id: u16 = rand::random();
    let query = build_dns_query(id, hostname, record_type)?;
    socket.send(&query).await?;
    debug!("Sent DNS {:?} query for {} (id {})", record_type, hostname, id);

    let mut buf = [0u8; RECV_BUF_LEN];
    loop {
        let received = socket.recv(&mut buf).await?;
        let response = &buf[..received];

        // Late answers to an earlier query on this socket are skipped
        if response.len() >= 2 && u16::from_be_bytes([response[0], response[1]]) != id {
            debug!("Ignoring DNS response with stale id");
            continue;
        }

        return parse_dns_response(response, id, record_type);
    }
}

/// Build a recursive DNS query packet for a single question
pub(crate) fn build_dns_query(
    id: u16,
    hostname: &str,
    record_type: DnsRecordType,
) -> Result<Vec<u8>, ConnectivityError> {
    let name = hostname.strip_suffix('.').unwrap_or(hostname);
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ConnectivityError::Dns(format!(
            "Invalid hostname length: {}",
            name.len()
        )));
    }

    let mut query = Vec::with_capacity(DNS_HEADER_LEN + name.len() + 6);

    // Header
    query.extend_from_slice(&id.to_be_bytes());
    query.extend_from_slice(&DNS_FLAG_RD.to_be_bytes());
    query.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    query.extend_from_slice(&[0u8; 6]); // ANCOUNT, NSCOUNT, ARCOUNT

    // Question name as length-prefixed labels
    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(ConnectivityError::Dns(format!(
                "Invalid label in hostname {:?}",
                hostname
            )));
        }
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0);

    query.extend_from_slice(&(record_type as u16).to_be_bytes());
    query.extend_from_slice(&DNS_CLASS_IN.to_be_bytes());

    Ok(query)
}

/// Parse a DNS response and collect the addresses of the queried type
pub(crate) fn parse_dns_response(
    response: &[u8],
    expected_id: u16,
    record_type: DnsRecordType,
) -> Result<Vec<IpAddr>, ConnectivityError> {
    if response.len() < DNS_HEADER_LEN {
        return Err(ConnectivityError::InvalidResponse(format!(
            "Response too short: {} bytes (expected at least {})",
            response.len(),
            DNS_HEADER_LEN
        )));
    }

    let id = read_u16(response, 0)?;
    if id != expected_id {
        return Err(ConnectivityError::InvalidResponse(format!(
            "Transaction id mismatch: got {}, expected {}",
            id, expected_id
        )));
    }

    let flags = read_u16(response, 2)?;
    if flags & DNS_FLAG_QR == 0 {
        return Err(ConnectivityError::InvalidResponse(
            "Received query instead of response".to_string(),
        ));
    }

    let rcode = (flags & 0x000f) as u8;
    match DnsResponseCode::from_u8(rcode) {
        Some(DnsResponseCode::NoError) => {}
        Some(code) => return Err(ConnectivityError::Dns(code.to_error_message().to_string())),
        None => return Err(ConnectivityError::Dns(format!("Unknown response code: {}", rcode))),
    }

    let question_count = read_u16(response, 4)?;
    let answer_count = read_u16(response, 6)?;

    let mut offset = DNS_HEADER_LEN;
    for _ in 0..question_count {
        offset = skip_name(response, offset)?;
        offset += 4; // QTYPE + QCLASS
    }

    let mut addrs = Vec::new();
    for _ in 0..answer_count {
        offset = skip_name(response, offset)?;

        let rtype = read_u16(response, offset)?;
        let class = read_u16(response, offset + 2)?;
        // TTL at offset + 4..8 is not needed
        let rdata_len = read_u16(response, offset + 8)? as usize;
        offset += 10;

        let rdata = response.get(offset..offset + rdata_len).ok_or_else(|| {
            ConnectivityError::InvalidResponse("Answer data truncated".to_string())
        })?;
        offset += rdata_len;

        if class != DNS_CLASS_IN || rtype != record_type as u16 {
            continue;
        }

        match (record_type, rdata_len) {
            (DnsRecordType::A, 4) => {
                addrs.push(IpAddr::V4(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3])));
            }
            (DnsRecordType::Aaaa, 16) => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(rdata);
                addrs.push(IpAddr::V6(Ipv6Addr::from(octets)));
            }
            _ => {
                return Err(ConnectivityError::InvalidResponse(format!(
                    "Bad {:?} record length: {}",
                    record_type, rdata_len
                )));
            }
        }
    }

    Ok(addrs)
}

/// Return the offset just past an encoded name, honouring compression pointers
fn skip_name(buf: &[u8], mut offset: usize) -> Result<usize, ConnectivityError> {
    loop {
        let len = *buf.get(offset).ok_or_else(|| {
            ConnectivityError::InvalidResponse("Name runs past end of packet".to_string())
        })? as usize;

        match len & 0xc0 {
            0x00 if len == 0 => return Ok(offset + 1),
            0x00 => offset += 1 + len,
            0xc0 => {
                if offset + 1 >= buf.len() {
                    return Err(ConnectivityError::InvalidResponse(
                        "Truncated compression pointer".to_string(),
                    ));
                }
                return Ok(offset + 2);
            }
            _ => {
                return Err(ConnectivityError::InvalidResponse(format!(
                    "Unsupported label type: {:#04x}",
                    len
                )));
            }
        }
    }
}

fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ConnectivityError> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| ConnectivityError::InvalidResponse("Unexpected end of packet".to_string()))
}
