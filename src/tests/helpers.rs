// Shared test fixtures: local mock HTTP and DNS servers

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::Mutex;

/// A request seen by the mock HTTP server
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub body: String,
}

/// Serve every request with a fixed status and body, recording what came in
pub async fn spawn_http_server(
    status: StatusCode,
    body: &'static str,
) -> (SocketAddr, Arc<Mutex<Vec<CapturedRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let captured_task = captured.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let io = TokioIo::new(stream);
            let captured = captured_task.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let captured = captured.clone();
                    async move {
                        let header = |name: &str| {
                            req.headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string)
                        };
                        let content_type = header("content-type");
                        let user_agent = header("user-agent");
                        let method = req.method().to_string();
                        let path = req.uri().path().to_string();
                        let bytes = req.into_body().collect().await?.to_bytes();

                        captured.lock().await.push(CapturedRequest {
                            method,
                            path,
                            content_type,
                            user_agent,
                            body: String::from_utf8_lossy(&bytes).to_string(),
                        });

                        Ok::<_, hyper::Error>(
                            Response::builder()
                                .status(status)
                                .body(Full::new(Bytes::from(body)))
                                .unwrap(),
                        )
                    }
                });

                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    (addr, captured)
}

/// How the mock DNS server answers
#[derive(Debug, Clone, Copy)]
pub enum DnsBehavior {
    /// Answer `A` queries with this address, `AAAA` queries with nothing
    Answer(Ipv4Addr),
    /// Answer `AAAA` queries with this address, `A` queries with nothing
    AnswerV6(Ipv6Addr),
    /// Answer every query with NXDOMAIN
    NxDomain,
    /// Never answer
    Silent,
}

/// Start a UDP DNS responder; returns its address and a query counter
pub async fn spawn_dns_server(behavior: DnsBehavior) -> (SocketAddr, Arc<AtomicUsize>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let queries = Arc::new(AtomicUsize::new(0));
    let queries_task = queries.clone();

    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            queries_task.fetch_add(1, Ordering::SeqCst);
            if let Some(response) = dns_response(&buf[..len], behavior) {
                let _ = socket.send_to(&response, peer).await;
            }
        }
    });

    (addr, queries)
}

fn dns_response(query: &[u8], behavior: DnsBehavior) -> Option<Vec<u8>> {
    let qtype = u16::from_be_bytes([query[query.len() - 4], query[query.len() - 3]]);

    let (flags, rdata): (u16, Option<Vec<u8>>) = match behavior {
        DnsBehavior::Silent => return None,
        DnsBehavior::NxDomain => (0x8183, None),
        DnsBehavior::Answer(ip) if qtype == 1 => (0x8180, Some(ip.octets().to_vec())),
        DnsBehavior::AnswerV6(ip) if qtype == 28 => (0x8180, Some(ip.octets().to_vec())),
        DnsBehavior::Answer(_) | DnsBehavior::AnswerV6(_) => (0x8180, None),
    };

    let mut response = Vec::new();
    response.extend_from_slice(&query[0..2]);
    response.extend_from_slice(&flags.to_be_bytes());
    response.extend_from_slice(&1u16.to_be_bytes());
    response.extend_from_slice(&(rdata.is_some() as u16).to_be_bytes());
    response.extend_from_slice(&[0u8; 4]);
    response.extend_from_slice(&query[12..]);

    if let Some(rdata) = rdata {
        response.extend_from_slice(&[0xc0, 0x0c]);
        response.extend_from_slice(&qtype.to_be_bytes());
        response.extend_from_slice(&[0, 1, 0, 0, 0, 30]);
        response.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        response.extend_from_slice(&rdata);
    }

    Some(response)
}
