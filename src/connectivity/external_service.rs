//! Third-party port checker
//!
//! When the NAT reflection probe can't confirm a port is open, an outside
//! service is asked to connect to us instead. The default implementation
//! submits the canyouseeme.org form and reads the verdict out of the HTML,
//! so it depends on markup we don't control; anything it can't classify is
//! reported as an error rather than guessed.

use super::types::{ConnectivityError, PortReachability};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default port checker endpoint (the form posts to itself)
pub const DEFAULT_PORT_CHECKER_URL: &str = "https://canyouseeme.org/";

/// Default request timeout for the port checker
pub const DEFAULT_PORT_CHECKER_TIMEOUT: Duration = Duration::from_secs(15);

/// The service rejects clients that don't look like a browser
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Marker present in the page when the port accepted a connection
const SUCCESS_MARKER: &str = "Success:";

/// Marker present in the page when the connection failed
const FAILURE_MARKER: &str = "Error:";

const RESULT_START: &str = "<div id=\"result\">";
const RESULT_END: &str = "</div>";

/// Authoritative reachability check performed from outside our network
#[async_trait]
pub trait FallbackChecker: Send + Sync {
    /// Ask whether `port` on our public address accepts connections
    ///
    /// An error means the check was inconclusive, not that the port is closed.
    async fn check_port(&self, port: u16) -> Result<PortReachability, ConnectivityError>;
}

/// Port checker backed by the canyouseeme.org web form
#[derive(Debug, Clone)]
pub struct CanYouSeeMeChecker {
    client: reqwest::Client,
    endpoint: String,
}

impl CanYouSeeMeChecker {
    /// Create a checker against the public service
    pub fn new() -> Result<Self, ConnectivityError> {
        Self::with_endpoint(DEFAULT_PORT_CHECKER_URL, DEFAULT_PORT_CHECKER_TIMEOUT)
    }

    /// Create a checker against a custom endpoint
    ///
    /// The timeout bounds the whole request, including reading the body.
    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self, ConnectivityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Endpoint the form is posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FallbackChecker for CanYouSeeMeChecker {
    async fn check_port(&self, port: u16) -> Result<PortReachability, ConnectivityError> {
        info!("Asking {} to check port {}", self.endpoint, port);

        let port_value = port.to_string();
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("port", port_value.as_str()), ("submit", "Check")])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Port checker returned status {}", status);
            return Err(ConnectivityError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let result = classify_response(&body)?;

        debug!(
            "Port checker verdict for {}: open={} ({})",
            port, result.open, result.detail
        );
        Ok(result)
    }
}

/// Classify a port checker page as open or closed
pub fn classify_response(body: &str) -> Result<PortReachability, ConnectivityError> {
    let open = if body.contains(SUCCESS_MARKER) {
        true
    } else if body.contains(FAILURE_MARKER) {
        false
    } else {
        return Err(ConnectivityError::UnparseableResult);
    };

    Ok(PortReachability {
        open,
        detail: extract_result(body),
    })
}

/// Pull the verdict text out of the result `<div>`
///
/// Returns an empty string when the opening marker is missing. A missing
/// closing marker yields everything after the opening one, as-is.
pub fn extract_result(html: &str) -> String {
    let Some(start) = html.find(RESULT_START) else {
        return String::new();
    };
    let rest = &html[start + RESULT_START.len()..];

    match rest.find(RESULT_END) {
        Some(end) => rest[..end].trim().to_string(),
        None => rest.to_string(),
    }
}
