//! Alert delivery to Alertmanager
//!
//! Alerts are posted to the Alertmanager v2 API as a JSON array holding a
//! single alert. Nothing is sent when alerting is disabled in settings.

use crate::config::Settings;
use crate::connectivity::ClientRole;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// How long a critical alert stays active unless re-sent
pub const CRITICAL_ALERT_DURATION_MINS: i64 = 60;

/// Request timeout for the Alertmanager API
const ALERTMANAGER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Errors that can occur while delivering an alert
#[derive(Debug, Error)]
pub enum AlertError {
    /// HTTP transport error
    #[error("error posting alert: {0}")]
    Http(#[from] reqwest::Error),

    /// Alertmanager answered with a non-success status
    #[error("alertmanager rejected alert with status {status}")]
    Rejected {
        /// HTTP status code returned
        status: u16,
    },
}

/// Alert severity label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Needs action now
    Critical,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
        }
    }
}

/// Alert in the shape Alertmanager's `POST /api/v2/alerts` expects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostableAlert {
    /// Identifying labels (`alertname`, `severity`, extras)
    pub labels: BTreeMap<String, String>,
    /// Free-form annotations (`summary`, `description`)
    pub annotations: BTreeMap<String, String>,
    /// When the alert resolves unless re-sent
    pub ends_at: DateTime<Utc>,
}

impl PostableAlert {
    /// Build an alert with the standard labels and annotations
    pub fn new(
        name: &str,
        summary: &str,
        description: &str,
        severity: Severity,
        ends_at: DateTime<Utc>,
        extra_labels: &[(&str, String)],
    ) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("alertname".to_string(), name.to_string());
        labels.insert("severity".to_string(), severity.as_str().to_string());
        for (key, value) in extra_labels {
            labels.insert((*key).to_string(), value.clone());
        }

        let mut annotations = BTreeMap::new();
        annotations.insert("summary".to_string(), summary.to_string());
        annotations.insert("description".to_string(), description.to_string());

        Self {
            labels,
            annotations,
            ends_at,
        }
    }

    /// The `alertname` label
    pub fn name(&self) -> &str {
        self.labels.get("alertname").map(String::as_str).unwrap_or_default()
    }
}

/// Build the alert sent when a client's P2P port closes
pub fn port_not_open_alert(role: ClientRole, port: u16, now: DateTime<Utc>) -> PostableAlert {
    PostableAlert::new(
        &format!("{}ClientP2PPortNotOpen", role),
        &format!("{} client P2P port {} is not accessible", role, port),
        &format!(
            "The {} client P2P port {} is not accessible from the internet. \
             Check your router's port forwarding and firewall settings.",
            role.to_string().to_lowercase(),
            port
        ),
        Severity::Critical,
        now + Duration::minutes(CRITICAL_ALERT_DURATION_MINS),
        &[("port", port.to_string())],
    )
}

/// Delivers "port not open" alerts
#[async_trait]
pub trait AlertSender: Send + Sync {
    /// Notify that `role`'s P2P `port` is not reachable from the internet
    async fn alert_port_not_open(
        &self,
        settings: &Settings,
        role: ClientRole,
        port: u16,
    ) -> Result<(), AlertError>;
}

/// Alert sender posting to the Alertmanager configured in settings
#[derive(Debug, Clone)]
pub struct AlertmanagerClient {
    client: reqwest::Client,
}

impl AlertmanagerClient {
    /// Create a client
    pub fn new() -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(ALERTMANAGER_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Post one alert to the Alertmanager configured in `settings`
    pub async fn send_alert(
        &self,
        settings: &Settings,
        alert: &PostableAlert,
    ) -> Result<(), AlertError> {
        info!(
            "Sending alert for {}: {}",
            alert.name(),
            alert.annotations.get("summary").map(String::as_str).unwrap_or_default()
        );

        let url = format!("{}/api/v2/alerts", settings.alertmanager_url());
        let response = self
            .client
            .post(&url)
            .json(&[alert])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!("Alertmanager accepted {}", alert.name());
        Ok(())
    }
}

#[async_trait]
impl AlertSender for AlertmanagerClient {
    async fn alert_port_not_open(
        &self,
        settings: &Settings,
        role: ClientRole,
        port: u16,
    ) -> Result<(), AlertError> {
        if !settings.alerting_enabled() {
            info!("Alerting is disabled, not sending {}ClientP2PPortNotOpen.", role);
            return Ok(());
        }

        let alert = port_not_open_alert(role, port, Utc::now());
        self.send_alert(settings, &alert).await
    }
}
