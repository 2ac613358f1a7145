//! Port connectivity orchestrator - per-cycle strategy selection

use super::external_service::{CanYouSeeMeChecker, FallbackChecker};
use super::nat_reflection::{ReachabilityProber, TcpReflectionProber};
use super::resolver::{DnsEchoResolver, PublicIpResolver};
use super::tracker::AlertStateTracker;
use super::types::{ClientRole, CycleReport, PortCheckTarget, ProbeStrategy, RoleCheck};
use crate::alerting::{AlertSender, AlertmanagerClient};
use crate::config::{ClientMode, Settings};
use crate::{Error, Result};
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Periodic check that the node's P2P ports are reachable from the internet
///
/// Each call to [`run`](Self::run) is one cycle. For every locally managed
/// client it dials the port through our own public IP, falls back to an
/// external checker when that can't confirm the port is open, and fires an
/// alert when a port that was open is now closed.
pub struct PortConnectivityCheck {
    settings: Settings,
    tracker: AlertStateTracker,
    resolver: Box<dyn PublicIpResolver>,
    prober: Box<dyn ReachabilityProber>,
    fallback: Box<dyn FallbackChecker>,
    alerts: Box<dyn AlertSender>,
}

impl PortConnectivityCheck {
    /// Create a check with explicit strategies
    pub fn new(
        settings: Settings,
        resolver: Box<dyn PublicIpResolver>,
        prober: Box<dyn ReachabilityProber>,
        fallback: Box<dyn FallbackChecker>,
        alerts: Box<dyn AlertSender>,
    ) -> Self {
        Self {
            settings,
            tracker: AlertStateTracker::new(),
            resolver,
            prober,
            fallback,
            alerts,
        }
    }

    /// Create a check with the production strategies
    ///
    /// The port checker URL and timeout are taken from `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let fallback = CanYouSeeMeChecker::with_endpoint(
            &settings.port_checker_url,
            settings.port_checker_timeout(),
        )?;
        let alerts = AlertmanagerClient::new()?;

        Ok(Self::new(
            settings,
            Box::new(DnsEchoResolver::new()),
            Box::new(TcpReflectionProber::new()),
            Box::new(fallback),
            Box::new(alerts),
        ))
    }

    /// Settings this check reads
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current alert state
    pub fn tracker(&self) -> &AlertStateTracker {
        &self.tracker
    }

    /// Ports to check this cycle, in check order
    pub fn targets(&self) -> [PortCheckTarget; 2] {
        [
            PortCheckTarget {
                client_role: ClientRole::Execution,
                port: self.settings.execution_p2p_port(),
                is_locally_managed: self.settings.execution_client_mode() == ClientMode::Local,
            },
            PortCheckTarget {
                client_role: ClientRole::Consensus,
                port: self.settings.consensus_p2p_port(),
                is_locally_managed: self.settings.consensus_client_mode() == ClientMode::Local,
            },
        ]
    }

    /// Run one connectivity cycle
    ///
    /// Returns an empty report without any network I/O when alerting or this
    /// check is disabled, or when no client is locally managed. An
    /// inconclusive external check aborts the cycle with an error; roles not
    /// yet checked are skipped until the next cycle.
    pub async fn run(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        if !self.settings.alerting_enabled() {
            return Ok(report);
        }
        if !self.settings.port_check_enabled() {
            return Ok(report);
        }

        let targets: Vec<PortCheckTarget> = self
            .targets()
            .into_iter()
            .filter(|t| t.is_locally_managed)
            .collect();
        if targets.is_empty() {
            debug!("No locally managed clients, skipping port connectivity check");
            return Ok(report);
        }

        info!("Checking port connectivity...");

        let public_ip = match self.resolver.public_ip().await {
            Ok(ip) => Some(ip),
            Err(e) => {
                warn!("Could not resolve public IP, using external checker only: {}", e);
                None
            }
        };

        for target in targets {
            let check = self.check_target(target, public_ip).await?;
            report.checks.push(check);
        }

        Ok(report)
    }

    async fn check_target(
        &mut self,
        target: PortCheckTarget,
        public_ip: Option<IpAddr>,
    ) -> Result<RoleCheck> {
        let role = target.client_role;
        let port = target.port;

        let reflected = match public_ip {
            Some(ip) => self.prober.is_port_reachable(ip, port).await,
            None => false,
        };

        let (open, decided_by) = if reflected {
            (true, ProbeStrategy::NatReflection)
        } else {
            debug!("NAT reflection did not confirm port {}, asking external checker", port);
            let result = self.fallback.check_port(port).await.map_err(Error::from)?;
            (result.open, ProbeStrategy::ExternalService)
        };

        let transition = self.tracker.observe(role, port, open);
        let alert_fired = transition.should_alert();
        if alert_fired {
            if let Err(e) = self.alerts.alert_port_not_open(&self.settings, role, port).await {
                warn!("Could not send {}ClientP2PPortNotOpen alert: {}", role, e);
            }
        }

        Ok(RoleCheck {
            role,
            port,
            open,
            decided_by,
            alert_fired,
        })
    }
}
