//! Node settings consumed by the port connectivity check

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

/// Default P2P port of the execution client
pub const DEFAULT_EXECUTION_P2P_PORT: u16 = 30303;

/// Default P2P port of the consensus client
pub const DEFAULT_CONSENSUS_P2P_PORT: u16 = 9001;

/// Default alertmanager API port
pub const DEFAULT_ALERTMANAGER_PORT: u16 = 9093;

/// How a client is managed relative to this node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    /// The client runs on this machine and is managed by the node
    #[default]
    Local,
    /// The client is run by the operator elsewhere
    External,
}

/// Alertmanager connection and alert toggles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertmanagerSettings {
    /// Global alerting switch
    pub enable_alerting: bool,
    /// Switch for the P2P port connectivity check
    pub alert_enabled_port_connectivity_check: bool,
    /// Alertmanager host
    pub host: String,
    /// Alertmanager API port
    pub port: u16,
}

impl Default for AlertmanagerSettings {
    fn default() -> Self {
        Self {
            enable_alerting: true,
            alert_enabled_port_connectivity_check: true,
            host: "alertmanager".to_string(),
            port: DEFAULT_ALERTMANAGER_PORT,
        }
    }
}

/// Node settings
///
/// Persistent configuration stored as JSON. Missing fields fall back to
/// their defaults, so a partial file is valid.
///
/// # Example
/// ```rust,no_run
/// use p2p_portcheck::config::Settings;
///
/// let settings = Settings::load("settings.json").expect("Failed to load");
/// println!("Execution P2P port: {}", settings.execution_p2p_port());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Alertmanager settings
    pub alertmanager: AlertmanagerSettings,
    /// Execution client management mode
    pub execution_client_mode: ClientMode,
    /// Consensus client management mode
    pub consensus_client_mode: ClientMode,
    /// Execution client P2P port
    pub execution_p2p_port: u16,
    /// Consensus client P2P port
    pub consensus_p2p_port: u16,
    /// Seconds between connectivity checks in the poll loop
    pub check_interval_secs: u64,
    /// Third-party port checker endpoint
    pub port_checker_url: String,
    /// Request timeout for the port checker, in seconds
    pub port_checker_timeout_secs: u64,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// A missing or blank file yields the defaults. A file that parses but
    /// names port 0 for a locally managed client is rejected.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = match read_settings_file(path)? {
            Some(data) => serde_json::from_str::<Self>(&data).map_err(|e| {
                Error::Config(format!("{} is not valid settings JSON: {}", path.display(), e))
            })?,
            None => Self::default(),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Write settings as pretty JSON, creating the parent directory first
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot encode settings: {}", e)))?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Config(format!("cannot create {}: {}", dir.display(), e)))?;
        }

        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("cannot write {}: {}", path.display(), e)))
    }

    /// Reject port 0 for any client this node is expected to check
    pub fn validate(&self) -> Result<()> {
        let ports = [
            ("execution", self.execution_client_mode, self.execution_p2p_port),
            ("consensus", self.consensus_client_mode, self.consensus_p2p_port),
        ];

        for (role, mode, port) in ports {
            if mode == ClientMode::Local && port == 0 {
                return Err(Error::Config(format!(
                    "{} client is local but its P2P port is 0",
                    role
                )));
            }
        }

        Ok(())
    }

    /// Whether alerting is enabled globally
    pub fn alerting_enabled(&self) -> bool {
        self.alertmanager.enable_alerting
    }

    /// Whether the port connectivity check is enabled
    pub fn port_check_enabled(&self) -> bool {
        self.alertmanager.alert_enabled_port_connectivity_check
    }

    /// Execution client management mode
    pub fn execution_client_mode(&self) -> ClientMode {
        self.execution_client_mode
    }

    /// Consensus client management mode
    pub fn consensus_client_mode(&self) -> ClientMode {
        self.consensus_client_mode
    }

    /// Execution client P2P port
    pub fn execution_p2p_port(&self) -> u16 {
        self.execution_p2p_port
    }

    /// Consensus client P2P port
    pub fn consensus_p2p_port(&self) -> u16 {
        self.consensus_p2p_port
    }

    /// Interval between poll cycles
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    /// Timeout applied to the whole port checker request, at least one second
    pub fn port_checker_timeout(&self) -> Duration {
        Duration::from_secs(self.port_checker_timeout_secs.max(1))
    }

    /// Base URL of the alertmanager API
    pub fn alertmanager_url(&self) -> String {
        format!("http://{}:{}", self.alertmanager.host, self.alertmanager.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alertmanager: AlertmanagerSettings::default(),
            execution_client_mode: ClientMode::Local,
            consensus_client_mode: ClientMode::Local,
            execution_p2p_port: DEFAULT_EXECUTION_P2P_PORT,
            consensus_p2p_port: DEFAULT_CONSENSUS_P2P_PORT,
            check_interval_secs: 3600,
            port_checker_url: "https://canyouseeme.org/".to_string(),
            port_checker_timeout_secs: 15,
        }
    }
}

// None for a missing or whitespace-only file
fn read_settings_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(data) if data.trim().is_empty() => Ok(None),
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Config(format!("cannot read {}: {}", path.display(), e))),
    }
}
