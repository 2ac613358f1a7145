//! portcheck - periodic P2P port reachability monitor
//!
//! Usage: `portcheck [settings.json]`

use anyhow::Context;
use p2p_portcheck::config::Settings;
use p2p_portcheck::connectivity::PortConnectivityCheck;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    p2p_portcheck::init();

    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "settings.json".to_string());
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path))?;

    let interval = settings.check_interval();
    let mut check = PortConnectivityCheck::from_settings(settings)
        .context("Failed to set up port connectivity check")?;

    info!("Port connectivity monitor started (interval: {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping");
                break;
            }
            _ = ticker.tick() => {
                // Cancelled mid-cycle if ctrl-c arrives while probes are in flight
                tokio::select! {
                    result = check.run() => {
                        if let Err(e) = result {
                            error!("{}", e);
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown requested, aborting in-flight check");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
