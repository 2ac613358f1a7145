//! Edge-triggered open/closed tracking per client role

use super::types::ClientRole;
use tracing::{info, warn};

/// How a port's state changed between two cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Open before and now
    StillOpen,
    /// Closed before and now
    StillClosed,
    /// Was open, now closed; the only transition that alerts
    BecameClosed,
    /// Was closed, now open
    BecameOpen,
}

impl Transition {
    /// Whether this transition should fire an alert
    pub fn should_alert(self) -> bool {
        self == Transition::BecameClosed
    }
}

/// Last observed reachability of each monitored port
///
/// Both flags start `true`, so a port that is closed at startup counts as a
/// fresh open-to-closed transition and alerts once, while an open port never
/// triggers a spurious alert on the first cycle. State lives in memory only
/// and resets on restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertStateTracker {
    was_execution_port_open: bool,
    was_consensus_port_open: bool,
}

impl AlertStateTracker {
    /// Create a tracker assuming both ports are open
    pub fn new() -> Self {
        Self {
            was_execution_port_open: true,
            was_consensus_port_open: true,
        }
    }

    /// Last recorded state for a role
    pub fn was_open(&self, role: ClientRole) -> bool {
        match role {
            ClientRole::Execution => self.was_execution_port_open,
            ClientRole::Consensus => self.was_consensus_port_open,
        }
    }

    /// Record a new observation and report the transition
    ///
    /// The stored flag is always replaced with `open`.
    pub fn observe(&mut self, role: ClientRole, port: u16, open: bool) -> Transition {
        let flag = match role {
            ClientRole::Execution => &mut self.was_execution_port_open,
            ClientRole::Consensus => &mut self.was_consensus_port_open,
        };
        let was_open = *flag;
        *flag = open;

        let transition = match (was_open, open) {
            (true, true) => Transition::StillOpen,
            (false, false) => Transition::StillClosed,
            (true, false) => Transition::BecameClosed,
            (false, true) => Transition::BecameOpen,
        };

        match transition {
            Transition::StillOpen => {
                info!("Port {} is OPEN.", port);
            }
            Transition::BecameOpen => {
                info!("Port {} is OPEN.", port);
                info!(
                    "{} client P2P port {} is now accessible from the internet.",
                    role, port
                );
            }
            Transition::BecameClosed => {
                warn!(
                    "{} client P2P port {} is not accessible from the internet.",
                    role, port
                );
            }
            Transition::StillClosed => {
                info!("{} client P2P port {} is still CLOSED.", role, port);
            }
        }

        transition
    }
}

impl Default for AlertStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alerts_for(sequence: &[bool]) -> usize {
        let mut tracker = AlertStateTracker::new();
        sequence
            .iter()
            .filter(|open| {
                tracker
                    .observe(ClientRole::Execution, 30303, **open)
                    .should_alert()
            })
            .count()
    }

    #[test]
    fn test_starts_optimistic() {
        let tracker = AlertStateTracker::new();
        assert!(tracker.was_open(ClientRole::Execution));
        assert!(tracker.was_open(ClientRole::Consensus));
    }

    #[test]
    fn test_steady_open_never_alerts() {
        assert_eq!(alerts_for(&[true, true, true]), 0);
    }

    #[test]
    fn test_staying_closed_alerts_once() {
        assert_eq!(alerts_for(&[true, false, false]), 1);
    }

    #[test]
    fn test_flapping_alerts_per_closure() {
        assert_eq!(alerts_for(&[true, false, true, false]), 2);
    }

    #[test]
    fn test_closed_at_startup_alerts_once() {
        assert_eq!(alerts_for(&[false, false]), 1);
    }

    #[test]
    fn test_transitions_and_flag_update() {
        let mut tracker = AlertStateTracker::new();

        assert_eq!(
            tracker.observe(ClientRole::Consensus, 9001, false),
            Transition::BecameClosed
        );
        assert!(!tracker.was_open(ClientRole::Consensus));
        assert!(tracker.was_open(ClientRole::Execution), "roles are independent");

        assert_eq!(
            tracker.observe(ClientRole::Consensus, 9001, false),
            Transition::StillClosed
        );
        assert_eq!(
            tracker.observe(ClientRole::Consensus, 9001, true),
            Transition::BecameOpen
        );
        assert!(!Transition::BecameOpen.should_alert());
        assert!(tracker.was_open(ClientRole::Consensus));
    }
}
