//! RRC state of the simulated UE
//!
//! Only the two states the DU interaction can produce are modelled
//! (3GPP TS 38.331 Section 4.2.1):
//!
//! | From | To | Trigger |
//! |------|----|---------|
//! | Idle | Connected | RRC Setup received |
//! | Connected | Idle | RRC Release |

use std::fmt;

/// RRC state as defined in 3GPP TS 38.331.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum RrcState {
    /// RRC_IDLE: no RRC connection established.
    #[default]
    Idle,

    /// RRC_CONNECTED: signalling radio bearers are up and the UE reports
    /// measurements when asked to.
    Connected,
}

impl RrcState {
    pub fn is_connected(&self) -> bool {
        matches!(self, RrcState::Connected)
    }
}

impl fmt::Display for RrcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RrcState::Idle => write!(f, "RRC_IDLE"),
            RrcState::Connected => write!(f, "RRC_CONNECTED"),
        }
    }
}

/// Radio-side context: RRC state plus what the last (re)configuration told
/// the UE about its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RrcContext {
    pub state: RrcState,
    /// C-RNTI assigned by reconfigurationWithSync or the RAR
    pub c_rnti: Option<u16>,
    /// PCI of the cell a handover moved the UE to
    pub serving_pci: Option<u16>,
}

impl RrcContext {
    pub fn set_state(&mut self, state: RrcState) {
        if self.state != state {
            tracing::info!("RRC state transition: {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transition() {
        let mut ctx = RrcContext::default();
        assert!(!ctx.state.is_connected());
        ctx.set_state(RrcState::Connected);
        assert!(ctx.state.is_connected());
        assert_eq!(ctx.state.to_string(), "RRC_CONNECTED");
    }
}
