//! Contention-free random access on the handover target (TS 38.321
//! Section 5.1)

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dusim_rrc::RandomAccessResponse;

/// Dedicated preamble reserved for the incoming UE.
pub const HANDOVER_PREAMBLE_ID: u8 = 63;
/// RA-RNTI of the single simulated RACH occasion.
pub const HANDOVER_RA_RNTI: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum RachState {
    #[default]
    Msg1Received,
    RarSent,
    Completed,
}

impl fmt::Display for RachState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RachState::Msg1Received => write!(f, "MSG1_RECEIVED"),
            RachState::RarSent => write!(f, "RAR_SENT"),
            RachState::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RachContext {
    pub preamble_id: u8,
    pub ra_rnti: u16,
    pub temporary_c_rnti: u16,
    pub state: RachState,
    pub started_at: Instant,
}

impl RachContext {
    /// Context for a detected dedicated preamble.
    pub fn on_preamble(temporary_c_rnti: u16) -> Self {
        Self {
            preamble_id: HANDOVER_PREAMBLE_ID,
            ra_rnti: HANDOVER_RA_RNTI,
            temporary_c_rnti,
            state: RachState::Msg1Received,
            started_at: Instant::now(),
        }
    }

    /// Msg2 payload for this attempt.
    pub fn random_access_response(&self) -> Bytes {
        RandomAccessResponse::new(self.temporary_c_rnti).encode()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rar_payload() {
        let rach = RachContext::on_preamble(0x0102);
        assert_eq!(rach.preamble_id, 63);
        assert_eq!(rach.ra_rnti, 100);
        assert_eq!(rach.state, RachState::Msg1Received);
        assert_eq!(
            rach.random_access_response().as_ref(),
            &[0x40, 0, 0, 0, 0, 0x01, 0x02]
        );
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RachState::RarSent.to_string(), "RAR_SENT");
        assert_eq!(RachState::Msg1Received.to_string(), "MSG1_RECEIVED");
    }
}
