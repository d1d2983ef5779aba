//! Inter-DU handover context (3GPP TS 38.401 Section 8.2.1.1)
//!
//! One DU plays one role per handover:
//!
//! ```text
//! Source: IDLE -> PREPARATION -> EXECUTION -> COMPLETED
//!              (A3 decision)  (Modification   (RRC Reconfiguration
//!                              Confirm)        Complete from the UE)
//!
//! Target: IDLE -> PREPARATION -> EXECUTION -> COMPLETED
//!              (UE Context     (RACH window   (Msg3)
//!               Setup Request)  opened)
//! ```
//!
//! Either role falls to FAILED on an error or when the supervision window
//! expires before COMPLETED.

use std::fmt;
use std::time::Instant;

use dusim_rrc::MeasurementReport;
use tracing::{info, warn};

/// Role this DU plays in the current handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum HandoverRole {
    #[default]
    None,
    Source,
    Target,
}

impl fmt::Display for HandoverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoverRole::None => write!(f, "NONE"),
            HandoverRole::Source => write!(f, "SOURCE"),
            HandoverRole::Target => write!(f, "TARGET"),
        }
    }
}

/// Handover progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum HandoverState {
    #[default]
    Idle,
    Preparation,
    Execution,
    /// Path switch in progress on the CU side
    Completion,
    Completed,
    Failed,
}

impl HandoverState {
    /// True once the handover can no longer change without a reset.
    pub fn is_final(&self) -> bool {
        matches!(self, HandoverState::Completed | HandoverState::Failed)
    }
}

impl fmt::Display for HandoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoverState::Idle => write!(f, "IDLE"),
            HandoverState::Preparation => write!(f, "PREPARATION"),
            HandoverState::Execution => write!(f, "EXECUTION"),
            HandoverState::Completion => write!(f, "COMPLETION"),
            HandoverState::Completed => write!(f, "COMPLETED"),
            HandoverState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Handover context of the single UE a DU serves.
///
/// Kept behind one read/write lock so that role and state are always read
/// as a consistent pair; [`Du::handover`](crate::Du::handover) returns a
/// clone.
#[derive(Debug, Clone, Default)]
pub struct HandoverContext {
    pub role: HandoverRole,
    pub state: HandoverState,
    /// PCI the source DU asked the CU to hand the UE to
    pub target_cell_pci: Option<u16>,
    pub gnb_cu_ue_f1ap_id: Option<u32>,
    pub gnb_du_ue_f1ap_id: Option<u32>,
    /// C-RNTI allocated by the target for the incoming UE
    pub new_c_rnti: Option<u16>,
    /// Msg3 seen on the target
    pub rach_completed: bool,
    pub started_at: Option<Instant>,
    /// Bumped on every arm and reset so a stale timer cannot fail a newer
    /// handover.
    epoch: u64,
}

impl HandoverContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(role: HandoverRole) -> &'static str {
        match role {
            HandoverRole::Source => "[SOURCE DU]",
            HandoverRole::Target => "[TARGET DU]",
            HandoverRole::None => "[DU]",
        }
    }

    fn transition(&mut self, role: HandoverRole, state: HandoverState) {
        info!(
            "{} State transition: {} -> {}",
            Self::tag(role),
            self.state,
            state
        );
        self.role = role;
        self.state = state;
    }

    pub fn set_source_state(&mut self, state: HandoverState) {
        self.transition(HandoverRole::Source, state);
    }

    pub fn set_target_state(&mut self, state: HandoverState) {
        self.transition(HandoverRole::Target, state);
    }

    pub fn is_idle(&self) -> bool {
        self.state == HandoverState::Idle
    }

    pub fn is_source(&self) -> bool {
        self.role == HandoverRole::Source
    }

    pub fn is_target(&self) -> bool {
        self.role == HandoverRole::Target
    }

    /// Back to role NONE / state IDLE. Invalidates any armed timer.
    pub fn reset(&mut self) {
        if self.role != HandoverRole::None || self.state != HandoverState::Idle {
            info!(
                "{} Handover context reset ({})",
                Self::tag(self.role),
                self.state
            );
        }
        let epoch = self.epoch.wrapping_add(1);
        *self = Self {
            epoch,
            ..Self::default()
        };
    }

    /// Starts a new supervision window and returns its token.
    pub fn arm(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.started_at = Some(Instant::now());
        self.epoch
    }

    /// Fails the handover if the window identified by `epoch` is still the
    /// current one and the handover has not finished. Returns true when the
    /// state changed.
    pub fn expire(&mut self, epoch: u64) -> bool {
        if self.epoch != epoch || self.state.is_final() || self.role == HandoverRole::None {
            return false;
        }
        warn!(
            "{} Handover window expired in state {}",
            Self::tag(self.role),
            self.state
        );
        let role = self.role;
        self.transition(role, HandoverState::Failed);
        true
    }
}

/// Outcome of the A3 check on one measurement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A3Candidate {
    pub pci: u16,
    pub neighbor_rsrp_dbm: i32,
    pub serving_rsrp_dbm: i32,
}

/// Event A3 (TS 38.331 Section 5.5.4.4) without hysteresis or
/// time-to-trigger: the first neighbor whose RSRP exceeds the serving RSRP
/// by more than `offset_db`. Neighbors without a PCI or RSRP are skipped.
pub fn evaluate_a3(report: &MeasurementReport, offset_db: i32) -> Option<A3Candidate> {
    let serving = report.serving_rsrp_dbm()?;
    report.neighbor_cells.iter().find_map(|neighbor| {
        let pci = neighbor.pci?;
        let rsrp = neighbor.results.rsrp_dbm()?;
        (rsrp > serving + offset_db).then_some(A3Candidate {
            pci,
            neighbor_rsrp_dbm: rsrp,
            serving_rsrp_dbm: serving,
        })
    })
}
