//! PDU session records and the session table
//!
//! Session ids 1..=15 are allocated lowest-first. Each session carries its
//! own procedure transaction counter: the first UE-initiated procedure uses
//! PTI 1, the counter wraps from 255 back to 1 and never yields 0.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use dusim_common::SNssai;
use dusim_nas::{Dnn, PduSessionType, SessionAmbr};

/// Highest PDU session identity usable by the UE
pub const MAX_PDU_SESSIONS: u8 = 15;
/// First PTI handed out by a fresh session
pub const PTI_FIRST: u8 = 1;

/// PDU session state (TS 24.501 Section 6.1.3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PduSessionState {
    #[default]
    Inactive,
    ActivePending,
    Active,
    ModificationPending,
    InactivePending,
}

impl fmt::Display for PduSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PduSessionState::Inactive => write!(f, "INACTIVE"),
            PduSessionState::ActivePending => write!(f, "ACTIVE-PENDING"),
            PduSessionState::Active => write!(f, "ACTIVE"),
            PduSessionState::ModificationPending => write!(f, "MODIFICATION-PENDING"),
            PduSessionState::InactivePending => write!(f, "INACTIVE-PENDING"),
        }
    }
}

/// One PDU session as known to the UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSession {
    pub id: u8,
    pub state: PduSessionState,
    pti: u8,
    pub dnn: Option<Dnn>,
    pub s_nssai: Option<SNssai>,
    pub session_type: PduSessionType,
    pub ssc_mode: Option<u8>,
    pub session_ambr: Option<SessionAmbr>,
    /// Authorized QoS rules, kept as received
    pub authorized_qos_rules: Vec<u8>,
    pub qos_flow_descriptions: Option<Vec<u8>>,
    pub ipv4_address: Option<Ipv4Addr>,
    pub ipv6_address: Option<Ipv6Addr>,
    /// Back-off timer from the last reject, in seconds
    pub back_off_secs: Option<u64>,
    pub allowed_ssc_mode: Option<u8>,
}

impl PduSession {
    pub fn new(id: u8, dnn: Option<Dnn>) -> Self {
        Self {
            id,
            state: PduSessionState::Inactive,
            pti: PTI_FIRST,
            dnn,
            s_nssai: None,
            session_type: PduSessionType::Ipv4,
            ssc_mode: None,
            session_ambr: None,
            authorized_qos_rules: Vec::new(),
            qos_flow_descriptions: None,
            ipv4_address: None,
            ipv6_address: None,
            back_off_secs: None,
            allowed_ssc_mode: None,
        }
    }

    /// PTI the next UE-initiated procedure will use.
    pub fn pti(&self) -> u8 {
        self.pti
    }

    /// Takes the current PTI and advances the counter.
    pub fn next_pti(&mut self) -> u8 {
        let pti = self.pti;
        self.pti = if self.pti == u8::MAX { PTI_FIRST } else { self.pti + 1 };
        pti
    }

    pub fn is_active(&self) -> bool {
        self.state == PduSessionState::Active
    }
}

/// Fixed table of PDU sessions indexed by session id.
#[derive(Debug, Clone, Default)]
pub struct PduSessionTable {
    sessions: [Option<PduSession>; MAX_PDU_SESSIONS as usize],
    last_rejected: Option<PduSession>,
}

impl PduSessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(id: u8) -> Option<usize> {
        (1..=MAX_PDU_SESSIONS)
            .contains(&id)
            .then(|| usize::from(id - 1))
    }

    /// Claims the lowest free id for a new session.
    pub fn allocate(&mut self, dnn: Option<Dnn>) -> Option<&mut PduSession> {
        let index = self.sessions.iter().position(Option::is_none)?;
        let id = index as u8 + 1;
        Some(self.sessions[index].insert(PduSession::new(id, dnn)))
    }

    /// `None` for id 0, ids above 15 and free slots.
    pub fn get(&self, id: u8) -> Option<&PduSession> {
        Self::index(id).and_then(|i| self.sessions[i].as_ref())
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut PduSession> {
        Self::index(id).and_then(|i| self.sessions[i].as_mut())
    }

    pub fn free(&mut self, id: u8) -> Option<PduSession> {
        Self::index(id).and_then(|i| self.sessions[i].take())
    }

    /// Ids of sessions currently ACTIVE.
    pub fn active_ids(&self) -> Vec<u8> {
        self.iter().filter(|s| s.is_active()).map(|s| s.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PduSession> {
        self.sessions.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent session the network rejected, with its back-off.
    pub fn last_rejected(&self) -> Option<&PduSession> {
        self.last_rejected.as_ref()
    }

    pub(crate) fn reject(&mut self, id: u8) -> Option<&PduSession> {
        self.last_rejected = self.free(id);
        self.last_rejected.as_ref()
    }
}
