//! 5GSM procedures (TS 24.501 Section 6.3, 6.4)
//!
//! UE-requested procedures allocate or check a session in the
//! [`PduSessionTable`] and return the 5GSM message to send; network
//! messages update the table and may return a reply. Transport in UL NAS
//! Transport happens in [`UeContext::send_sm`].

pub mod session;

pub use session::{PduSession, PduSessionState, PduSessionTable, MAX_PDU_SESSIONS};

use dusim_nas::cause::{self, sm_cause_str};
use dusim_nas::mm::UlNasTransport;
use dusim_nas::sm::{
    PduSessionEstablishmentAccept, PduSessionEstablishmentRequest, PduSessionModificationCommand,
    PduSessionModificationRequest, PduSessionReleaseComplete, PduSessionReleaseRequest,
};
use dusim_nas::{
    Dnn, MmMessage, NasMessage, PayloadContainerType, PduAddress, PduSessionType, RequestType,
    SecurityHeaderType, SmBody, SmMessage,
};
use tracing::{error, info, warn};

use crate::context::UeContext;
use crate::error::{Result, UeError};
use crate::nas::Outbox;

/// DNN of the session opened after registration
pub const DEFAULT_DNN: &str = "internet";

/// A 5GSM message ready for UL NAS Transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmUplink {
    pub message: SmMessage,
    pub request_type: Option<RequestType>,
    pub dnn: Option<Dnn>,
}

impl SmUplink {
    fn reply(message: SmMessage) -> Self {
        Self {
            message,
            request_type: None,
            dnn: None,
        }
    }
}

impl PduSessionTable {
    /// Starts establishment of a new session toward `dnn`.
    pub fn establish(&mut self, dnn: &str) -> Result<SmUplink> {
        let dnn = Dnn::new(dnn);
        let session = self
            .allocate(Some(dnn.clone()))
            .ok_or(UeError::NoFreePduSessionId)?;
        session.state = PduSessionState::ActivePending;
        let pti = session.next_pti();
        info!(
            "PDU session establishment: id {} dnn {} pti {}",
            session.id, dnn.0, pti
        );

        Ok(SmUplink {
            message: SmMessage::new(
                session.id,
                pti,
                SmBody::EstablishmentRequest(PduSessionEstablishmentRequest::default()),
            ),
            request_type: Some(RequestType::InitialRequest),
            dnn: Some(dnn),
        })
    }

    fn require_active(&mut self, psi: u8) -> Result<&mut PduSession> {
        let session = self.get_mut(psi).ok_or(UeError::SessionNotFound(psi))?;
        if !session.is_active() {
            return Err(UeError::InvalidSessionState {
                psi,
                state: session.state.to_string(),
                expected: "ACTIVE",
            });
        }
        Ok(session)
    }

    /// UE-requested modification of an ACTIVE session.
    pub fn modify(&mut self, psi: u8) -> Result<SmUplink> {
        let session = self.require_active(psi)?;
        session.state = PduSessionState::ModificationPending;
        let pti = session.next_pti();
        info!("PDU session {} modification requested, pti {}", psi, pti);
        Ok(SmUplink::reply(SmMessage::new(
            psi,
            pti,
            SmBody::ModificationRequest(PduSessionModificationRequest { cause: None }),
        )))
    }

    /// UE-requested release of an ACTIVE session.
    pub fn release(&mut self, psi: u8) -> Result<SmUplink> {
        let session = self.require_active(psi)?;
        session.state = PduSessionState::InactivePending;
        let pti = session.next_pti();
        info!("PDU session {} release requested, pti {}", psi, pti);
        Ok(SmUplink::reply(SmMessage::new(
            psi,
            pti,
            SmBody::ReleaseRequest(PduSessionReleaseRequest {
                cause: Some(cause::sm::REGULAR_DEACTIVATION),
            }),
        )))
    }

    /// Release requests for every ACTIVE session.
    pub fn release_all(&mut self) -> Vec<SmUplink> {
        self.active_ids()
            .into_iter()
            .filter_map(|psi| self.release(psi).ok())
            .collect()
    }

    /// Applies a network 5GSM message, returning the reply if one is due.
    pub fn handle_sm(&mut self, msg: SmMessage) -> Option<SmUplink> {
        let psi = msg.pdu_session_id;
        let pti = msg.pti;

        if let SmBody::Status { cause } = msg.body {
            match self.get(psi) {
                Some(session) => warn!(
                    "5GSM Status for PDU session {} ({}), cause {}: {}",
                    psi,
                    session.state,
                    cause,
                    sm_cause_str(cause)
                ),
                None => warn!(
                    "5GSM Status for unknown PDU session {}, cause {}: {}",
                    psi,
                    cause,
                    sm_cause_str(cause)
                ),
            }
            return None;
        }

        if let SmBody::EstablishmentReject(reject) = &msg.body {
            error!(
                "PDU session {} establishment rejected, cause {}: {}",
                psi,
                reject.cause,
                sm_cause_str(reject.cause)
            );
            let Some(session) = self.get_mut(psi) else {
                warn!("Establishment Reject for unknown PDU session {}", psi);
                return None;
            };
            session.back_off_secs = reject.back_off_timer.map(|t| t.as_secs());
            session.allowed_ssc_mode = reject.allowed_ssc_mode;
            if let Some(secs) = session.back_off_secs {
                info!("PDU session {} back-off timer {}s", psi, secs);
            }
            self.reject(psi);
            return None;
        }

        let Some(session) = self.get_mut(psi) else {
            warn!(
                "{:?} for unknown PDU session {}",
                msg.message_type(),
                psi
            );
            return None;
        };

        match msg.body {
            SmBody::EstablishmentAccept(accept) => {
                apply_accept(session, pti, accept);
                None
            }
            SmBody::ModificationCommand(command) => {
                session.state = PduSessionState::ModificationPending;
                apply_modification(session, command);
                session.state = PduSessionState::Active;
                info!("PDU session {} modified", psi);
                Some(SmUplink::reply(SmMessage::new(
                    psi,
                    pti,
                    SmBody::ModificationComplete,
                )))
            }
            SmBody::ModificationReject(reject) => {
                warn!(
                    "PDU session {} modification rejected, cause {}: {}",
                    psi,
                    reject.cause,
                    sm_cause_str(reject.cause)
                );
                if let Some(timer) = reject.back_off_timer {
                    session.back_off_secs = Some(timer.as_secs());
                }
                if session.state == PduSessionState::ModificationPending {
                    session.state = PduSessionState::Active;
                }
                None
            }
            SmBody::ReleaseCommand(command) => {
                info!(
                    "PDU session {} released by network, cause {}: {}",
                    psi,
                    command.cause,
                    sm_cause_str(command.cause)
                );
                self.free(psi);
                Some(SmUplink::reply(SmMessage::new(
                    psi,
                    pti,
                    SmBody::ReleaseComplete(PduSessionReleaseComplete { cause: None }),
                )))
            }
            SmBody::ReleaseReject { cause } => {
                warn!(
                    "PDU session {} release rejected, cause {}: {}",
                    psi,
                    cause,
                    sm_cause_str(cause)
                );
                if session.state == PduSessionState::InactivePending {
                    session.state = PduSessionState::Active;
                }
                None
            }
            SmBody::ReleaseComplete(_) => {
                info!("PDU session {} release complete", psi);
                self.free(psi);
                None
            }
            other => {
                warn!("Unexpected downlink 5GSM message {:?}", other);
                None
            }
        }
    }
}

fn apply_accept(session: &mut PduSession, pti: u8, accept: PduSessionEstablishmentAccept) {
    if pti != session::PTI_FIRST {
        warn!("Establishment Accept with PTI {} for PDU session {}", pti, session.id);
    }
    if accept.pdu_session_type != PduSessionType::Ipv4 {
        warn!(
            "PDU session {} established with type {:?}, IPv4 requested",
            session.id, accept.pdu_session_type
        );
    }

    session.session_type = accept.pdu_session_type;
    session.ssc_mode = Some(accept.ssc_mode);
    session.authorized_qos_rules = accept.authorized_qos_rules;
    session.session_ambr = Some(accept.session_ambr);
    session.qos_flow_descriptions = accept.qos_flow_descriptions;
    if let Some(s_nssai) = accept.s_nssai {
        session.s_nssai = Some(s_nssai);
    }
    if let Some(dnn) = accept.dnn {
        session.dnn = Some(dnn);
    }
    if let Some(address) = accept.pdu_address {
        session.ipv4_address = address.ipv4();
        session.ipv6_address = address.ipv6_link_local();
        if let PduAddress::Ipv4(addr) = address {
            info!("PDU session {} address {}", session.id, addr);
        }
    }
    if let Some(cause) = accept.cause {
        info!(
            "PDU session {} accepted with cause {}: {}",
            session.id,
            cause,
            sm_cause_str(cause)
        );
    }

    session.state = PduSessionState::Active;
    info!(
        "PDU session {} established, AMBR {}",
        session.id, accept.session_ambr
    );
}

fn apply_modification(session: &mut PduSession, command: PduSessionModificationCommand) {
    if let Some(rules) = command.authorized_qos_rules {
        session.authorized_qos_rules = rules;
    }
    if let Some(ambr) = command.session_ambr {
        session.session_ambr = Some(ambr);
    }
    if let Some(flows) = command.qos_flow_descriptions {
        session.qos_flow_descriptions = Some(flows);
    }
    if let Some(cause) = command.cause {
        info!("PDU session {} modification cause {}: {}", session.id, cause, sm_cause_str(cause));
    }
}

impl UeContext {
    /// Wraps a 5GSM message in UL NAS Transport and queues it, integrity
    /// protected and ciphered.
    pub(crate) fn send_sm(&mut self, uplink: SmUplink, out: &mut Outbox) -> Result<()> {
        let psi = uplink.message.pdu_session_id;
        let payload = NasMessage::Sm(uplink.message).encode()?;
        let transport = UlNasTransport {
            payload_container_type: PayloadContainerType::N1SmInformation,
            payload,
            pdu_session_id: Some(psi),
            request_type: uplink.request_type,
            s_nssai: None,
            dnn: uplink.dnn,
        };
        self.send_mm(
            MmMessage::UlNasTransport(transport),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
            out,
        )
    }
}
