//! 5GMM procedures on the UE side (TS 24.501 Section 5.5.1, 5.4)
//!
//! ```text
//!  DEREGISTERED ──Registration Request──> REGISTERING
//!  REGISTERING  ──Registration Accept───> REGISTERED
//!  any          ──Reject / Auth Reject──> DEREGISTERED
//! ```

use dusim_nas::cause::{self, mm_cause_str};
use dusim_nas::mm::{
    AuthenticationFailure, AuthenticationRequest, AuthenticationResponse, IdentityRequest,
    IdentityResponse, RegistrationAccept, RegistrationRequest, SecurityModeCommand,
    SecurityModeComplete, SecurityModeReject,
};
use dusim_nas::{
    IdentityType, MmMessage, MobileIdentity, NasKeySetIdentifier, NasMessage,
    PayloadContainerType, RegistrationType, SecurityHeaderType, SmMessage,
};
use tracing::{debug, error, info, warn};

use crate::auth::AuthOutcome;
use crate::context::{RegistrationState, UeContext};
use crate::error::Result;
use crate::nas::Outbox;
use crate::ue::UeEvent;

/// IMEISV reported in Security Mode Complete
pub const IMEISV: &str = "1110000000000000";

impl UeContext {
    /// Builds the initial Registration Request, stores it as the pending
    /// NAS PDU and enters REGISTERING. The PDU goes out unprotected.
    pub fn build_registration_request(&mut self) -> Result<Vec<u8>> {
        let request = RegistrationRequest {
            registration_type: RegistrationType::InitialRegistration,
            follow_on_request: true,
            ng_ksi: NasKeySetIdentifier::no_key(),
            mobile_identity: MobileIdentity::Suci(self.suci.clone()),
            ue_security_capability: Some(self.security_capability),
        };
        let pdu = self.encode_uplink(
            MmMessage::RegistrationRequest(request),
            SecurityHeaderType::NotProtected,
        )?;
        self.pending_registration = Some(pdu.clone());
        self.set_registration_state(RegistrationState::Registering);
        Ok(pdu)
    }

    /// Handles one downlink 5GMM message. A DL NAS Transport yields the
    /// 5GSM message it carries.
    pub(crate) fn handle_mm(&mut self, msg: MmMessage, out: &mut Outbox) -> Option<SmMessage> {
        let result = match msg {
            MmMessage::IdentityRequest(req) => self.receive_identity_request(req, out),
            MmMessage::AuthenticationRequest(req) => self.receive_authentication_request(req, out),
            MmMessage::AuthenticationReject => {
                error!("Authentication rejected by the network");
                self.set_registration_state(RegistrationState::Deregistered);
                self.reset_security();
                Ok(())
            }
            MmMessage::SecurityModeCommand(cmd) => self.receive_security_mode_command(cmd, out),
            MmMessage::RegistrationAccept(accept) => self.receive_registration_accept(accept, out),
            MmMessage::RegistrationReject(reject) => {
                error!(
                    "Registration rejected, cause {}: {}",
                    reject.cause,
                    mm_cause_str(reject.cause)
                );
                self.set_registration_state(RegistrationState::Deregistered);
                self.reset_security();
                Ok(())
            }
            MmMessage::DlNasTransport(transport) => {
                if transport.payload_container_type != PayloadContainerType::N1SmInformation {
                    warn!(
                        "DL NAS Transport with unsupported payload container {:?}",
                        transport.payload_container_type
                    );
                    return None;
                }
                let Some(psi) = transport.pdu_session_id else {
                    error!("DL NAS Transport without PDU session id");
                    return None;
                };
                return match NasMessage::decode(&transport.payload) {
                    Ok(NasMessage::Sm(sm)) => {
                        if sm.pdu_session_id != psi {
                            warn!(
                                "PDU session id mismatch: transport {} message {}",
                                psi, sm.pdu_session_id
                            );
                        }
                        Some(sm)
                    }
                    Ok(other) => {
                        warn!("DL NAS Transport carries non-5GSM message {}", other.name());
                        None
                    }
                    Err(e) => {
                        error!("Failed to decode 5GSM payload: {}", e);
                        None
                    }
                };
            }
            MmMessage::FiveGmmStatus(status) => {
                warn!(
                    "5GMM Status received, cause {}: {}",
                    status.cause,
                    mm_cause_str(status.cause)
                );
                Ok(())
            }
            other => {
                warn!("Unexpected downlink 5GMM message {:?}", other.message_type());
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("5GMM handling failed: {}", e);
        }
        None
    }

    fn receive_identity_request(&mut self, req: IdentityRequest, out: &mut Outbox) -> Result<()> {
        if req.identity_type != IdentityType::Suci {
            warn!("Identity type {:?} not supported", req.identity_type);
            return Ok(());
        }
        let response = IdentityResponse {
            mobile_identity: MobileIdentity::Suci(self.suci.clone()),
        };
        self.send_mm(
            MmMessage::IdentityResponse(response),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
            out,
        )
    }

    fn receive_authentication_request(
        &mut self,
        req: AuthenticationRequest,
        out: &mut Outbox,
    ) -> Result<()> {
        if req.ng_ksi.is_no_key() {
            error!("Authentication Request with ngKSI 7 (no key), ignored");
            return Ok(());
        }
        if req.abba.is_empty() {
            error!("Authentication Request without ABBA, ignored");
            return Ok(());
        }
        let (Some(rand), Some(autn)) = (req.rand, req.autn) else {
            error!("Authentication Request without RAND or AUTN, ignored");
            return Ok(());
        };

        self.auth.set_ng_ksi(req.ng_ksi);
        if !self.security.is_active() {
            self.security.begin_establishing();
        }

        match self.auth.process_authentication_info(&rand, &autn, &req.abba) {
            AuthOutcome::Success {
                res_star,
                security_context,
            } => {
                info!("Authentication successful, SQN {}", self.auth.sqn());
                self.security = security_context;
                self.send_mm(
                    MmMessage::AuthenticationResponse(AuthenticationResponse {
                        res_star: Some(res_star),
                    }),
                    SecurityHeaderType::NotProtected,
                    out,
                )
            }
            AuthOutcome::MacFailure => {
                error!("Authentication failed: MAC mismatch");
                self.send_mm(
                    MmMessage::AuthenticationFailure(AuthenticationFailure {
                        cause: cause::mm::MAC_FAILURE,
                        auts: None,
                    }),
                    SecurityHeaderType::NotProtected,
                    out,
                )
            }
            AuthOutcome::SyncFailure { auts } => {
                warn!("Authentication failed: SQN out of range, requesting resync");
                self.send_mm(
                    MmMessage::AuthenticationFailure(AuthenticationFailure {
                        cause: cause::mm::SYNCH_FAILURE,
                        auts: Some(auts),
                    }),
                    SecurityHeaderType::NotProtected,
                    out,
                )
            }
        }
    }

    fn receive_security_mode_command(
        &mut self,
        cmd: SecurityModeCommand,
        out: &mut Outbox,
    ) -> Result<()> {
        let expected = self.auth.ng_ksi();
        if cmd.ng_ksi.is_no_key() || cmd.ng_ksi != expected {
            error!(
                "Security Mode Command ngKSI {:?} does not match {:?}",
                cmd.ng_ksi, expected
            );
            self.set_registration_state(RegistrationState::Deregistered);
            return Ok(());
        }

        let algorithms = cmd.selected_algorithms;
        if let Err(e) = self.security.activate(algorithms) {
            error!("Cannot activate NAS security: {}", e);
            self.send_mm(
                MmMessage::SecurityModeReject(SecurityModeReject {
                    cause: cause::mm::SECURITY_MODE_REJECTED_UNSPECIFIED,
                }),
                SecurityHeaderType::NotProtected,
                out,
            )?;
            self.set_registration_state(RegistrationState::Deregistered);
            return Ok(());
        }
        info!(
            "NAS security activated: {:?}/{:?}",
            algorithms.ciphering, algorithms.integrity
        );

        let retransmit = cmd
            .additional_security_information
            .map(|info| info.retransmission_requested)
            .unwrap_or(false);
        let container = if retransmit {
            debug!("Network requested the initial NAS message");
            self.pending_registration.clone()
        } else {
            None
        };

        self.send_mm(
            MmMessage::SecurityModeComplete(SecurityModeComplete {
                imeisv: Some(MobileIdentity::Imeisv(IMEISV.to_string())),
                nas_message_container: container,
            }),
            SecurityHeaderType::IntegrityProtectedAndCipheredWithNewSecurityContext,
            out,
        )
    }

    fn receive_registration_accept(
        &mut self,
        accept: RegistrationAccept,
        out: &mut Outbox,
    ) -> Result<()> {
        match accept.guti {
            Some(guti) => self.guti = Some(guti),
            None => warn!("Registration Accept without 5G-GUTI"),
        }
        if let Some(t3512) = accept.t3512 {
            debug!("T3512 {}s", t3512.as_secs());
        }

        self.send_mm(
            MmMessage::RegistrationComplete,
            SecurityHeaderType::IntegrityProtectedAndCiphered,
            out,
        )?;
        self.set_registration_state(RegistrationState::Registered);
        self.pending_registration = None;
        out.event(UeEvent::RegistrationCompleted);
        Ok(())
    }
}
