//! 5GS mobility management messages (TS 24.501 Section 8.2)

use bytes::BufMut;

use crate::codec::{
    get_lv, get_lv_e, get_u8, iei, put_lv, put_lv_e, put_tlv, put_tlv_e, put_tv,
    put_tv1, CodecError, CodecResult, OptionalIes,
};
use crate::enums::{IdentityType, MmMessageType, PayloadContainerType, RegistrationType, RequestType};
use crate::ies::{
    decode_s_nssai, encode_s_nssai, AdditionalSecurityInformation, Dnn, GprsTimer3,
    MobileIdentity, NasKeySetIdentifier, UeSecurityCapability,
};
use crate::security::NasSecurityAlgorithms;
use dusim_common::SNssai;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub registration_type: RegistrationType,
    pub follow_on_request: bool,
    pub ng_ksi: NasKeySetIdentifier,
    pub mobile_identity: MobileIdentity,
    pub ue_security_capability: Option<UeSecurityCapability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrationAccept {
    /// 5GS registration result value (3GPP access = 1)
    pub registration_result: u8,
    pub guti: Option<MobileIdentity>,
    pub t3512: Option<GprsTimer3>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReject {
    pub cause: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    pub ng_ksi: NasKeySetIdentifier,
    pub abba: Vec<u8>,
    pub rand: Option<[u8; 16]>,
    pub autn: Option<[u8; 16]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticationResponse {
    pub res_star: Option<[u8; 16]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationFailure {
    pub cause: u8,
    /// AUTS, present on synch failure
    pub auts: Option<[u8; 14]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRequest {
    pub identity_type: IdentityType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResponse {
    pub mobile_identity: MobileIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityModeCommand {
    pub selected_algorithms: NasSecurityAlgorithms,
    pub ng_ksi: NasKeySetIdentifier,
    pub replayed_ue_security_capability: UeSecurityCapability,
    pub imeisv_requested: bool,
    pub additional_security_information: Option<AdditionalSecurityInformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityModeComplete {
    pub imeisv: Option<MobileIdentity>,
    pub nas_message_container: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityModeReject {
    pub cause: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload: Vec<u8>,
    pub pdu_session_id: Option<u8>,
    pub request_type: Option<RequestType>,
    pub s_nssai: Option<SNssai>,
    pub dnn: Option<Dnn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload: Vec<u8>,
    pub pdu_session_id: Option<u8>,
    pub cause: Option<u8>,
    pub back_off_timer: Option<GprsTimer3>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiveGmmStatus {
    pub cause: u8,
}

/// A plain 5GMM message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmMessage {
    RegistrationRequest(RegistrationRequest),
    RegistrationAccept(RegistrationAccept),
    RegistrationComplete,
    RegistrationReject(RegistrationReject),
    AuthenticationRequest(AuthenticationRequest),
    AuthenticationResponse(AuthenticationResponse),
    AuthenticationReject,
    AuthenticationFailure(AuthenticationFailure),
    IdentityRequest(IdentityRequest),
    IdentityResponse(IdentityResponse),
    SecurityModeCommand(SecurityModeCommand),
    SecurityModeComplete(SecurityModeComplete),
    SecurityModeReject(SecurityModeReject),
    FiveGmmStatus(FiveGmmStatus),
    UlNasTransport(UlNasTransport),
    DlNasTransport(DlNasTransport),
}

impl MmMessage {
    pub fn message_type(&self) -> MmMessageType {
        match self {
            MmMessage::RegistrationRequest(_) => MmMessageType::RegistrationRequest,
            MmMessage::RegistrationAccept(_) => MmMessageType::RegistrationAccept,
            MmMessage::RegistrationComplete => MmMessageType::RegistrationComplete,
            MmMessage::RegistrationReject(_) => MmMessageType::RegistrationReject,
            MmMessage::AuthenticationRequest(_) => MmMessageType::AuthenticationRequest,
            MmMessage::AuthenticationResponse(_) => MmMessageType::AuthenticationResponse,
            MmMessage::AuthenticationReject => MmMessageType::AuthenticationReject,
            MmMessage::AuthenticationFailure(_) => MmMessageType::AuthenticationFailure,
            MmMessage::IdentityRequest(_) => MmMessageType::IdentityRequest,
            MmMessage::IdentityResponse(_) => MmMessageType::IdentityResponse,
            MmMessage::SecurityModeCommand(_) => MmMessageType::SecurityModeCommand,
            MmMessage::SecurityModeComplete(_) => MmMessageType::SecurityModeComplete,
            MmMessage::SecurityModeReject(_) => MmMessageType::SecurityModeReject,
            MmMessage::FiveGmmStatus(_) => MmMessageType::FiveGmmStatus,
            MmMessage::UlNasTransport(_) => MmMessageType::UlNasTransport,
            MmMessage::DlNasTransport(_) => MmMessageType::DlNasTransport,
        }
    }

    /// Encodes the message body (everything after the message type octet).
    pub(crate) fn encode_body(&self, buf: &mut Vec<u8>) -> CodecResult<()> {
        match self {
            MmMessage::RegistrationRequest(m) => {
                let reg_type = ((m.follow_on_request as u8) << 3) | u8::from(m.registration_type);
                buf.put_u8((m.ng_ksi.encode() << 4) | reg_type);
                put_lv_e(buf, &m.mobile_identity.encode()?)?;
                if let Some(cap) = &m.ue_security_capability {
                    put_tlv(buf, iei::UE_SECURITY_CAPABILITY, &cap.encode())?;
                }
            }
            MmMessage::RegistrationAccept(m) => {
                put_lv(buf, &[m.registration_result])?;
                if let Some(guti) = &m.guti {
                    put_tlv_e(buf, iei::GUTI, &guti.encode()?)?;
                }
                if let Some(timer) = &m.t3512 {
                    put_tlv(buf, iei::T3512, &[timer.0])?;
                }
            }
            MmMessage::RegistrationComplete | MmMessage::AuthenticationReject => {}
            MmMessage::RegistrationReject(m) => buf.put_u8(m.cause),
            MmMessage::AuthenticationRequest(m) => {
                buf.put_u8(m.ng_ksi.encode());
                put_lv(buf, &m.abba)?;
                if let Some(rand) = &m.rand {
                    put_tv(buf, iei::RAND, rand);
                }
                if let Some(autn) = &m.autn {
                    put_tlv(buf, iei::AUTN, autn)?;
                }
            }
            MmMessage::AuthenticationResponse(m) => {
                if let Some(res_star) = &m.res_star {
                    put_tlv(buf, iei::RES_STAR, res_star)?;
                }
            }
            MmMessage::AuthenticationFailure(m) => {
                buf.put_u8(m.cause);
                if let Some(auts) = &m.auts {
                    put_tlv(buf, iei::AUTH_FAILURE_PARAMETER, auts)?;
                }
            }
            MmMessage::IdentityRequest(m) => buf.put_u8(u8::from(m.identity_type)),
            MmMessage::IdentityResponse(m) => put_lv_e(buf, &m.mobile_identity.encode()?)?,
            MmMessage::SecurityModeCommand(m) => {
                buf.put_u8(m.selected_algorithms.encode());
                buf.put_u8(m.ng_ksi.encode());
                put_lv(buf, &m.replayed_ue_security_capability.encode())?;
                if m.imeisv_requested {
                    put_tv1(buf, iei::IMEISV_REQUEST, 1);
                }
                if let Some(info) = &m.additional_security_information {
                    put_tlv(buf, iei::ADDITIONAL_SECURITY_INFO, &[info.encode()])?;
                }
            }
            MmMessage::SecurityModeComplete(m) => {
                if let Some(imeisv) = &m.imeisv {
                    put_tlv_e(buf, iei::IMEISV, &imeisv.encode()?)?;
                }
                if let Some(container) = &m.nas_message_container {
                    put_tlv_e(buf, iei::NAS_MESSAGE_CONTAINER, container)?;
                }
            }
            MmMessage::SecurityModeReject(m) => buf.put_u8(m.cause),
            MmMessage::FiveGmmStatus(m) => buf.put_u8(m.cause),
            MmMessage::UlNasTransport(m) => {
                buf.put_u8(u8::from(m.payload_container_type));
                put_lv_e(buf, &m.payload)?;
                if let Some(psi) = m.pdu_session_id {
                    put_tv(buf, iei::PDU_SESSION_ID, &[psi]);
                }
                if let Some(request_type) = m.request_type {
                    put_tv1(buf, iei::REQUEST_TYPE, u8::from(request_type));
                }
                if let Some(s_nssai) = &m.s_nssai {
                    put_tlv(buf, iei::S_NSSAI, &encode_s_nssai(s_nssai))?;
                }
                if let Some(dnn) = &m.dnn {
                    put_tlv(buf, iei::DNN, &dnn.encode()?)?;
                }
            }
            MmMessage::DlNasTransport(m) => {
                buf.put_u8(u8::from(m.payload_container_type));
                put_lv_e(buf, &m.payload)?;
                if let Some(psi) = m.pdu_session_id {
                    put_tv(buf, iei::PDU_SESSION_ID, &[psi]);
                }
                if let Some(cause) = m.cause {
                    put_tv(buf, iei::MM_CAUSE, &[cause]);
                }
                if let Some(timer) = &m.back_off_timer {
                    put_tlv(buf, iei::BACK_OFF_TIMER, &[timer.0])?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn decode_body(message_type: MmMessageType, buf: &mut &[u8]) -> CodecResult<Self> {
        let msg = match message_type {
            MmMessageType::RegistrationRequest => {
                let octet = get_u8(buf)?;
                let registration_type = RegistrationType::try_from(octet & 0x07).map_err(|_| {
                    CodecError::InvalidValue(format!("registration type {}", octet & 0x07))
                })?;
                let mobile_identity = MobileIdentity::decode(&get_lv_e(buf)?)?;
                let ies = OptionalIes::decode(buf)?;
                MmMessage::RegistrationRequest(RegistrationRequest {
                    registration_type,
                    follow_on_request: octet & 0x08 != 0,
                    ng_ksi: NasKeySetIdentifier::decode(octet >> 4),
                    mobile_identity,
                    ue_security_capability: ies
                        .get(iei::UE_SECURITY_CAPABILITY)
                        .map(UeSecurityCapability::decode)
                        .transpose()?,
                })
            }
            MmMessageType::RegistrationAccept => {
                let result = get_lv(buf)?;
                let ies = OptionalIes::decode(buf)?;
                MmMessage::RegistrationAccept(RegistrationAccept {
                    registration_result: result.first().copied().unwrap_or_default(),
                    guti: ies.get(iei::GUTI).map(MobileIdentity::decode).transpose()?,
                    t3512: ies.get(iei::T3512).map(GprsTimer3::decode).transpose()?,
                })
            }
            MmMessageType::RegistrationComplete => MmMessage::RegistrationComplete,
            MmMessageType::RegistrationReject => {
                MmMessage::RegistrationReject(RegistrationReject { cause: get_u8(buf)? })
            }
            MmMessageType::AuthenticationRequest => {
                let ng_ksi = NasKeySetIdentifier::decode(get_u8(buf)? & 0x0F);
                let abba = get_lv(buf)?;
                let ies = OptionalIes::decode(buf)?;
                MmMessage::AuthenticationRequest(AuthenticationRequest {
                    ng_ksi,
                    abba,
                    rand: ies.get_array(iei::RAND)?,
                    autn: ies.get_array(iei::AUTN)?,
                })
            }
            MmMessageType::AuthenticationResponse => {
                let ies = OptionalIes::decode(buf)?;
                MmMessage::AuthenticationResponse(AuthenticationResponse {
                    res_star: ies.get_array(iei::RES_STAR)?,
                })
            }
            MmMessageType::AuthenticationReject => MmMessage::AuthenticationReject,
            MmMessageType::AuthenticationFailure => {
                let cause = get_u8(buf)?;
                let ies = OptionalIes::decode(buf)?;
                MmMessage::AuthenticationFailure(AuthenticationFailure {
                    cause,
                    auts: ies.get_array(iei::AUTH_FAILURE_PARAMETER)?,
                })
            }
            MmMessageType::IdentityRequest => {
                let value = get_u8(buf)? & 0x07;
                let identity_type = IdentityType::try_from(value)
                    .map_err(|_| CodecError::InvalidValue(format!("identity type {value}")))?;
                MmMessage::IdentityRequest(IdentityRequest { identity_type })
            }
            MmMessageType::IdentityResponse => MmMessage::IdentityResponse(IdentityResponse {
                mobile_identity: MobileIdentity::decode(&get_lv_e(buf)?)?,
            }),
            MmMessageType::SecurityModeCommand => {
                let selected_algorithms = NasSecurityAlgorithms::decode(get_u8(buf)?)
                    .map_err(|e| CodecError::InvalidValue(e.to_string()))?;
                let ng_ksi = NasKeySetIdentifier::decode(get_u8(buf)? & 0x0F);
                let replayed = UeSecurityCapability::decode(&get_lv(buf)?)?;
                let ies = OptionalIes::decode(buf)?;
                MmMessage::SecurityModeCommand(SecurityModeCommand {
                    selected_algorithms,
                    ng_ksi,
                    replayed_ue_security_capability: replayed,
                    imeisv_requested: ies.get_half(iei::IMEISV_REQUEST).is_some_and(|v| v & 0x07 == 1),
                    additional_security_information: ies
                        .get_u8(iei::ADDITIONAL_SECURITY_INFO)
                        .map(AdditionalSecurityInformation::decode),
                })
            }
            MmMessageType::SecurityModeComplete => {
                let ies = OptionalIes::decode(buf)?;
                MmMessage::SecurityModeComplete(SecurityModeComplete {
                    imeisv: ies.get(iei::IMEISV).map(MobileIdentity::decode).transpose()?,
                    nas_message_container: ies.get(iei::NAS_MESSAGE_CONTAINER).map(<[u8]>::to_vec),
                })
            }
            MmMessageType::SecurityModeReject => {
                MmMessage::SecurityModeReject(SecurityModeReject { cause: get_u8(buf)? })
            }
            MmMessageType::FiveGmmStatus => {
                MmMessage::FiveGmmStatus(FiveGmmStatus { cause: get_u8(buf)? })
            }
            MmMessageType::UlNasTransport => {
                let payload_container_type = decode_payload_container_type(get_u8(buf)?)?;
                let payload = get_lv_e(buf)?;
                let ies = OptionalIes::decode(buf)?;
                MmMessage::UlNasTransport(UlNasTransport {
                    payload_container_type,
                    payload,
                    pdu_session_id: ies.get_u8(iei::PDU_SESSION_ID),
                    request_type: ies
                        .get_half(iei::REQUEST_TYPE)
                        .and_then(|v| RequestType::try_from(v & 0x07).ok()),
                    s_nssai: ies.get(iei::S_NSSAI).map(decode_s_nssai).transpose()?,
                    dnn: ies.get(iei::DNN).map(Dnn::decode).transpose()?,
                })
            }
            MmMessageType::DlNasTransport => {
                let payload_container_type = decode_payload_container_type(get_u8(buf)?)?;
                let payload = get_lv_e(buf)?;
                let ies = OptionalIes::decode(buf)?;
                MmMessage::DlNasTransport(DlNasTransport {
                    payload_container_type,
                    payload,
                    pdu_session_id: ies.get_u8(iei::PDU_SESSION_ID),
                    cause: ies.get_u8(iei::MM_CAUSE),
                    back_off_timer: ies.get(iei::BACK_OFF_TIMER).map(GprsTimer3::decode).transpose()?,
                })
            }
        };
        Ok(msg)
    }
}

fn decode_payload_container_type(octet: u8) -> CodecResult<PayloadContainerType> {
    PayloadContainerType::try_from(octet & 0x0F)
        .map_err(|_| CodecError::InvalidValue(format!("payload container type {}", octet & 0x0F)))
}
