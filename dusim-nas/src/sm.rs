//! 5GS session management messages (TS 24.501 Section 8.3)
//!
//! Every 5GSM message starts with EPD, PDU session identity, procedure
//! transaction identity and message type. QoS rules and QoS flow
//! descriptions are carried as opaque octets.

use bytes::BufMut;

use crate::codec::{
    get_bytes, get_lv, get_lv_e, get_u8, iei, put_lv, put_lv_e, put_tlv, put_tlv_e, put_tv,
    put_tv1, CodecError, CodecResult, OptionalIes,
};
use crate::enums::{PduSessionType, SmMessageType};
use crate::ies::{decode_s_nssai, encode_s_nssai, Dnn, GprsTimer3, PduAddress, SessionAmbr};
use dusim_common::SNssai;

/// SSC mode 1, the only mode the UE requests.
pub const SSC_MODE_1: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentRequest {
    /// Integrity protection maximum data rate (uplink, downlink)
    pub integrity_max_data_rate: [u8; 2],
    pub pdu_session_type: Option<PduSessionType>,
    pub ssc_mode: Option<u8>,
}

impl Default for PduSessionEstablishmentRequest {
    fn default() -> Self {
        Self {
            integrity_max_data_rate: [0xFF, 0xFF],
            pdu_session_type: Some(PduSessionType::Ipv4),
            ssc_mode: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentAccept {
    pub pdu_session_type: PduSessionType,
    pub ssc_mode: u8,
    pub authorized_qos_rules: Vec<u8>,
    pub session_ambr: SessionAmbr,
    pub cause: Option<u8>,
    pub pdu_address: Option<PduAddress>,
    pub s_nssai: Option<SNssai>,
    pub qos_flow_descriptions: Option<Vec<u8>>,
    pub dnn: Option<Dnn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentReject {
    pub cause: u8,
    pub back_off_timer: Option<GprsTimer3>,
    pub allowed_ssc_mode: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionModificationRequest {
    pub cause: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionModificationReject {
    pub cause: u8,
    pub back_off_timer: Option<GprsTimer3>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionModificationCommand {
    pub cause: Option<u8>,
    pub session_ambr: Option<SessionAmbr>,
    pub authorized_qos_rules: Option<Vec<u8>>,
    pub qos_flow_descriptions: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionReleaseRequest {
    pub cause: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionReleaseCommand {
    pub cause: u8,
    pub back_off_timer: Option<GprsTimer3>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionReleaseComplete {
    pub cause: Option<u8>,
}

/// 5GSM message body, one variant per message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmBody {
    EstablishmentRequest(PduSessionEstablishmentRequest),
    EstablishmentAccept(PduSessionEstablishmentAccept),
    EstablishmentReject(PduSessionEstablishmentReject),
    ModificationRequest(PduSessionModificationRequest),
    ModificationReject(PduSessionModificationReject),
    ModificationCommand(PduSessionModificationCommand),
    ModificationComplete,
    ReleaseRequest(PduSessionReleaseRequest),
    ReleaseReject { cause: u8 },
    ReleaseCommand(PduSessionReleaseCommand),
    ReleaseComplete(PduSessionReleaseComplete),
    Status { cause: u8 },
}

/// A 5GSM message with its session header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmMessage {
    pub pdu_session_id: u8,
    pub pti: u8,
    pub body: SmBody,
}

impl SmMessage {
    pub fn new(pdu_session_id: u8, pti: u8, body: SmBody) -> Self {
        Self {
            pdu_session_id,
            pti,
            body,
        }
    }

    pub fn message_type(&self) -> SmMessageType {
        match &self.body {
            SmBody::EstablishmentRequest(_) => SmMessageType::PduSessionEstablishmentRequest,
            SmBody::EstablishmentAccept(_) => SmMessageType::PduSessionEstablishmentAccept,
            SmBody::EstablishmentReject(_) => SmMessageType::PduSessionEstablishmentReject,
            SmBody::ModificationRequest(_) => SmMessageType::PduSessionModificationRequest,
            SmBody::ModificationReject(_) => SmMessageType::PduSessionModificationReject,
            SmBody::ModificationCommand(_) => SmMessageType::PduSessionModificationCommand,
            SmBody::ModificationComplete => SmMessageType::PduSessionModificationComplete,
            SmBody::ReleaseRequest(_) => SmMessageType::PduSessionReleaseRequest,
            SmBody::ReleaseReject { .. } => SmMessageType::PduSessionReleaseReject,
            SmBody::ReleaseCommand(_) => SmMessageType::PduSessionReleaseCommand,
            SmBody::ReleaseComplete(_) => SmMessageType::PduSessionReleaseComplete,
            SmBody::Status { .. } => SmMessageType::FiveGsmStatus,
        }
    }

    pub(crate) fn encode_body(&self, buf: &mut Vec<u8>) -> CodecResult<()> {
        match &self.body {
            SmBody::EstablishmentRequest(m) => {
                buf.put_slice(&m.integrity_max_data_rate);
                if let Some(session_type) = m.pdu_session_type {
                    put_tv1(buf, iei::PDU_SESSION_TYPE, u8::from(session_type));
                }
                if let Some(ssc_mode) = m.ssc_mode {
                    put_tv1(buf, iei::SSC_MODE, ssc_mode);
                }
            }
            SmBody::EstablishmentAccept(m) => {
                buf.put_u8((m.ssc_mode << 4) | (u8::from(m.pdu_session_type) & 0x07));
                put_lv_e(buf, &m.authorized_qos_rules)?;
                put_lv(buf, &m.session_ambr.encode())?;
                if let Some(cause) = m.cause {
                    put_tv(buf, iei::SM_CAUSE, &[cause]);
                }
                if let Some(address) = &m.pdu_address {
                    put_tlv(buf, iei::PDU_ADDRESS, &address.encode())?;
                }
                if let Some(s_nssai) = &m.s_nssai {
                    put_tlv(buf, iei::S_NSSAI, &encode_s_nssai(s_nssai))?;
                }
                if let Some(flows) = &m.qos_flow_descriptions {
                    put_tlv_e(buf, iei::QOS_FLOW_DESCRIPTIONS, flows)?;
                }
                if let Some(dnn) = &m.dnn {
                    put_tlv(buf, iei::DNN, &dnn.encode()?)?;
                }
            }
            SmBody::EstablishmentReject(m) => {
                buf.put_u8(m.cause);
                if let Some(timer) = &m.back_off_timer {
                    put_tlv(buf, iei::BACK_OFF_TIMER, &[timer.0])?;
                }
                if let Some(mode) = m.allowed_ssc_mode {
                    put_tv1(buf, iei::ALLOWED_SSC_MODE, mode);
                }
            }
            SmBody::ModificationRequest(PduSessionModificationRequest { cause })
            | SmBody::ReleaseRequest(PduSessionReleaseRequest { cause })
            | SmBody::ReleaseComplete(PduSessionReleaseComplete { cause }) => {
                if let Some(cause) = cause {
                    put_tv(buf, iei::SM_CAUSE, &[*cause]);
                }
            }
            SmBody::ModificationReject(PduSessionModificationReject { cause, back_off_timer })
            | SmBody::ReleaseCommand(PduSessionReleaseCommand { cause, back_off_timer }) => {
                buf.put_u8(*cause);
                if let Some(timer) = back_off_timer {
                    put_tlv(buf, iei::BACK_OFF_TIMER, &[timer.0])?;
                }
            }
            SmBody::ModificationCommand(m) => {
                if let Some(cause) = m.cause {
                    put_tv(buf, iei::SM_CAUSE, &[cause]);
                }
                if let Some(ambr) = &m.session_ambr {
                    put_tlv(buf, iei::SESSION_AMBR, &ambr.encode())?;
                }
                if let Some(rules) = &m.authorized_qos_rules {
                    put_tlv_e(buf, iei::QOS_RULES, rules)?;
                }
                if let Some(flows) = &m.qos_flow_descriptions {
                    put_tlv_e(buf, iei::QOS_FLOW_DESCRIPTIONS, flows)?;
                }
            }
            SmBody::ModificationComplete => {}
            SmBody::ReleaseReject { cause } | SmBody::Status { cause } => buf.put_u8(*cause),
        }
        Ok(())
    }

    pub(crate) fn decode_body(
        pdu_session_id: u8,
        pti: u8,
        message_type: SmMessageType,
        buf: &mut &[u8],
    ) -> CodecResult<Self> {
        let body = match message_type {
            SmMessageType::PduSessionEstablishmentRequest => {
                let rate = get_bytes(buf, 2)?;
                let ies = OptionalIes::decode(buf)?;
                SmBody::EstablishmentRequest(PduSessionEstablishmentRequest {
                    integrity_max_data_rate: [rate[0], rate[1]],
                    pdu_session_type: ies
                        .get_half(iei::PDU_SESSION_TYPE)
                        .and_then(|v| PduSessionType::try_from(v & 0x07).ok()),
                    ssc_mode: ies.get_half(iei::SSC_MODE).map(|v| v & 0x07),
                })
            }
            SmMessageType::PduSessionEstablishmentAccept => {
                let octet = get_u8(buf)?;
                let pdu_session_type = PduSessionType::try_from(octet & 0x07).map_err(|_| {
                    CodecError::InvalidValue(format!("PDU session type {}", octet & 0x07))
                })?;
                let authorized_qos_rules = get_lv_e(buf)?;
                let session_ambr = SessionAmbr::decode(&get_lv(buf)?)?;
                let ies = OptionalIes::decode(buf)?;
                SmBody::EstablishmentAccept(PduSessionEstablishmentAccept {
                    pdu_session_type,
                    ssc_mode: (octet >> 4) & 0x07,
                    authorized_qos_rules,
                    session_ambr,
                    cause: ies.get_u8(iei::SM_CAUSE),
                    pdu_address: ies.get(iei::PDU_ADDRESS).map(PduAddress::decode).transpose()?,
                    s_nssai: ies.get(iei::S_NSSAI).map(decode_s_nssai).transpose()?,
                    qos_flow_descriptions: ies.get(iei::QOS_FLOW_DESCRIPTIONS).map(<[u8]>::to_vec),
                    dnn: ies.get(iei::DNN).map(Dnn::decode).transpose()?,
                })
            }
            SmMessageType::PduSessionEstablishmentReject => {
                let cause = get_u8(buf)?;
                let ies = OptionalIes::decode(buf)?;
                SmBody::EstablishmentReject(PduSessionEstablishmentReject {
                    cause,
                    back_off_timer: ies.get(iei::BACK_OFF_TIMER).map(GprsTimer3::decode).transpose()?,
                    allowed_ssc_mode: ies.get_half(iei::ALLOWED_SSC_MODE),
                })
            }
            SmMessageType::PduSessionModificationRequest => {
                let ies = OptionalIes::decode(buf)?;
                SmBody::ModificationRequest(PduSessionModificationRequest {
                    cause: ies.get_u8(iei::SM_CAUSE),
                })
            }
            SmMessageType::PduSessionModificationReject => {
                let cause = get_u8(buf)?;
                let ies = OptionalIes::decode(buf)?;
                SmBody::ModificationReject(PduSessionModificationReject {
                    cause,
                    back_off_timer: ies.get(iei::BACK_OFF_TIMER).map(GprsTimer3::decode).transpose()?,
                })
            }
            SmMessageType::PduSessionModificationCommand => {
                let ies = OptionalIes::decode(buf)?;
                SmBody::ModificationCommand(PduSessionModificationCommand {
                    cause: ies.get_u8(iei::SM_CAUSE),
                    session_ambr: ies.get(iei::SESSION_AMBR).map(SessionAmbr::decode).transpose()?,
                    authorized_qos_rules: ies.get(iei::QOS_RULES).map(<[u8]>::to_vec),
                    qos_flow_descriptions: ies.get(iei::QOS_FLOW_DESCRIPTIONS).map(<[u8]>::to_vec),
                })
            }
            SmMessageType::PduSessionModificationComplete => SmBody::ModificationComplete,
            SmMessageType::PduSessionReleaseRequest => {
                let ies = OptionalIes::decode(buf)?;
                SmBody::ReleaseRequest(PduSessionReleaseRequest {
                    cause: ies.get_u8(iei::SM_CAUSE),
                })
            }
            SmMessageType::PduSessionReleaseReject => SmBody::ReleaseReject { cause: get_u8(buf)? },
            SmMessageType::PduSessionReleaseCommand => {
                let cause = get_u8(buf)?;
                let ies = OptionalIes::decode(buf)?;
                SmBody::ReleaseCommand(PduSessionReleaseCommand {
                    cause,
                    back_off_timer: ies.get(iei::BACK_OFF_TIMER).map(GprsTimer3::decode).transpose()?,
                })
            }
            SmMessageType::PduSessionReleaseComplete => {
                let ies = OptionalIes::decode(buf)?;
                SmBody::ReleaseComplete(PduSessionReleaseComplete {
                    cause: ies.get_u8(iei::SM_CAUSE),
                })
            }
            SmMessageType::FiveGsmStatus => SmBody::Status { cause: get_u8(buf)? },
            SmMessageType::PduSessionModificationCommandReject => {
                return Err(CodecError::UnknownMessageType(message_type.into()))
            }
        };
        Ok(Self {
            pdu_session_id,
            pti,
            body,
        })
    }
}
