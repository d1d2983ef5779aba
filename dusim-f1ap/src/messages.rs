//! F1AP elementary procedure messages used by the DU (TS 38.473 Section 9.2)

use bytes::{BufMut, Bytes, BytesMut};
use dusim_common::NrCgi;

use crate::codec::{
    procedure_code as pc, put_count, put_nr_cgi, put_octets, put_optional, put_string,
    F1apCodecError, PduType, Reader, Result, MAX_BODY_LENGTH,
};
use crate::ies::{Cause, CuToDuRrcInformation, DuToCuRrcInformation, ServedCellInformation};

/// gNB-CU UE F1AP ID / gNB-DU UE F1AP ID
pub type UeF1apId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F1SetupRequest {
    pub transaction_id: u8,
    pub gnb_du_id: u64,
    pub gnb_du_name: Option<String>,
    pub served_cells: Vec<ServedCellInformation>,
    /// Latest RRC version (3 bits)
    pub rrc_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F1SetupResponse {
    pub transaction_id: u8,
    pub gnb_cu_name: Option<String>,
    pub cells_to_be_activated: Vec<NrCgi>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F1SetupFailure {
    pub transaction_id: u8,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialUlRrcMessageTransfer {
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub nr_cgi: NrCgi,
    pub c_rnti: u16,
    pub rrc_container: Vec<u8>,
    pub du_to_cu_rrc_container: Option<Vec<u8>>,
}

/// UL or DL RRC Message Transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcMessageTransfer {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub srb_id: u8,
    pub rrc_container: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextSetupRequest {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: Option<UeF1apId>,
    pub sp_cell_id: NrCgi,
    pub serv_cell_index: u8,
    pub cu_to_du_rrc_information: Option<CuToDuRrcInformation>,
    pub rrc_container: Option<Vec<u8>>,
}

impl UeContextSetupRequest {
    /// True when the request prepares an incoming handover.
    pub fn is_handover(&self) -> bool {
        self.cu_to_du_rrc_information
            .as_ref()
            .is_some_and(|info| info.handover_preparation_information.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextSetupResponse {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub du_to_cu_rrc_information: DuToCuRrcInformation,
    pub c_rnti: Option<u16>,
    pub requested_target_cell_global_id: Option<NrCgi>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextSetupFailure {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: Option<UeF1apId>,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextModificationRequest {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub rrc_container: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextModificationResponse {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub du_to_cu_rrc_information: Option<DuToCuRrcInformation>,
}

/// DU-initiated modification; the simulator uses it to request a handover
/// towards `target_cell_pci`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextModificationRequired {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub target_cell_pci: u16,
    pub du_to_cu_rrc_information: Option<DuToCuRrcInformation>,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextModificationConfirm {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    /// RRC Reconfiguration (handover command) for the UE
    pub rrc_container: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextModificationRefuse {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseCommand {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
    pub cause: Cause,
    pub rrc_container: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseComplete {
    pub gnb_cu_ue_f1ap_id: UeF1apId,
    pub gnb_du_ue_f1ap_id: UeF1apId,
}

/// Every F1AP PDU the simulator sends or understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum F1apMessage {
    F1SetupRequest(F1SetupRequest),
    F1SetupResponse(F1SetupResponse),
    F1SetupFailure(F1SetupFailure),
    InitialUlRrcMessageTransfer(InitialUlRrcMessageTransfer),
    UlRrcMessageTransfer(RrcMessageTransfer),
    DlRrcMessageTransfer(RrcMessageTransfer),
    UeContextSetupRequest(UeContextSetupRequest),
    UeContextSetupResponse(UeContextSetupResponse),
    UeContextSetupFailure(UeContextSetupFailure),
    UeContextModificationRequest(UeContextModificationRequest),
    UeContextModificationResponse(UeContextModificationResponse),
    UeContextModificationRequired(UeContextModificationRequired),
    UeContextModificationConfirm(UeContextModificationConfirm),
    UeContextModificationRefuse(UeContextModificationRefuse),
    UeContextReleaseCommand(UeContextReleaseCommand),
    UeContextReleaseComplete(UeContextReleaseComplete),
}

impl F1apMessage {
    pub fn pdu_type(&self) -> PduType {
        use F1apMessage::*;
        match self {
            F1SetupRequest(_)
            | InitialUlRrcMessageTransfer(_)
            | UlRrcMessageTransfer(_)
            | DlRrcMessageTransfer(_)
            | UeContextSetupRequest(_)
            | UeContextModificationRequest(_)
            | UeContextModificationRequired(_)
            | UeContextReleaseCommand(_) => PduType::InitiatingMessage,
            F1SetupResponse(_)
            | UeContextSetupResponse(_)
            | UeContextModificationResponse(_)
            | UeContextModificationConfirm(_)
            | UeContextReleaseComplete(_) => PduType::SuccessfulOutcome,
            F1SetupFailure(_) | UeContextSetupFailure(_) | UeContextModificationRefuse(_) => {
                PduType::UnsuccessfulOutcome
            }
        }
    }

    pub fn procedure_code(&self) -> u8 {
        use F1apMessage::*;
        match self {
            F1SetupRequest(_) | F1SetupResponse(_) | F1SetupFailure(_) => pc::F1_SETUP,
            InitialUlRrcMessageTransfer(_) => pc::INITIAL_UL_RRC_MESSAGE_TRANSFER,
            UlRrcMessageTransfer(_) => pc::UL_RRC_MESSAGE_TRANSFER,
            DlRrcMessageTransfer(_) => pc::DL_RRC_MESSAGE_TRANSFER,
            UeContextSetupRequest(_) | UeContextSetupResponse(_) | UeContextSetupFailure(_) => {
                pc::UE_CONTEXT_SETUP
            }
            UeContextModificationRequest(_) | UeContextModificationResponse(_) => {
                pc::UE_CONTEXT_MODIFICATION
            }
            UeContextModificationRequired(_)
            | UeContextModificationConfirm(_)
            | UeContextModificationRefuse(_) => pc::UE_CONTEXT_MODIFICATION_REQUIRED,
            UeContextReleaseCommand(_) | UeContextReleaseComplete(_) => pc::UE_CONTEXT_RELEASE,
        }
    }

    pub fn name(&self) -> &'static str {
        use F1apMessage::*;
        match self {
            F1SetupRequest(_) => "F1SetupRequest",
            F1SetupResponse(_) => "F1SetupResponse",
            F1SetupFailure(_) => "F1SetupFailure",
            InitialUlRrcMessageTransfer(_) => "InitialULRRCMessageTransfer",
            UlRrcMessageTransfer(_) => "ULRRCMessageTransfer",
            DlRrcMessageTransfer(_) => "DLRRCMessageTransfer",
            UeContextSetupRequest(_) => "UEContextSetupRequest",
            UeContextSetupResponse(_) => "UEContextSetupResponse",
            UeContextSetupFailure(_) => "UEContextSetupFailure",
            UeContextModificationRequest(_) => "UEContextModificationRequest",
            UeContextModificationResponse(_) => "UEContextModificationResponse",
            UeContextModificationRequired(_) => "UEContextModificationRequired",
            UeContextModificationConfirm(_) => "UEContextModificationConfirm",
            UeContextModificationRefuse(_) => "UEContextModificationRefuse",
            UeContextReleaseCommand(_) => "UEContextReleaseCommand",
            UeContextReleaseComplete(_) => "UEContextReleaseComplete",
        }
    }

    /// Encodes the PDU with its header. Fails when a field or the body does
    /// not fit its length prefix.
    pub fn encode(&self) -> Result<Bytes> {
        let mut body = BytesMut::with_capacity(128);
        self.encode_body(&mut body)?;
        if body.len() > MAX_BODY_LENGTH {
            return Err(F1apCodecError::BodyTooLarge(body.len()));
        }

        let mut buf = BytesMut::with_capacity(4 + body.len());
        buf.put_u8(self.pdu_type().into());
        buf.put_u8(self.procedure_code());
        buf.put_u16(body.len() as u16);
        buf.extend_from_slice(&body);
        Ok(buf.freeze())
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            F1apMessage::F1SetupRequest(m) => {
                buf.put_u8(m.transaction_id);
                buf.put_u64(m.gnb_du_id);
                put_optional(buf, m.gnb_du_name.as_deref(), put_string)?;
                put_count(buf, "served cells", m.served_cells.len())?;
                for cell in &m.served_cells {
                    cell.encode_into(buf)?;
                }
                buf.put_u8(m.rrc_version);
            }
            F1apMessage::F1SetupResponse(m) => {
                buf.put_u8(m.transaction_id);
                put_optional(buf, m.gnb_cu_name.as_deref(), put_string)?;
                put_count(buf, "cells to be activated", m.cells_to_be_activated.len())?;
                for cgi in &m.cells_to_be_activated {
                    put_nr_cgi(buf, cgi);
                }
            }
            F1apMessage::F1SetupFailure(m) => {
                buf.put_u8(m.transaction_id);
                m.cause.encode_into(buf);
            }
            F1apMessage::InitialUlRrcMessageTransfer(m) => {
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                put_nr_cgi(buf, &m.nr_cgi);
                buf.put_u16(m.c_rnti);
                put_octets(buf, &m.rrc_container)?;
                put_optional(buf, m.du_to_cu_rrc_container.as_deref(), put_octets)?;
            }
            F1apMessage::UlRrcMessageTransfer(m) | F1apMessage::DlRrcMessageTransfer(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                buf.put_u8(m.srb_id);
                put_octets(buf, &m.rrc_container)?;
            }
            F1apMessage::UeContextSetupRequest(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                put_optional(buf, m.gnb_du_ue_f1ap_id.as_ref(), put_id)?;
                put_nr_cgi(buf, &m.sp_cell_id);
                buf.put_u8(m.serv_cell_index);
                put_optional(buf, m.cu_to_du_rrc_information.as_ref(), |b, info| {
                    info.encode_into(b)
                })?;
                put_optional(buf, m.rrc_container.as_deref(), put_octets)?;
            }
            F1apMessage::UeContextSetupResponse(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                m.du_to_cu_rrc_information.encode_into(buf)?;
                put_optional(buf, m.c_rnti.as_ref(), |b, rnti| {
                    b.put_u16(*rnti);
                    Ok(())
                })?;
                put_optional(buf, m.requested_target_cell_global_id.as_ref(), |b, cgi| {
                    put_nr_cgi(b, cgi);
                    Ok(())
                })?;
            }
            F1apMessage::UeContextSetupFailure(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                put_optional(buf, m.gnb_du_ue_f1ap_id.as_ref(), put_id)?;
                m.cause.encode_into(buf);
            }
            F1apMessage::UeContextModificationRequest(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                put_optional(buf, m.rrc_container.as_deref(), put_octets)?;
            }
            F1apMessage::UeContextModificationResponse(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                put_optional(buf, m.du_to_cu_rrc_information.as_ref(), |b, info| {
                    info.encode_into(b)
                })?;
            }
            F1apMessage::UeContextModificationRequired(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                buf.put_u16(m.target_cell_pci);
                put_optional(buf, m.du_to_cu_rrc_information.as_ref(), |b, info| {
                    info.encode_into(b)
                })?;
                m.cause.encode_into(buf);
            }
            F1apMessage::UeContextModificationConfirm(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                put_optional(buf, m.rrc_container.as_deref(), put_octets)?;
            }
            F1apMessage::UeContextModificationRefuse(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                m.cause.encode_into(buf);
            }
            F1apMessage::UeContextReleaseCommand(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
                m.cause.encode_into(buf);
                put_optional(buf, m.rrc_container.as_deref(), put_octets)?;
            }
            F1apMessage::UeContextReleaseComplete(m) => {
                buf.put_u32(m.gnb_cu_ue_f1ap_id);
                buf.put_u32(m.gnb_du_ue_f1ap_id);
            }
        }
        Ok(())
    }

    /// Decodes one PDU. Trailing bytes after the declared body are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut header = Reader::new(data);
        let raw_type = header.u8()?;
        let pdu_type =
            PduType::try_from(raw_type).map_err(|_| F1apCodecError::UnknownPduType(raw_type))?;
        let procedure_code = header.u8()?;
        let len = header.u16()? as usize;
        if len > MAX_BODY_LENGTH {
            return Err(F1apCodecError::BodyTooLarge(len));
        }
        let body = data.get(4..4 + len).ok_or(F1apCodecError::BufferTooShort {
            needed: 4 + len,
            available: data.len(),
        })?;
        let mut r = Reader::new(body);

        let msg = match (pdu_type, procedure_code) {
            (PduType::InitiatingMessage, pc::F1_SETUP) => {
                let transaction_id = r.u8()?;
                let gnb_du_id = r.u64()?;
                let gnb_du_name = r.optional(|r| r.string())?;
                let count = r.u8()?;
                let served_cells = (0..count)
                    .map(|_| ServedCellInformation::decode_from(&mut r))
                    .collect::<Result<Vec<_>>>()?;
                F1apMessage::F1SetupRequest(F1SetupRequest {
                    transaction_id,
                    gnb_du_id,
                    gnb_du_name,
                    served_cells,
                    rrc_version: r.u8()?,
                })
            }
            (PduType::SuccessfulOutcome, pc::F1_SETUP) => {
                let transaction_id = r.u8()?;
                let gnb_cu_name = r.optional(|r| r.string())?;
                let count = r.u8()?;
                let cells_to_be_activated = (0..count).map(|_| r.nr_cgi()).collect::<Result<Vec<_>>>()?;
                F1apMessage::F1SetupResponse(F1SetupResponse {
                    transaction_id,
                    gnb_cu_name,
                    cells_to_be_activated,
                })
            }
            (PduType::UnsuccessfulOutcome, pc::F1_SETUP) => {
                F1apMessage::F1SetupFailure(F1SetupFailure {
                    transaction_id: r.u8()?,
                    cause: Cause::decode_from(&mut r)?,
                })
            }
            (PduType::InitiatingMessage, pc::INITIAL_UL_RRC_MESSAGE_TRANSFER) => {
                F1apMessage::InitialUlRrcMessageTransfer(InitialUlRrcMessageTransfer {
                    gnb_du_ue_f1ap_id: r.u32()?,
                    nr_cgi: r.nr_cgi()?,
                    c_rnti: r.u16()?,
                    rrc_container: r.octets()?,
                    du_to_cu_rrc_container: r.optional(|r| r.octets())?,
                })
            }
            (PduType::InitiatingMessage, pc::UL_RRC_MESSAGE_TRANSFER) => {
                F1apMessage::UlRrcMessageTransfer(decode_rrc_transfer(&mut r)?)
            }
            (PduType::InitiatingMessage, pc::DL_RRC_MESSAGE_TRANSFER) => {
                F1apMessage::DlRrcMessageTransfer(decode_rrc_transfer(&mut r)?)
            }
            (PduType::InitiatingMessage, pc::UE_CONTEXT_SETUP) => {
                F1apMessage::UeContextSetupRequest(UeContextSetupRequest {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.optional(|r| r.u32())?,
                    sp_cell_id: r.nr_cgi()?,
                    serv_cell_index: r.u8()?,
                    cu_to_du_rrc_information: r.optional(CuToDuRrcInformation::decode_from)?,
                    rrc_container: r.optional(|r| r.octets())?,
                })
            }
            (PduType::SuccessfulOutcome, pc::UE_CONTEXT_SETUP) => {
                F1apMessage::UeContextSetupResponse(UeContextSetupResponse {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                    du_to_cu_rrc_information: DuToCuRrcInformation::decode_from(&mut r)?,
                    c_rnti: r.optional(|r| r.u16())?,
                    requested_target_cell_global_id: r.optional(|r| r.nr_cgi())?,
                })
            }
            (PduType::UnsuccessfulOutcome, pc::UE_CONTEXT_SETUP) => {
                F1apMessage::UeContextSetupFailure(UeContextSetupFailure {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.optional(|r| r.u32())?,
                    cause: Cause::decode_from(&mut r)?,
                })
            }
            (PduType::InitiatingMessage, pc::UE_CONTEXT_MODIFICATION) => {
                F1apMessage::UeContextModificationRequest(UeContextModificationRequest {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                    rrc_container: r.optional(|r| r.octets())?,
                })
            }
            (PduType::SuccessfulOutcome, pc::UE_CONTEXT_MODIFICATION) => {
                F1apMessage::UeContextModificationResponse(UeContextModificationResponse {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                    du_to_cu_rrc_information: r.optional(DuToCuRrcInformation::decode_from)?,
                })
            }
            (PduType::InitiatingMessage, pc::UE_CONTEXT_MODIFICATION_REQUIRED) => {
                F1apMessage::UeContextModificationRequired(UeContextModificationRequired {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                    target_cell_pci: r.u16()?,
                    du_to_cu_rrc_information: r.optional(DuToCuRrcInformation::decode_from)?,
                    cause: Cause::decode_from(&mut r)?,
                })
            }
            (PduType::SuccessfulOutcome, pc::UE_CONTEXT_MODIFICATION_REQUIRED) => {
                F1apMessage::UeContextModificationConfirm(UeContextModificationConfirm {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                    rrc_container: r.optional(|r| r.octets())?,
                })
            }
            (PduType::UnsuccessfulOutcome, pc::UE_CONTEXT_MODIFICATION_REQUIRED) => {
                F1apMessage::UeContextModificationRefuse(UeContextModificationRefuse {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                    cause: Cause::decode_from(&mut r)?,
                })
            }
            (PduType::InitiatingMessage, pc::UE_CONTEXT_RELEASE) => {
                F1apMessage::UeContextReleaseCommand(UeContextReleaseCommand {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                    cause: Cause::decode_from(&mut r)?,
                    rrc_container: r.optional(|r| r.octets())?,
                })
            }
            (PduType::SuccessfulOutcome, pc::UE_CONTEXT_RELEASE) => {
                F1apMessage::UeContextReleaseComplete(UeContextReleaseComplete {
                    gnb_cu_ue_f1ap_id: r.u32()?,
                    gnb_du_ue_f1ap_id: r.u32()?,
                })
            }
            _ => {
                return Err(F1apCodecError::UnknownProcedure {
                    pdu_type,
                    procedure_code,
                })
            }
        };
        Ok(msg)
    }
}

fn put_id(buf: &mut BytesMut, id: &UeF1apId) -> Result<()> {
    buf.put_u32(*id);
    Ok(())
}

fn decode_rrc_transfer(r: &mut Reader<'_>) -> Result<RrcMessageTransfer> {
    Ok(RrcMessageTransfer {
        gnb_cu_ue_f1ap_id: r.u32()?,
        gnb_du_ue_f1ap_id: r.u32()?,
        srb_id: r.u8()?,
        rrc_container: r.octets()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dusim_common::Plmn;

    fn plmn() -> Plmn {
        Plmn::new(208, 93, false)
    }

    #[test]
    fn test_f1_setup_request_roundtrip() {
        let msg = F1apMessage::F1SetupRequest(F1SetupRequest {
            transaction_id: 1,
            gnb_du_id: 1,
            gnb_du_name: Some("du-1".to_string()),
            served_cells: vec![ServedCellInformation {
                nr_cgi: NrCgi::for_pci(plmn(), 1),
                nr_pci: 1,
                five_gs_tac: [0, 0, 1],
                served_plmns: vec![plmn()],
            }],
            rrc_version: 0x06,
        });
        let encoded = msg.encode().expect("encode");
        assert_eq!(&encoded[..2], &[0x00, 0x01]);
        assert_eq!(u16::from_be_bytes([encoded[2], encoded[3]]) as usize, encoded.len() - 4);
        assert_eq!(F1apMessage::decode(&encoded).expect("decode"), msg);
    }

    #[test]
    fn test_header_codes() {
        let transfer = RrcMessageTransfer {
            gnb_cu_ue_f1ap_id: 7,
            gnb_du_ue_f1ap_id: 0,
            srb_id: 1,
            rrc_container: vec![0x04, 0x00],
        };
        let dl = F1apMessage::DlRrcMessageTransfer(transfer.clone())
            .encode()
            .expect("encode");
        assert_eq!(&dl[..2], &[0x00, 12]);
        let ul = F1apMessage::UlRrcMessageTransfer(transfer)
            .encode()
            .expect("encode");
        assert_eq!(&ul[..2], &[0x00, 13]);

        let confirm = F1apMessage::UeContextModificationConfirm(UeContextModificationConfirm {
            gnb_cu_ue_f1ap_id: 1,
            gnb_du_ue_f1ap_id: 0,
            rrc_container: Some(vec![1, 2, 3]),
        })
        .encode()
        .expect("encode");
        assert_eq!(&confirm[..2], &[0x01, 8]);
    }

    #[test]
    fn test_ue_context_setup_request_handover_flag() {
        let mut req = UeContextSetupRequest {
            gnb_cu_ue_f1ap_id: 3,
            gnb_du_ue_f1ap_id: Some(9),
            sp_cell_id: NrCgi::for_pci(plmn(), 2),
            serv_cell_index: 0,
            cu_to_du_rrc_information: None,
            rrc_container: None,
        };
        assert!(!req.is_handover());
        req.cu_to_du_rrc_information = Some(CuToDuRrcInformation {
            cg_config_info: None,
            handover_preparation_information: Some(vec![0xAB]),
        });
        assert!(req.is_handover());

        let msg = F1apMessage::UeContextSetupRequest(req);
        let encoded = msg.encode().expect("encode");
        assert_eq!(F1apMessage::decode(&encoded).expect("decode"), msg);
    }

    #[test]
    fn test_setup_response_with_crnti_and_cgi() {
        let msg = F1apMessage::UeContextSetupResponse(UeContextSetupResponse {
            gnb_cu_ue_f1ap_id: 3,
            gnb_du_ue_f1ap_id: 0,
            du_to_cu_rrc_information: DuToCuRrcInformation::default(),
            c_rnti: Some(1),
            requested_target_cell_global_id: Some(NrCgi::for_pci(plmn(), 1)),
        });
        let encoded = msg.encode().expect("encode");
        assert_eq!(F1apMessage::decode(&encoded).expect("decode"), msg);
    }

    #[test]
    fn test_oversize_rrc_container_fails_to_encode() {
        let msg = F1apMessage::UlRrcMessageTransfer(RrcMessageTransfer {
            gnb_cu_ue_f1ap_id: 1,
            gnb_du_ue_f1ap_id: 0,
            srb_id: 1,
            rrc_container: vec![0x5A; 70_000],
        });
        assert!(matches!(
            msg.encode(),
            Err(F1apCodecError::FieldTooLong { len: 70_000, .. })
        ));

        // Fits its own prefix but not the body limit
        let msg = F1apMessage::DlRrcMessageTransfer(RrcMessageTransfer {
            gnb_cu_ue_f1ap_id: 1,
            gnb_du_ue_f1ap_id: 0,
            srb_id: 1,
            rrc_container: vec![0x5A; MAX_BODY_LENGTH],
        });
        assert_eq!(
            msg.encode(),
            Err(F1apCodecError::BodyTooLarge(MAX_BODY_LENGTH + 11))
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            F1apMessage::decode(&[0x05, 0x01, 0, 0]),
            Err(F1apCodecError::UnknownPduType(5))
        );
        assert_eq!(
            F1apMessage::decode(&[0x02, 12, 0, 0]),
            Err(F1apCodecError::UnknownProcedure {
                pdu_type: PduType::UnsuccessfulOutcome,
                procedure_code: 12
            })
        );
        assert!(matches!(
            F1apMessage::decode(&[0x00, 12, 0, 10, 0]),
            Err(F1apCodecError::BufferTooShort { .. })
        ));
        assert!(matches!(
            F1apMessage::decode(&[0x00, 12, 0, 2, 0, 0]),
            Err(F1apCodecError::BufferTooShort { .. })
        ));
    }
}
