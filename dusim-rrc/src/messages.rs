//! RRC messages per logical channel (TS 38.331 Section 6.2)

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::cell_group::CellGroupConfig;
use crate::codec::{
    ensure, get_bool, get_octets, get_u8, put_bool, put_count, put_octets, read_header,
    write_header, LogicalChannel, Result, RrcCodecError,
};
use crate::measurement::MeasurementReport;

/// Mask of the 39-bit random UE identity in RRC Setup Request.
pub const UE_IDENTITY_MASK: u64 = (1 << 39) - 1;

/// EstablishmentCause (TS 38.331 Section 6.2.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum EstablishmentCause {
    Emergency = 0,
    HighPriorityAccess = 1,
    MtAccess = 2,
    #[default]
    MoSignalling = 3,
    MoData = 4,
    MoVoiceCall = 5,
    MoVideoCall = 6,
    MoSms = 7,
    MpsPriorityAccess = 8,
    McsPriorityAccess = 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcSetupRequest {
    /// Random 39-bit value
    pub ue_identity: u64,
    pub establishment_cause: EstablishmentCause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlCcchMessage {
    RrcSetupRequest(RrcSetupRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcSetup {
    pub transaction_id: u8,
    /// Encoded [`CellGroupConfig`]
    pub master_cell_group: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlCcchMessage {
    RrcSetup(RrcSetup),
    RrcReject { wait_time: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcSetupComplete {
    pub transaction_id: u8,
    pub selected_plmn_identity: u8,
    pub dedicated_nas_message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlDcchMessage {
    RrcSetupComplete(RrcSetupComplete),
    UlInformationTransfer { dedicated_nas_message: Vec<u8> },
    MeasurementReport(MeasurementReport),
    RrcReconfigurationComplete { transaction_id: u8 },
    SecurityModeComplete { transaction_id: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RrcReconfiguration {
    pub transaction_id: u8,
    /// Encoded [`CellGroupConfig`]
    pub secondary_cell_group: Option<Vec<u8>>,
    pub dedicated_nas_message_list: Vec<Vec<u8>>,
}

impl RrcReconfiguration {
    pub fn cell_group(&self) -> Result<Option<CellGroupConfig>> {
        self.secondary_cell_group
            .as_deref()
            .map(CellGroupConfig::decode)
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlDcchMessage {
    DlInformationTransfer { dedicated_nas_message: Vec<u8> },
    RrcReconfiguration(RrcReconfiguration),
    RrcRelease { transaction_id: u8 },
    SecurityModeCommand {
        transaction_id: u8,
        ciphering_algorithm: u8,
        integrity_algorithm: u8,
    },
}

impl UlCcchMessage {
    pub fn name(&self) -> &'static str {
        match self {
            UlCcchMessage::RrcSetupRequest(_) => "RRCSetupRequest",
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        match self {
            UlCcchMessage::RrcSetupRequest(req) => {
                write_header(&mut buf, LogicalChannel::UlCcch, 0);
                let identity = (req.ue_identity & UE_IDENTITY_MASK).to_be_bytes();
                buf.put_slice(&identity[3..]);
                buf.put_u8(req.establishment_cause.into());
            }
        }
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        match read_header(&mut buf, LogicalChannel::UlCcch)? {
            0 => {
                ensure(buf, 6)?;
                let mut identity = [0u8; 8];
                identity[3..].copy_from_slice(&buf[..5]);
                let cause = buf[5];
                Ok(UlCcchMessage::RrcSetupRequest(RrcSetupRequest {
                    ue_identity: u64::from_be_bytes(identity) & UE_IDENTITY_MASK,
                    establishment_cause: EstablishmentCause::try_from(cause).map_err(|_| {
                        RrcCodecError::InvalidValue(format!("establishment cause {cause}"))
                    })?,
                }))
            }
            other => Err(RrcCodecError::UnknownMessageType {
                channel: LogicalChannel::UlCcch,
                message_type: other,
            }),
        }
    }
}

impl DlCcchMessage {
    pub fn name(&self) -> &'static str {
        match self {
            DlCcchMessage::RrcSetup(_) => "RRCSetup",
            DlCcchMessage::RrcReject { .. } => "RRCReject",
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(16);
        match self {
            DlCcchMessage::RrcSetup(setup) => {
                write_header(&mut buf, LogicalChannel::DlCcch, 0);
                buf.put_u8(setup.transaction_id);
                put_octets(&mut buf, &setup.master_cell_group)?;
            }
            DlCcchMessage::RrcReject { wait_time } => {
                write_header(&mut buf, LogicalChannel::DlCcch, 1);
                buf.put_u8(*wait_time);
            }
        }
        Ok(buf.freeze())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        match read_header(&mut buf, LogicalChannel::DlCcch)? {
            0 => Ok(DlCcchMessage::RrcSetup(RrcSetup {
                transaction_id: get_u8(&mut buf)?,
                master_cell_group: get_octets(&mut buf)?,
            })),
            1 => Ok(DlCcchMessage::RrcReject {
                wait_time: get_u8(&mut buf)?,
            }),
            other => Err(RrcCodecError::UnknownMessageType {
                channel: LogicalChannel::DlCcch,
                message_type: other,
            }),
        }
    }
}

impl UlDcchMessage {
    pub fn name(&self) -> &'static str {
        match self {
            UlDcchMessage::RrcSetupComplete(_) => "RRCSetupComplete",
            UlDcchMessage::UlInformationTransfer { .. } => "ULInformationTransfer",
            UlDcchMessage::MeasurementReport(_) => "MeasurementReport",
            UlDcchMessage::RrcReconfigurationComplete { .. } => "RRCReconfigurationComplete",
            UlDcchMessage::SecurityModeComplete { .. } => "SecurityModeComplete",
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(64);
        match self {
            UlDcchMessage::RrcSetupComplete(complete) => {
                write_header(&mut buf, LogicalChannel::UlDcch, 0);
                buf.put_u8(complete.transaction_id);
                buf.put_u8(complete.selected_plmn_identity);
                put_octets(&mut buf, &complete.dedicated_nas_message)?;
            }
            UlDcchMessage::UlInformationTransfer {
                dedicated_nas_message,
            } => {
                write_header(&mut buf, LogicalChannel::UlDcch, 1);
                put_octets(&mut buf, dedicated_nas_message)?;
            }
            UlDcchMessage::MeasurementReport(report) => {
                write_header(&mut buf, LogicalChannel::UlDcch, 2);
                report.encode_into(&mut buf)?;
            }
            UlDcchMessage::RrcReconfigurationComplete { transaction_id } => {
                write_header(&mut buf, LogicalChannel::UlDcch, 3);
                buf.put_u8(*transaction_id);
            }
            UlDcchMessage::SecurityModeComplete { transaction_id } => {
                write_header(&mut buf, LogicalChannel::UlDcch, 4);
                buf.put_u8(*transaction_id);
            }
        }
        Ok(buf.freeze())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        match read_header(&mut buf, LogicalChannel::UlDcch)? {
            0 => Ok(UlDcchMessage::RrcSetupComplete(RrcSetupComplete {
                transaction_id: get_u8(&mut buf)?,
                selected_plmn_identity: get_u8(&mut buf)?,
                dedicated_nas_message: get_octets(&mut buf)?,
            })),
            1 => Ok(UlDcchMessage::UlInformationTransfer {
                dedicated_nas_message: get_octets(&mut buf)?,
            }),
            2 => Ok(UlDcchMessage::MeasurementReport(
                MeasurementReport::decode_from(&mut buf)?,
            )),
            3 => Ok(UlDcchMessage::RrcReconfigurationComplete {
                transaction_id: get_u8(&mut buf)?,
            }),
            4 => Ok(UlDcchMessage::SecurityModeComplete {
                transaction_id: get_u8(&mut buf)?,
            }),
            other => Err(RrcCodecError::UnknownMessageType {
                channel: LogicalChannel::UlDcch,
                message_type: other,
            }),
        }
    }
}

impl DlDcchMessage {
    pub fn name(&self) -> &'static str {
        match self {
            DlDcchMessage::DlInformationTransfer { .. } => "DLInformationTransfer",
            DlDcchMessage::RrcReconfiguration(_) => "RRCReconfiguration",
            DlDcchMessage::RrcRelease { .. } => "RRCRelease",
            DlDcchMessage::SecurityModeCommand { .. } => "SecurityModeCommand",
        }
    }

    /// Fails when a NAS PDU or cell group does not fit its length prefix.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(64);
        match self {
            DlDcchMessage::DlInformationTransfer {
                dedicated_nas_message,
            } => {
                write_header(&mut buf, LogicalChannel::DlDcch, 0);
                put_octets(&mut buf, dedicated_nas_message)?;
            }
            DlDcchMessage::RrcReconfiguration(reconfig) => {
                write_header(&mut buf, LogicalChannel::DlDcch, 1);
                buf.put_u8(reconfig.transaction_id);
                put_bool(&mut buf, reconfig.secondary_cell_group.is_some());
                if let Some(cell_group) = &reconfig.secondary_cell_group {
                    put_octets(&mut buf, cell_group)?;
                }
                put_count(&mut buf, "NAS message list", reconfig.dedicated_nas_message_list.len())?;
                for nas in &reconfig.dedicated_nas_message_list {
                    put_octets(&mut buf, nas)?;
                }
            }
            DlDcchMessage::RrcRelease { transaction_id } => {
                write_header(&mut buf, LogicalChannel::DlDcch, 2);
                buf.put_u8(*transaction_id);
            }
            DlDcchMessage::SecurityModeCommand {
                transaction_id,
                ciphering_algorithm,
                integrity_algorithm,
            } => {
                write_header(&mut buf, LogicalChannel::DlDcch, 3);
                buf.put_u8(*transaction_id);
                buf.put_u8(*ciphering_algorithm);
                buf.put_u8(*integrity_algorithm);
            }
        }
        Ok(buf.freeze())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        match read_header(&mut buf, LogicalChannel::DlDcch)? {
            0 => Ok(DlDcchMessage::DlInformationTransfer {
                dedicated_nas_message: get_octets(&mut buf)?,
            }),
            1 => {
                let transaction_id = get_u8(&mut buf)?;
                let secondary_cell_group = if get_bool(&mut buf)? {
                    Some(get_octets(&mut buf)?)
                } else {
                    None
                };
                let count = get_u8(&mut buf)?;
                let dedicated_nas_message_list = (0..count)
                    .map(|_| get_octets(&mut buf))
                    .collect::<Result<Vec<_>>>()?;
                Ok(DlDcchMessage::RrcReconfiguration(RrcReconfiguration {
                    transaction_id,
                    secondary_cell_group,
                    dedicated_nas_message_list,
                }))
            }
            2 => Ok(DlDcchMessage::RrcRelease {
                transaction_id: get_u8(&mut buf)?,
            }),
            3 => Ok(DlDcchMessage::SecurityModeCommand {
                transaction_id: get_u8(&mut buf)?,
                ciphering_algorithm: get_u8(&mut buf)?,
                integrity_algorithm: get_u8(&mut buf)?,
            }),
            other => Err(RrcCodecError::UnknownMessageType {
                channel: LogicalChannel::DlDcch,
                message_type: other,
            }),
        }
    }
}

/// Logical channel of an encoded PDU, from its marker octet.
pub fn channel_of(data: &[u8]) -> Result<LogicalChannel> {
    let marker = *data.first().ok_or(RrcCodecError::BufferTooShort {
        needed: 1,
        available: 0,
    })?;
    LogicalChannel::try_from(marker).map_err(|_| RrcCodecError::UnknownChannel(marker))
}
