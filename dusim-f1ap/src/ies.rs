//! F1AP information elements shared by several procedures

use std::fmt;

use bytes::{BufMut, BytesMut};
use dusim_common::{NrCgi, Plmn};

use crate::codec::{put_count, put_nr_cgi, put_octets, put_optional, Reader, Result};

/// Cause (TS 38.473 Section 9.3.1.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(u8),
    Transport(u8),
    Protocol(u8),
    Misc(u8),
}

impl Cause {
    /// radioNetwork: unspecified
    pub const RADIO_NETWORK_UNSPECIFIED: Cause = Cause::RadioNetwork(0);
    /// misc: not enough user plane processing resources
    pub const MISC_NOT_ENOUGH_RESOURCES: Cause = Cause::Misc(1);

    pub(crate) fn encode_into(&self, buf: &mut BytesMut) {
        let (group, value) = match self {
            Cause::RadioNetwork(v) => (0, *v),
            Cause::Transport(v) => (1, *v),
            Cause::Protocol(v) => (2, *v),
            Cause::Misc(v) => (3, *v),
        };
        buf.put_u8(group);
        buf.put_u8(value);
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        let group = reader.u8()?;
        let value = reader.u8()?;
        Ok(match group {
            0 => Cause::RadioNetwork(value),
            1 => Cause::Transport(value),
            2 => Cause::Protocol(value),
            _ => Cause::Misc(value),
        })
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(v) => write!(f, "radioNetwork({v})"),
            Cause::Transport(v) => write!(f, "transport({v})"),
            Cause::Protocol(v) => write!(f, "protocol({v})"),
            Cause::Misc(v) => write!(f, "misc({v})"),
        }
    }
}

/// Served Cell Information (TS 38.473 Section 9.3.1.10)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedCellInformation {
    pub nr_cgi: NrCgi,
    pub nr_pci: u16,
    pub five_gs_tac: [u8; 3],
    pub served_plmns: Vec<Plmn>,
}

impl ServedCellInformation {
    pub(crate) fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        put_nr_cgi(buf, &self.nr_cgi);
        buf.put_u16(self.nr_pci);
        buf.put_slice(&self.five_gs_tac);
        put_count(buf, "served PLMNs", self.served_plmns.len())?;
        for plmn in &self.served_plmns {
            buf.put_slice(&plmn.encode());
        }
        Ok(())
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        let nr_cgi = reader.nr_cgi()?;
        let nr_pci = reader.u16()?;
        let five_gs_tac = reader.array::<3>()?;
        let count = reader.u8()?;
        let served_plmns = (0..count).map(|_| reader.plmn()).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            nr_cgi,
            nr_pci,
            five_gs_tac,
            served_plmns,
        })
    }
}

/// CU to DU RRC Information (TS 38.473 Section 9.3.1.25)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CuToDuRrcInformation {
    pub cg_config_info: Option<Vec<u8>>,
    /// Present when the UE context is set up for an incoming handover
    pub handover_preparation_information: Option<Vec<u8>>,
}

impl CuToDuRrcInformation {
    pub(crate) fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        put_optional(buf, self.cg_config_info.as_deref(), put_octets)?;
        put_optional(buf, self.handover_preparation_information.as_deref(), put_octets)
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            cg_config_info: reader.optional(|r| r.octets())?,
            handover_preparation_information: reader.optional(|r| r.octets())?,
        })
    }
}

/// DU to CU RRC Information (TS 38.473 Section 9.3.1.26)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DuToCuRrcInformation {
    /// Encoded CellGroupConfig
    pub cell_group_config: Vec<u8>,
}

impl DuToCuRrcInformation {
    pub fn new(cell_group_config: impl Into<Vec<u8>>) -> Self {
        Self {
            cell_group_config: cell_group_config.into(),
        }
    }

    pub(crate) fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        put_octets(buf, &self.cell_group_config)
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            cell_group_config: reader.octets()?,
        })
    }
}
