//! Network identifiers shared by the DU and UE

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Public Land Mobile Network identifier.
///
/// 3GPP TS 23.003 Section 12.1
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (3 digits)
    pub mcc: u16,
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: u16,
    /// True if the MNC has 3 digits
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a new PLMN.
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Parses a PLMN from decimal MCC/MNC strings as they appear in the
    /// configuration file. The MNC length is taken from the string.
    pub fn from_strings(mcc: &str, mnc: &str) -> Result<Self, Error> {
        let digits = |s: &str, name: &str| -> Result<u16, Error> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Config(format!("invalid {name}: {s:?}")));
            }
            s.parse::<u16>()
                .map_err(|e| Error::Config(format!("invalid {name} {s:?}: {e}")))
        };

        if mcc.len() != 3 {
            return Err(Error::Config(format!("mcc must have 3 digits: {mcc:?}")));
        }
        if mnc.len() != 2 && mnc.len() != 3 {
            return Err(Error::Config(format!("mnc must have 2 or 3 digits: {mnc:?}")));
        }

        Ok(Self::new(digits(mcc, "mcc")?, digits(mnc, "mnc")?, mnc.len() == 3))
    }

    /// MNC as it appears in the serving network name (always 3 digits).
    pub fn mnc_3digit(&self) -> String {
        format!("{:03}", self.mnc)
    }

    /// Encodes the PLMN to the 3-octet BCD format of 3GPP TS 24.008.
    ///
    /// - Byte 0: MCC digit 2 | MCC digit 1
    /// - Byte 1: MNC digit 3 or 0xF | MCC digit 3
    /// - Byte 2: MNC digit 2 | MNC digit 1
    pub fn encode(&self) -> [u8; 3] {
        let mcc1 = ((self.mcc / 100) % 10) as u8;
        let mcc2 = ((self.mcc / 10) % 10) as u8;
        let mcc3 = (self.mcc % 10) as u8;

        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            (
                ((self.mnc / 100) % 10) as u8,
                ((self.mnc / 10) % 10) as u8,
                (self.mnc % 10) as u8,
            )
        } else {
            (((self.mnc / 10) % 10) as u8, (self.mnc % 10) as u8, 0x0F)
        };

        [(mcc2 << 4) | mcc1, (mnc3 << 4) | mcc3, (mnc2 << 4) | mnc1]
    }

    /// Decodes a PLMN from the 3-octet BCD format.
    pub fn decode(bytes: [u8; 3]) -> Self {
        let mcc1 = (bytes[0] & 0x0F) as u16;
        let mcc2 = (bytes[0] >> 4) as u16;
        let mcc3 = (bytes[1] & 0x0F) as u16;
        let mnc3 = bytes[1] >> 4;
        let mnc1 = (bytes[2] & 0x0F) as u16;
        let mnc2 = (bytes[2] >> 4) as u16;

        let mcc = 100 * mcc1 + 10 * mcc2 + mcc3;
        if mnc3 == 0x0F {
            Self::new(mcc, 10 * mnc1 + mnc2, false)
        } else {
            Self::new(mcc, 100 * mnc1 + 10 * mnc2 + mnc3 as u16, true)
        }
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "Plmn({:03}-{:03})", self.mcc, self.mnc)
        } else {
            write!(f, "Plmn({:03}-{:02})", self.mcc, self.mnc)
        }
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}{:02}", self.mcc, self.mnc)
        }
    }
}

/// NR Cell Global Identifier: PLMN plus a 36-bit NR cell identity.
///
/// 3GPP TS 38.473 Section 9.3.1.12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NrCgi {
    pub plmn: Plmn,
    /// 36-bit NR cell identity
    pub nr_cell_id: u64,
}

impl NrCgi {
    pub const CELL_ID_MASK: u64 = 0xF_FFFF_FFFF;

    pub fn new(plmn: Plmn, nr_cell_id: u64) -> Self {
        Self {
            plmn,
            nr_cell_id: nr_cell_id & Self::CELL_ID_MASK,
        }
    }

    /// Cell identity used by the simulator for a DU cell: the PCI shifted
    /// into the low bits of the 36-bit identity.
    pub fn for_pci(plmn: Plmn, pci: u16) -> Self {
        Self::new(plmn, (pci as u64) << 4)
    }

    /// The 36-bit cell identity as 5 big-endian octets.
    pub fn cell_id_bytes(&self) -> [u8; 5] {
        let id = self.nr_cell_id;
        [
            (id >> 32) as u8,
            (id >> 24) as u8,
            (id >> 16) as u8,
            (id >> 8) as u8,
            id as u8,
        ]
    }

    pub fn from_cell_id_bytes(plmn: Plmn, bytes: [u8; 5]) -> Self {
        let id = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
        Self::new(plmn, id)
    }
}

/// Single Network Slice Selection Assistance Information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (24-bit)
    pub sd: Option<u32>,
}

impl SNssai {
    pub fn new(sst: u8, sd: Option<u32>) -> Self {
        Self { sst, sd }
    }
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "sst={} sd={:06x}", self.sst, sd),
            None => write!(f, "sst={}", self.sst),
        }
    }
}
