//! Configuration structures for the DU and UE
//!
//! The simulator reads a single YAML document with a `du` and a `ue`
//! section. Values are kept in their textual form (as written by operators)
//! and converted to typed values through accessor methods.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{NrCgi, Plmn};

/// Default F1-C SCTP port of the CU-CP (3GPP TS 38.472).
pub const DEFAULT_F1C_PORT: u16 = 38472;

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub du: DuConfig,
    pub ue: UeConfig,
}

/// PLMN as configured: decimal strings so that leading zeros survive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlmnConfig {
    pub mcc: String,
    pub mnc: String,
}

impl PlmnConfig {
    pub fn new(mcc: impl Into<String>, mnc: impl Into<String>) -> Self {
        Self {
            mcc: mcc.into(),
            mnc: mnc.into(),
        }
    }

    pub fn to_plmn(&self) -> Result<Plmn, Error> {
        Plmn::from_strings(&self.mcc, &self.mnc)
    }
}

/// Served cell configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// Physical Cell Identity (0-1007)
    pub pci: u16,
    /// 5GS Tracking Area Code as 6 hex digits
    pub tac: String,
}

impl CellConfig {
    /// The 24-bit TAC as 3 octets. An empty TAC defaults to 1.
    pub fn tac_bytes(&self) -> Result<[u8; 3], Error> {
        if self.tac.is_empty() {
            return Ok([0x00, 0x00, 0x01]);
        }
        let value = u32::from_str_radix(&self.tac, 16)
            .map_err(|e| Error::Config(format!("invalid cell.tac {:?}: {e}", self.tac)))?;
        if value > 0xFF_FFFF {
            return Err(Error::Config(format!("cell.tac out of range: {}", self.tac)));
        }
        Ok([(value >> 16) as u8, (value >> 8) as u8, value as u8])
    }
}

/// Handover tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoverConfig {
    /// A3 offset: a neighbor must exceed the serving RSRP by more than this.
    pub a3_offset_db: i32,
    /// Handover supervision window in milliseconds, 0 disables it.
    pub timeout_ms: u64,
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            a3_offset_db: 3,
            timeout_ms: 1000,
        }
    }
}

/// DU configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuConfig {
    /// gNB-DU ID
    pub id: u64,
    /// gNB-DU name
    pub name: String,
    /// CU-CP address for the F1-C association
    pub cucp_address: String,
    /// CU-CP SCTP port (usually 38472)
    pub cucp_port: u16,
    /// Local bind address, empty for any
    pub local_address: String,
    /// Local bind port, 0 for ephemeral
    pub local_port: u16,
    pub plmn: PlmnConfig,
    pub cell: CellConfig,
    pub handover: HandoverConfig,
}

impl DuConfig {
    /// NR-CGI of the served cell.
    pub fn nr_cgi(&self) -> Result<NrCgi, Error> {
        Ok(NrCgi::for_pci(self.plmn.to_plmn()?, self.cell.pci))
    }
}

/// Operator key variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeOpKey {
    /// Operator variant key, converted to OPc before use
    Op([u8; 16]),
    /// Pre-computed OPc
    Opc([u8; 16]),
}

/// UE configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UeConfig {
    /// Mobile Subscription Identification Number
    pub msin: String,
    /// SUPI override (`imsi-...`), derived from PLMN and MSIN when empty
    pub supi: String,
    /// Long-term key K, 32 hex digits
    pub key: String,
    /// OP, 32 hex digits (optional if `opc` is set)
    pub op: String,
    /// OPc, 32 hex digits (optional if `op` is set)
    pub opc: String,
    /// Authentication Management Field, 4 hex digits
    pub amf: String,
    pub plmn: PlmnConfig,
}

impl UeConfig {
    pub fn plmn(&self) -> Result<Plmn, Error> {
        self.plmn.to_plmn()
    }

    /// SUPI in `imsi-<mcc><mnc><msin>` form.
    pub fn supi(&self) -> String {
        if !self.supi.is_empty() {
            return self.supi.clone();
        }
        format!("imsi-{}{}{}", self.plmn.mcc, self.plmn.mnc, self.msin)
    }

    pub fn key_bytes(&self) -> Result<[u8; 16], Error> {
        parse_hex_array("ue.key", &self.key)
    }

    pub fn op_key(&self) -> Result<UeOpKey, Error> {
        if !self.opc.is_empty() {
            return Ok(UeOpKey::Opc(parse_hex_array("ue.opc", &self.opc)?));
        }
        if !self.op.is_empty() {
            return Ok(UeOpKey::Op(parse_hex_array("ue.op", &self.op)?));
        }
        Err(Error::Config("one of ue.op or ue.opc is required".to_string()))
    }

    pub fn amf_bytes(&self) -> Result<[u8; 2], Error> {
        parse_hex_array("ue.amf", &self.amf)
    }
}

fn parse_hex_array<const N: usize>(field: &str, value: &str) -> Result<[u8; N], Error> {
    let bytes = hex::decode(value)
        .map_err(|e| Error::Config(format!("{field} is not valid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::Config(format!("{field} must be {N} bytes, got {}", v.len())))
}

impl SimConfig {
    /// Parses a configuration from a YAML string without validating it.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads a YAML file without validating it.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config = Self::from_yaml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks required fields first, then that key material parses.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            (self.du.name.is_empty(), "du.name is required"),
            (self.du.cucp_address.is_empty(), "du.cucp_address is required"),
            (self.du.cucp_port == 0, "du.cucp_port is required"),
            (self.du.plmn.mcc.is_empty(), "du.plmn.mcc is required"),
            (self.du.plmn.mnc.is_empty(), "du.plmn.mnc is required"),
            (self.ue.msin.is_empty(), "ue.msin is required"),
            (self.ue.key.is_empty(), "ue.key is required"),
            (self.ue.amf.is_empty(), "ue.amf is required"),
        ];
        if let Some((_, msg)) = required.iter().find(|(missing, _)| *missing) {
            return Err(Error::Config((*msg).to_string()));
        }

        self.du.plmn.to_plmn()?;
        self.du.cell.tac_bytes()?;
        self.ue.key_bytes()?;
        self.ue.op_key()?;
        self.ue.amf_bytes()?;
        if !self.ue.plmn.mcc.is_empty() {
            self.ue.plmn()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
du:
  id: 1
  name: du-1
  cucp_address: 127.0.0.1
  cucp_port: 38472
  local_address: 127.0.0.1
  local_port: 38473
  plmn:
    mcc: "208"
    mnc: "93"
  cell:
    pci: 1
    tac: "000001"
ue:
  msin: "0000000001"
  key: 8baf473f2f8fd09487cccbd7097c6862
  opc: 8e27b6af0e692e750f32667a3b14605d
  amf: "8000"
  plmn:
    mcc: "208"
    mnc: "93"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = SimConfig::from_yaml(SAMPLE).expect("sample parses");
        config.validate().expect("sample is valid");

        assert_eq!(config.du.name, "du-1");
        assert_eq!(config.du.cucp_port, DEFAULT_F1C_PORT);
        assert_eq!(config.du.cell.pci, 1);
        assert_eq!(config.du.cell.tac_bytes().expect("tac"), [0, 0, 1]);
        assert_eq!(config.du.handover, HandoverConfig::default());
        assert_eq!(config.ue.supi(), "imsi-208930000000001");
        assert_eq!(config.ue.amf_bytes().expect("amf"), [0x80, 0x00]);
        assert!(matches!(config.ue.op_key().expect("opc"), UeOpKey::Opc(_)));
        assert_eq!(config.du.nr_cgi().expect("cgi").nr_cell_id, 0x10);
    }

    fn assert_required(mutate: impl FnOnce(&mut SimConfig), expected: &str) {
        let mut config = SimConfig::from_yaml(SAMPLE).expect("sample parses");
        mutate(&mut config);
        let err = config.validate().expect_err("must fail");
        assert!(matches!(&err, Error::Config(msg) if msg == expected), "{err}");
    }

    #[test]
    fn test_required_field_messages() {
        assert_required(|c| c.du.name.clear(), "du.name is required");
        assert_required(|c| c.du.cucp_address.clear(), "du.cucp_address is required");
        assert_required(|c| c.du.cucp_port = 0, "du.cucp_port is required");
        assert_required(|c| c.du.plmn.mcc.clear(), "du.plmn.mcc is required");
        assert_required(|c| c.du.plmn.mnc.clear(), "du.plmn.mnc is required");
        assert_required(|c| c.ue.msin.clear(), "ue.msin is required");
        assert_required(|c| c.ue.key.clear(), "ue.key is required");
        assert_required(|c| c.ue.amf.clear(), "ue.amf is required");
    }

    #[test]
    fn test_invalid_key_material() {
        let mut config = SimConfig::from_yaml(SAMPLE).expect("sample parses");
        config.ue.key = "abcd".to_string();
        assert!(config.validate().is_err());

        let mut config = SimConfig::from_yaml(SAMPLE).expect("sample parses");
        config.ue.opc.clear();
        assert!(config.validate().is_err());
        config.ue.op = "cdc202d5123e20f62b6d676ac72cb318".to_string();
        config.validate().expect("op alone is enough");
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = SimConfig::from_yaml(SAMPLE).expect("sample parses");
        let yaml = config.to_yaml().expect("serialize");
        assert_eq!(SimConfig::from_yaml(&yaml).expect("reparse"), config);
    }
}
