//! Information elements used by the supported NAS messages
//!
//! 3GPP TS 24.501 Section 9.11

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::BufMut;
use dusim_common::{Plmn, SNssai};

use crate::codec::{put_lv, CodecError, CodecResult};
use crate::enums::PduSessionType;

/// NAS key set identifier (9.11.3.32)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NasKeySetIdentifier {
    /// Type of security context flag: false = native, true = mapped
    pub tsc: bool,
    /// Key set identifier, 7 means no key is available
    pub ksi: u8,
}

impl NasKeySetIdentifier {
    pub const NO_KEY_AVAILABLE: u8 = 0x07;

    pub fn new(tsc: bool, ksi: u8) -> Self {
        Self { tsc, ksi: ksi & 0x07 }
    }

    pub fn no_key() -> Self {
        Self::new(false, Self::NO_KEY_AVAILABLE)
    }

    pub fn is_no_key(&self) -> bool {
        self.ksi == Self::NO_KEY_AVAILABLE
    }

    pub fn encode(&self) -> u8 {
        ((self.tsc as u8) << 3) | self.ksi
    }

    pub fn decode(half_octet: u8) -> Self {
        Self::new(half_octet & 0x08 != 0, half_octet & 0x07)
    }
}

impl Default for NasKeySetIdentifier {
    fn default() -> Self {
        Self::no_key()
    }
}

/// Packs 16 decimal digits or fewer into TBCD, filling with 0xF.
fn encode_tbcd(digits: &str) -> CodecResult<Vec<u8>> {
    let values = digits
        .chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| CodecError::InvalidValue(format!("not a digit: {c:?}")))
        })
        .collect::<CodecResult<Vec<u8>>>()?;

    Ok(values
        .chunks(2)
        .map(|pair| match pair {
            [low, high] => (high << 4) | low,
            [low] => 0xF0 | low,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect())
}

fn decode_tbcd(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        for nibble in [b & 0x0F, b >> 4] {
            if nibble <= 9 {
                out.push(char::from(b'0' + nibble));
            }
        }
    }
    out
}

/// SUCI with the null protection scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suci {
    pub plmn: Plmn,
    /// Routing indicator, up to 4 digits
    pub routing_indicator: String,
    pub protection_scheme_id: u8,
    pub home_network_public_key_id: u8,
    /// Scheme output; for the null scheme this is the MSIN in TBCD
    pub scheme_output: Vec<u8>,
}

impl Suci {
    /// SUCI carrying the MSIN in clear (null scheme, routing indicator "0000").
    pub fn null_scheme(plmn: Plmn, msin: &str) -> CodecResult<Self> {
        Ok(Self {
            plmn,
            routing_indicator: "0000".to_string(),
            protection_scheme_id: 0,
            home_network_public_key_id: 0,
            scheme_output: encode_tbcd(msin)?,
        })
    }

    /// MSIN recovered from a null-scheme output.
    pub fn msin(&self) -> Option<String> {
        (self.protection_scheme_id == 0).then(|| decode_tbcd(&self.scheme_output))
    }
}

/// 5G-GUTI (TS 23.003 Section 2.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guti {
    pub plmn: Plmn,
    pub amf_region_id: u8,
    /// 10 bits
    pub amf_set_id: u16,
    /// 6 bits
    pub amf_pointer: u8,
    pub tmsi: u32,
}

impl fmt::Display for Guti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02x}{:03x}{:02x}-{:08x}",
            self.plmn, self.amf_region_id, self.amf_set_id, self.amf_pointer, self.tmsi
        )
    }
}

/// 5GS mobile identity (9.11.3.4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MobileIdentity {
    NoIdentity,
    Suci(Suci),
    Guti(Guti),
    /// IMEISV as 16 decimal digits
    Imeisv(String),
}

impl MobileIdentity {
    const TYPE_NO_IDENTITY: u8 = 0;
    const TYPE_SUCI: u8 = 1;
    const TYPE_GUTI: u8 = 2;
    const TYPE_IMEISV: u8 = 5;

    /// Encodes the IE value (without length).
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            MobileIdentity::NoIdentity => out.put_u8(Self::TYPE_NO_IDENTITY),
            MobileIdentity::Suci(suci) => {
                // SUPI format IMSI (0) in bits 7-5
                out.put_u8(Self::TYPE_SUCI);
                out.put_slice(&suci.plmn.encode());
                let mut ri = encode_tbcd(&suci.routing_indicator)?;
                ri.resize(2, 0xFF);
                out.put_slice(&ri);
                out.put_u8(suci.protection_scheme_id & 0x0F);
                out.put_u8(suci.home_network_public_key_id);
                out.put_slice(&suci.scheme_output);
            }
            MobileIdentity::Guti(guti) => {
                out.put_u8(0xF0 | Self::TYPE_GUTI);
                out.put_slice(&guti.plmn.encode());
                out.put_u8(guti.amf_region_id);
                out.put_u16(((guti.amf_set_id & 0x03FF) << 6) | (guti.amf_pointer & 0x3F) as u16);
                out.put_u32(guti.tmsi);
            }
            MobileIdentity::Imeisv(digits) => {
                if digits.len() != 16 {
                    return Err(CodecError::InvalidValue(format!(
                        "IMEISV must have 16 digits, got {}",
                        digits.len()
                    )));
                }
                let packed = encode_tbcd(&digits[1..])?;
                let first = digits.as_bytes()[0].wrapping_sub(b'0') & 0x0F;
                // even number of digits: odd/even bit stays 0
                out.put_u8((first << 4) | Self::TYPE_IMEISV);
                out.put_slice(&packed);
            }
        }
        Ok(out)
    }

    pub fn decode(value: &[u8]) -> CodecResult<Self> {
        let first = *value
            .first()
            .ok_or(CodecError::MissingIe("5GS mobile identity"))?;
        match first & 0x07 {
            Self::TYPE_NO_IDENTITY => Ok(MobileIdentity::NoIdentity),
            Self::TYPE_SUCI => {
                if value.len() < 8 {
                    return Err(CodecError::BufferTooShort {
                        expected: 8,
                        actual: value.len(),
                    });
                }
                Ok(MobileIdentity::Suci(Suci {
                    plmn: Plmn::decode([value[1], value[2], value[3]]),
                    routing_indicator: decode_tbcd(&value[4..6]),
                    protection_scheme_id: value[6] & 0x0F,
                    home_network_public_key_id: value[7],
                    scheme_output: value[8..].to_vec(),
                }))
            }
            Self::TYPE_GUTI => {
                if value.len() != 11 {
                    return Err(CodecError::InvalidValue(format!(
                        "5G-GUTI must be 11 octets, got {}",
                        value.len()
                    )));
                }
                let set_ptr = u16::from_be_bytes([value[5], value[6]]);
                Ok(MobileIdentity::Guti(Guti {
                    plmn: Plmn::decode([value[1], value[2], value[3]]),
                    amf_region_id: value[4],
                    amf_set_id: set_ptr >> 6,
                    amf_pointer: (set_ptr & 0x3F) as u8,
                    tmsi: u32::from_be_bytes([value[7], value[8], value[9], value[10]]),
                }))
            }
            Self::TYPE_IMEISV => {
                let mut digits = String::new();
                digits.push(char::from(b'0' + ((first >> 4) & 0x0F).min(9)));
                digits.push_str(&decode_tbcd(&value[1..]));
                Ok(MobileIdentity::Imeisv(digits))
            }
            other => Err(CodecError::InvalidValue(format!(
                "unsupported identity type {other}"
            ))),
        }
    }
}

/// UE security capability (9.11.3.54): 5G-EA and 5G-IA bitmaps, EA0/IA0 in
/// the most significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapability {
    pub ea: u8,
    pub ia: u8,
}

impl UeSecurityCapability {
    pub fn with_algorithms(ea: &[u8], ia: &[u8]) -> Self {
        let mut cap = Self::default();
        for alg in ea {
            cap.set_ea(*alg);
        }
        for alg in ia {
            cap.set_ia(*alg);
        }
        cap
    }

    pub fn set_ea(&mut self, alg: u8) {
        self.ea |= 0x80 >> (alg & 0x07);
    }

    pub fn set_ia(&mut self, alg: u8) {
        self.ia |= 0x80 >> (alg & 0x07);
    }

    pub fn supports_ea(&self, alg: u8) -> bool {
        alg < 8 && self.ea & (0x80 >> alg) != 0
    }

    pub fn supports_ia(&self, alg: u8) -> bool {
        alg < 8 && self.ia & (0x80 >> alg) != 0
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.ea, self.ia]
    }

    pub fn decode(value: &[u8]) -> CodecResult<Self> {
        match value {
            [ea, ia, ..] => Ok(Self { ea: *ea, ia: *ia }),
            _ => Err(CodecError::BufferTooShort {
                expected: 2,
                actual: value.len(),
            }),
        }
    }
}

/// Data network name (9.11.2.1B), encoded as DNS labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dnn(pub String);

impl Dnn {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        for label in self.0.split('.') {
            put_lv(&mut out, label.as_bytes())?;
        }
        Ok(out)
    }

    pub fn decode(value: &[u8]) -> CodecResult<Self> {
        let mut labels = Vec::new();
        let mut rest = value;
        while let Some((&len, tail)) = rest.split_first() {
            let len = len as usize;
            if tail.len() < len {
                return Err(CodecError::BufferTooShort {
                    expected: len,
                    actual: tail.len(),
                });
            }
            labels.push(String::from_utf8_lossy(&tail[..len]).into_owned());
            rest = &tail[len..];
        }
        Ok(Self(labels.join(".")))
    }
}

impl fmt::Display for Dnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn encode_s_nssai(s_nssai: &SNssai) -> Vec<u8> {
    let mut out = vec![s_nssai.sst];
    if let Some(sd) = s_nssai.sd {
        out.extend_from_slice(&sd.to_be_bytes()[1..]);
    }
    out
}

pub fn decode_s_nssai(value: &[u8]) -> CodecResult<SNssai> {
    match value {
        [sst] => Ok(SNssai::new(*sst, None)),
        [sst, a, b, c, ..] => Ok(SNssai::new(
            *sst,
            Some(u32::from_be_bytes([0, *a, *b, *c])),
        )),
        _ => Err(CodecError::InvalidValue(format!(
            "S-NSSAI length {} not supported",
            value.len()
        ))),
    }
}

/// Session-AMBR (9.11.4.14)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionAmbr {
    pub downlink_unit: u8,
    pub downlink: u16,
    pub uplink_unit: u8,
    pub uplink: u16,
}

impl SessionAmbr {
    pub fn encode(&self) -> [u8; 6] {
        let dl = self.downlink.to_be_bytes();
        let ul = self.uplink.to_be_bytes();
        [self.downlink_unit, dl[0], dl[1], self.uplink_unit, ul[0], ul[1]]
    }

    pub fn decode(value: &[u8]) -> CodecResult<Self> {
        match value {
            [dl_unit, dl0, dl1, ul_unit, ul0, ul1] => Ok(Self {
                downlink_unit: *dl_unit,
                downlink: u16::from_be_bytes([*dl0, *dl1]),
                uplink_unit: *ul_unit,
                uplink: u16::from_be_bytes([*ul0, *ul1]),
            }),
            _ => Err(CodecError::InvalidValue(format!(
                "Session-AMBR must be 6 octets, got {}",
                value.len()
            ))),
        }
    }
}

impl fmt::Display for SessionAmbr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DL {} (unit {}) / UL {} (unit {})",
            self.downlink, self.downlink_unit, self.uplink, self.uplink_unit
        )
    }
}

/// PDU address (9.11.4.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduAddress {
    Ipv4(Ipv4Addr),
    /// IPv6 interface identifier; the prefix comes from router advertisement
    Ipv6 { interface_id: [u8; 8] },
    Ipv4v6 { interface_id: [u8; 8], ipv4: Ipv4Addr },
}

impl PduAddress {
    pub fn session_type(&self) -> PduSessionType {
        match self {
            PduAddress::Ipv4(_) => PduSessionType::Ipv4,
            PduAddress::Ipv6 { .. } => PduSessionType::Ipv6,
            PduAddress::Ipv4v6 { .. } => PduSessionType::Ipv4v6,
        }
    }

    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            PduAddress::Ipv4(addr) | PduAddress::Ipv4v6 { ipv4: addr, .. } => Some(*addr),
            PduAddress::Ipv6 { .. } => None,
        }
    }

    /// Link-local IPv6 address built from the interface identifier.
    pub fn ipv6_link_local(&self) -> Option<Ipv6Addr> {
        match self {
            PduAddress::Ipv6 { interface_id } | PduAddress::Ipv4v6 { interface_id, .. } => {
                let mut octets = [0u8; 16];
                octets[0] = 0xFE;
                octets[1] = 0x80;
                octets[8..].copy_from_slice(interface_id);
                Some(Ipv6Addr::from(octets))
            }
            PduAddress::Ipv4(_) => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![u8::from(self.session_type())];
        match self {
            PduAddress::Ipv4(addr) => out.extend_from_slice(&addr.octets()),
            PduAddress::Ipv6 { interface_id } => out.extend_from_slice(interface_id),
            PduAddress::Ipv4v6 { interface_id, ipv4 } => {
                out.extend_from_slice(interface_id);
                out.extend_from_slice(&ipv4.octets());
            }
        }
        out
    }

    pub fn decode(value: &[u8]) -> CodecResult<Self> {
        let too_short = |expected| CodecError::BufferTooShort {
            expected,
            actual: value.len(),
        };
        let kind = value.first().ok_or_else(|| too_short(1))? & 0x07;
        match PduSessionType::try_from(kind) {
            Ok(PduSessionType::Ipv4) => {
                let b = value.get(1..5).ok_or_else(|| too_short(5))?;
                Ok(PduAddress::Ipv4(Ipv4Addr::new(b[0], b[1], b[2], b[3])))
            }
            Ok(PduSessionType::Ipv6) => {
                let b = value.get(1..9).ok_or_else(|| too_short(9))?;
                let mut interface_id = [0u8; 8];
                interface_id.copy_from_slice(b);
                Ok(PduAddress::Ipv6 { interface_id })
            }
            Ok(PduSessionType::Ipv4v6) => {
                let b = value.get(1..13).ok_or_else(|| too_short(13))?;
                let mut interface_id = [0u8; 8];
                interface_id.copy_from_slice(&b[..8]);
                Ok(PduAddress::Ipv4v6 {
                    interface_id,
                    ipv4: Ipv4Addr::new(b[8], b[9], b[10], b[11]),
                })
            }
            _ => Err(CodecError::InvalidValue(format!(
                "unsupported PDU address type {kind}"
            ))),
        }
    }
}

/// GPRS Timer 3 (9.11.2.5 / TS 24.008 10.5.7.4a): unit in bits 8-6, value
/// in bits 5-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GprsTimer3(pub u8);

impl GprsTimer3 {
    pub fn unit(&self) -> u8 {
        self.0 >> 5
    }

    pub fn value(&self) -> u8 {
        self.0 & 0x1F
    }

    pub fn is_deactivated(&self) -> bool {
        self.unit() == 7
    }

    /// Timer length in seconds; a deactivated timer yields 0.
    pub fn as_secs(&self) -> u64 {
        let unit_secs: u64 = match self.unit() {
            0 => 600,
            1 => 3_600,
            2 => 36_000,
            3 => 2,
            4 => 30,
            5 => 60,
            6 => 1_152_000,
            _ => 0,
        };
        unit_secs * self.value() as u64
    }

    pub fn decode(value: &[u8]) -> CodecResult<Self> {
        value
            .first()
            .map(|b| GprsTimer3(*b))
            .ok_or(CodecError::MissingIe("GPRS timer 3"))
    }
}

/// Additional 5G security information (9.11.3.12), bit 2 = RINMR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdditionalSecurityInformation {
    pub retransmission_requested: bool,
    pub horizontal_derivation: bool,
}

impl AdditionalSecurityInformation {
    pub fn encode(&self) -> u8 {
        ((self.retransmission_requested as u8) << 1) | self.horizontal_derivation as u8
    }

    pub fn decode(octet: u8) -> Self {
        Self {
            retransmission_requested: octet & 0x02 != 0,
            horizontal_derivation: octet & 0x01 != 0,
        }
    }
}
