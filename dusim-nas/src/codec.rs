//! NAS information element framing
//!
//! NAS IEs come in a handful of formats (TS 24.007 Section 11.2.1.1):
//! - Type 1 (TV, half octet): IEI in the high nibble, value in the low nibble
//! - Type 3 (TV): IEI followed by a fixed-length value
//! - Type 4 (TLV): 1-octet length
//! - Type 6 (TLV-E): 2-octet length
//!
//! Mandatory IEs are read positionally by each message decoder; the optional
//! tail is split into [`OptionalIes`] first and then queried by IEI.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Errors that can occur during NAS encoding/decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unknown extended protocol discriminator: 0x{0:02X}")]
    UnknownEpd(u8),

    #[error("Unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    #[error("Missing mandatory IE: {0}")]
    MissingIe(&'static str),

    #[error("IE length {len} exceeds maximum {max}")]
    IeTooLong { len: usize, max: usize },
}

pub type CodecResult<T> = Result<T, CodecError>;

pub(crate) fn ensure(buf: &impl Buf, needed: usize) -> CodecResult<()> {
    if buf.remaining() < needed {
        return Err(CodecError::BufferTooShort {
            expected: needed,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

pub(crate) fn get_u8(buf: &mut impl Buf) -> CodecResult<u8> {
    ensure(&*buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_bytes(buf: &mut impl Buf, len: usize) -> CodecResult<Vec<u8>> {
    ensure(&*buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Reads a value with a 1-octet length prefix.
pub(crate) fn get_lv(buf: &mut impl Buf) -> CodecResult<Vec<u8>> {
    let len = get_u8(buf)? as usize;
    get_bytes(buf, len)
}

/// Reads a value with a 2-octet length prefix.
pub(crate) fn get_lv_e(buf: &mut impl Buf) -> CodecResult<Vec<u8>> {
    ensure(&*buf, 2)?;
    let len = buf.get_u16() as usize;
    get_bytes(buf, len)
}

pub(crate) fn put_lv(buf: &mut impl BufMut, value: &[u8]) -> CodecResult<()> {
    let len = u8::try_from(value.len()).map_err(|_| CodecError::IeTooLong {
        len: value.len(),
        max: u8::MAX as usize,
    })?;
    buf.put_u8(len);
    buf.put_slice(value);
    Ok(())
}

pub(crate) fn put_lv_e(buf: &mut impl BufMut, value: &[u8]) -> CodecResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| CodecError::IeTooLong {
        len: value.len(),
        max: u16::MAX as usize,
    })?;
    buf.put_u16(len);
    buf.put_slice(value);
    Ok(())
}

pub(crate) fn put_tv1(buf: &mut impl BufMut, iei: u8, value: u8) {
    buf.put_u8((iei & 0xF0) | (value & 0x0F));
}

pub(crate) fn put_tv(buf: &mut impl BufMut, iei: u8, value: &[u8]) {
    buf.put_u8(iei);
    buf.put_slice(value);
}

pub(crate) fn put_tlv(buf: &mut impl BufMut, iei: u8, value: &[u8]) -> CodecResult<()> {
    if value.len() > u8::MAX as usize {
        return Err(CodecError::IeTooLong {
            len: value.len(),
            max: u8::MAX as usize,
        });
    }
    buf.put_u8(iei);
    put_lv(buf, value)
}

pub(crate) fn put_tlv_e(buf: &mut impl BufMut, iei: u8, value: &[u8]) -> CodecResult<()> {
    if value.len() > u16::MAX as usize {
        return Err(CodecError::IeTooLong {
            len: value.len(),
            max: u16::MAX as usize,
        });
    }
    buf.put_u8(iei);
    put_lv_e(buf, value)
}

/// Optional IE identifiers used by the supported messages.
pub mod iei {
    pub const AUTN: u8 = 0x20;
    pub const RAND: u8 = 0x21;
    pub const S_NSSAI: u8 = 0x22;
    pub const DNN: u8 = 0x25;
    pub const PDU_ADDRESS: u8 = 0x29;
    pub const SESSION_AMBR: u8 = 0x2A;
    pub const RES_STAR: u8 = 0x2D;
    pub const UE_SECURITY_CAPABILITY: u8 = 0x2E;
    pub const AUTH_FAILURE_PARAMETER: u8 = 0x30;
    pub const ADDITIONAL_SECURITY_INFO: u8 = 0x36;
    pub const BACK_OFF_TIMER: u8 = 0x37;
    pub const PDU_SESSION_ID: u8 = 0x12;
    pub const MM_CAUSE: u8 = 0x58;
    pub const SM_CAUSE: u8 = 0x59;
    pub const T3512: u8 = 0x5E;
    pub const NAS_MESSAGE_CONTAINER: u8 = 0x71;
    pub const GUTI: u8 = 0x77;
    pub const IMEISV: u8 = 0x77;
    pub const QOS_FLOW_DESCRIPTIONS: u8 = 0x79;
    pub const QOS_RULES: u8 = 0x7A;
    /// Type 1 IEIs (high nibble only)
    pub const REQUEST_TYPE: u8 = 0x80;
    pub const PDU_SESSION_TYPE: u8 = 0x90;
    pub const SSC_MODE: u8 = 0xA0;
    pub const IMEISV_REQUEST: u8 = 0xE0;
    pub const ALLOWED_SSC_MODE: u8 = 0xF0;
}

/// Length of the value of a type 3 IE, for the IEIs that have one.
fn fixed_tv_len(id: u8) -> Option<usize> {
    match id {
        iei::RAND => Some(16),
        iei::PDU_SESSION_ID | iei::MM_CAUSE | iei::SM_CAUSE => Some(1),
        _ => None,
    }
}

/// Optional IEs of a message, in order of appearance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptionalIes {
    entries: Vec<(u8, Vec<u8>)>,
}

impl OptionalIes {
    /// Splits the remainder of a message into IEs.
    pub fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        let mut entries = Vec::new();
        while buf.has_remaining() {
            let octet = buf.get_u8();
            if octet & 0x80 != 0 {
                entries.push((octet & 0xF0, vec![octet & 0x0F]));
                continue;
            }
            let value = if let Some(len) = fixed_tv_len(octet) {
                get_bytes(buf, len)?
            } else if (0x70..=0x7F).contains(&octet) {
                get_lv_e(buf)?
            } else {
                get_lv(buf)?
            };
            entries.push((octet, value));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: u8) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, value)| value.as_slice())
    }

    /// Value of a type 1 IE (the low nibble).
    pub fn get_half(&self, id: u8) -> Option<u8> {
        self.get(id).and_then(|v| v.first().copied())
    }

    pub fn get_u8(&self, id: u8) -> Option<u8> {
        self.get(id).and_then(|v| v.first().copied())
    }

    pub fn get_array<const N: usize>(&self, id: u8) -> CodecResult<Option<[u8; N]>> {
        match self.get(id) {
            None => Ok(None),
            Some(value) => value.try_into().map(Some).map_err(|_| {
                CodecError::InvalidValue(format!(
                    "IE 0x{id:02X} has length {}, expected {N}",
                    value.len()
                ))
            }),
        }
    }
}
