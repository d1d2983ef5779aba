//! F1AP PDU framing and field helpers
//!
//! `| PDU type | procedure code | body length (2) | body |`

use bytes::{Buf, BufMut, BytesMut};
use dusim_common::{NrCgi, Plmn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// SCTP payload protocol identifier for F1AP (TS 38.472)
pub const F1AP_PPID: u32 = 62;

/// Maximum body length accepted by the decoder
pub const MAX_BODY_LENGTH: usize = 16384;

/// Errors that can occur during F1AP encoding/decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum F1apCodecError {
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    #[error("unknown F1AP PDU type: {0}")]
    UnknownPduType(u8),

    #[error("unknown procedure code {procedure_code} for {pdu_type:?}")]
    UnknownProcedure { pdu_type: PduType, procedure_code: u8 },

    #[error("body length {0} exceeds maximum allowed {MAX_BODY_LENGTH}")]
    BodyTooLarge(usize),

    #[error("{field} length {len} exceeds maximum {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, F1apCodecError>;

/// F1AP-PDU choice (TS 38.473 Section 9.4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PduType {
    InitiatingMessage = 0,
    SuccessfulOutcome = 1,
    UnsuccessfulOutcome = 2,
}

/// Procedure codes (TS 38.473 Section 9.4.7)
pub mod procedure_code {
    pub const F1_SETUP: u8 = 1;
    pub const UE_CONTEXT_SETUP: u8 = 5;
    pub const UE_CONTEXT_RELEASE: u8 = 6;
    pub const UE_CONTEXT_MODIFICATION: u8 = 7;
    pub const UE_CONTEXT_MODIFICATION_REQUIRED: u8 = 8;
    pub const INITIAL_UL_RRC_MESSAGE_TRANSFER: u8 = 11;
    pub const DL_RRC_MESSAGE_TRANSFER: u8 = 12;
    pub const UL_RRC_MESSAGE_TRANSFER: u8 = 13;
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(F1apCodecError::BufferTooShort {
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub(crate) fn octets(&mut self) -> Result<Vec<u8>> {
        let len = self.u16()? as usize;
        self.ensure(len)?;
        let out = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(out)
    }

    pub(crate) fn string(&mut self) -> Result<String> {
        String::from_utf8(self.octets()?)
            .map_err(|e| F1apCodecError::InvalidValue(format!("string: {e}")))
    }

    pub(crate) fn present(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub(crate) fn optional<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        if self.present()? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    pub(crate) fn plmn(&mut self) -> Result<Plmn> {
        Ok(Plmn::decode(self.array::<3>()?))
    }

    pub(crate) fn nr_cgi(&mut self) -> Result<NrCgi> {
        let plmn = self.plmn()?;
        Ok(NrCgi::from_cell_id_bytes(plmn, self.array::<5>()?))
    }
}

pub(crate) fn put_octets(buf: &mut BytesMut, value: &[u8]) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| F1apCodecError::FieldTooLong {
        field: "octet string",
        len: value.len(),
        max: u16::MAX as usize,
    })?;
    buf.put_u16(len);
    buf.put_slice(value);
    Ok(())
}

pub(crate) fn put_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    put_octets(buf, value.as_bytes())
}

/// One-octet element count ahead of a list.
pub(crate) fn put_count(buf: &mut BytesMut, field: &'static str, count: usize) -> Result<()> {
    let count = u8::try_from(count).map_err(|_| F1apCodecError::FieldTooLong {
        field,
        len: count,
        max: u8::MAX as usize,
    })?;
    buf.put_u8(count);
    Ok(())
}

pub(crate) fn put_optional<T>(
    buf: &mut BytesMut,
    value: Option<&T>,
    write: impl FnOnce(&mut BytesMut, &T) -> Result<()>,
) -> Result<()>
where
    T: ?Sized,
{
    match value {
        Some(v) => {
            buf.put_u8(1);
            write(buf, v)
        }
        None => {
            buf.put_u8(0);
            Ok(())
        }
    }
}

pub(crate) fn put_nr_cgi(buf: &mut BytesMut, cgi: &NrCgi) {
    buf.put_slice(&cgi.plmn.encode());
    buf.put_slice(&cgi.cell_id_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_nr_cgi() {
        let plmn = Plmn::new(208, 93, false);
        let cgi = NrCgi::for_pci(plmn, 1);
        let mut buf = BytesMut::new();
        put_nr_cgi(&mut buf, &cgi);
        assert_eq!(buf.len(), 8);
        assert_eq!(&buf[3..], &[0, 0, 0, 0, 0x10]);
        assert_eq!(Reader::new(&buf).nr_cgi().expect("cgi"), cgi);
    }

    #[test]
    fn test_reader_optional_and_short() {
        let mut buf = BytesMut::new();
        put_optional(&mut buf, Some("du-1"), put_string).expect("present");
        put_optional::<str>(&mut buf, None, put_string).expect("absent");
        let mut reader = Reader::new(&buf);
        assert_eq!(reader.optional(|r| r.string()).expect("first"), Some("du-1".to_string()));
        assert_eq!(reader.optional(|r| r.string()).expect("second"), None);
        assert!(matches!(
            reader.u8(),
            Err(F1apCodecError::BufferTooShort { needed: 1, available: 0 })
        ));
    }

    #[test]
    fn test_oversize_fields_rejected() {
        let mut buf = BytesMut::new();
        assert_eq!(
            put_octets(&mut buf, &vec![0u8; 70_000]),
            Err(F1apCodecError::FieldTooLong {
                field: "octet string",
                len: 70_000,
                max: 65_535
            })
        );
        assert!(buf.is_empty());
        assert!(put_count(&mut buf, "served cells", 256).is_err());
        put_count(&mut buf, "served cells", 255).expect("fits");
        assert_eq!(&buf[..], &[255]);
    }
}
