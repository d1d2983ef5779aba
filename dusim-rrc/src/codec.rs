//! Low-level helpers for the RRC byte layout
//!
//! Every RRC PDU starts with a logical channel marker followed by a message
//! type octet. Variable-length fields carry a 2-octet length prefix and
//! optional fields a presence octet.

use bytes::{Buf, BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Errors that can occur during RRC message encoding/decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RrcCodecError {
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    #[error("unknown logical channel marker: 0x{0:02X}")]
    UnknownChannel(u8),

    #[error("wrong logical channel: expected {expected:?}, got {actual:?}")]
    WrongChannel {
        expected: LogicalChannel,
        actual: LogicalChannel,
    },

    #[error("unknown {channel:?} message type: {message_type}")]
    UnknownMessageType {
        channel: LogicalChannel,
        message_type: u8,
    },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("{field} length {len} exceeds maximum {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, RrcCodecError>;

/// Logical channel a PDU travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LogicalChannel {
    UlCcch = 0x01,
    UlDcch = 0x02,
    DlCcch = 0x03,
    DlDcch = 0x04,
}

/// Reads the channel marker and message type, checking the channel.
pub(crate) fn read_header(buf: &mut &[u8], expected: LogicalChannel) -> Result<u8> {
    let marker = get_u8(buf)?;
    let actual = LogicalChannel::try_from(marker).map_err(|_| RrcCodecError::UnknownChannel(marker))?;
    if actual != expected {
        return Err(RrcCodecError::WrongChannel { expected, actual });
    }
    get_u8(buf)
}

pub(crate) fn write_header(buf: &mut BytesMut, channel: LogicalChannel, message_type: u8) {
    buf.put_u8(channel.into());
    buf.put_u8(message_type);
}

pub(crate) fn ensure(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(RrcCodecError::BufferTooShort {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn get_u8(buf: &mut &[u8]) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u16(buf: &mut &[u8]) -> Result<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub(crate) fn get_bool(buf: &mut &[u8]) -> Result<bool> {
    Ok(get_u8(buf)? != 0)
}

/// Reads a field with a 2-octet length prefix.
pub(crate) fn get_octets(buf: &mut &[u8]) -> Result<Vec<u8>> {
    let len = get_u16(buf)? as usize;
    ensure(buf, len)?;
    let out = buf[..len].to_vec();
    buf.advance(len);
    Ok(out)
}

pub(crate) fn put_octets(buf: &mut BytesMut, value: &[u8]) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| RrcCodecError::FieldTooLong {
        field: "octet string",
        len: value.len(),
        max: u16::MAX as usize,
    })?;
    buf.put_u16(len);
    buf.put_slice(value);
    Ok(())
}

/// One-octet element count ahead of a list.
pub(crate) fn put_count(buf: &mut BytesMut, field: &'static str, count: usize) -> Result<()> {
    let count = u8::try_from(count).map_err(|_| RrcCodecError::FieldTooLong {
        field,
        len: count,
        max: u8::MAX as usize,
    })?;
    buf.put_u8(count);
    Ok(())
}

pub(crate) fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_channel_check() {
        let data = [0x02u8, 0x03];
        let mut buf = &data[..];
        assert_eq!(read_header(&mut buf, LogicalChannel::UlDcch).expect("header"), 3);

        let mut buf = &data[..];
        assert_eq!(
            read_header(&mut buf, LogicalChannel::DlDcch),
            Err(RrcCodecError::WrongChannel {
                expected: LogicalChannel::DlDcch,
                actual: LogicalChannel::UlDcch,
            })
        );

        let mut buf = &[0x09u8, 0x00][..];
        assert_eq!(
            read_header(&mut buf, LogicalChannel::UlCcch),
            Err(RrcCodecError::UnknownChannel(0x09))
        );
    }

    #[test]
    fn test_octets_length_checked() {
        let mut out = BytesMut::new();
        put_octets(&mut out, &[1, 2, 3]).expect("fits");
        let mut buf = &out[..];
        assert_eq!(get_octets(&mut buf).expect("octets"), vec![1, 2, 3]);

        let mut short = &[0x00u8, 0x05, 0x01][..];
        assert_eq!(
            get_octets(&mut short),
            Err(RrcCodecError::BufferTooShort {
                needed: 5,
                available: 1
            })
        );

        let mut out = BytesMut::new();
        assert!(matches!(
            put_octets(&mut out, &vec![0u8; 65_536]),
            Err(RrcCodecError::FieldTooLong { len: 65_536, .. })
        ));
        assert!(out.is_empty());
    }
}
