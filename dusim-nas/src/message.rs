//! Plain NAS message framing
//!
//! 5GMM: `EPD 0x7E | spare + security header type | message type | body`
//! 5GSM: `EPD 0x2E | PDU session id | PTI | message type | body`

use bytes::BufMut;

use crate::codec::{get_u8, CodecError, CodecResult};
use crate::enums::{ExtendedProtocolDiscriminator, MmMessageType, SecurityHeaderType, SmMessageType};
use crate::mm::MmMessage;
use crate::sm::SmMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasMessage {
    Mm(MmMessage),
    Sm(SmMessage),
}

impl NasMessage {
    /// Name of the message type, for logging.
    pub fn name(&self) -> String {
        match self {
            NasMessage::Mm(msg) => format!("{:?}", msg.message_type()),
            NasMessage::Sm(msg) => format!("{:?}", msg.message_type()),
        }
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            NasMessage::Mm(msg) => {
                buf.put_u8(ExtendedProtocolDiscriminator::MobilityManagement.into());
                buf.put_u8(SecurityHeaderType::NotProtected.into());
                buf.put_u8(msg.message_type().into());
                msg.encode_body(&mut buf)?;
            }
            NasMessage::Sm(msg) => {
                buf.put_u8(ExtendedProtocolDiscriminator::SessionManagement.into());
                buf.put_u8(msg.pdu_session_id);
                buf.put_u8(msg.pti);
                buf.put_u8(msg.message_type().into());
                msg.encode_body(&mut buf)?;
            }
        }
        Ok(buf)
    }

    /// Decodes a plain NAS message. Security protected messages must be
    /// unwrapped first.
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        let mut buf = data;
        let epd = get_u8(&mut buf)?;
        match ExtendedProtocolDiscriminator::try_from(epd) {
            Ok(ExtendedProtocolDiscriminator::MobilityManagement) => {
                let sht = get_u8(&mut buf)? & 0x0F;
                if sht != u8::from(SecurityHeaderType::NotProtected) {
                    return Err(CodecError::InvalidValue(format!(
                        "security protected message (header type {sht})"
                    )));
                }
                let raw = get_u8(&mut buf)?;
                let message_type =
                    MmMessageType::try_from(raw).map_err(|_| CodecError::UnknownMessageType(raw))?;
                Ok(NasMessage::Mm(MmMessage::decode_body(message_type, &mut buf)?))
            }
            Ok(ExtendedProtocolDiscriminator::SessionManagement) => {
                let pdu_session_id = get_u8(&mut buf)?;
                let pti = get_u8(&mut buf)?;
                let raw = get_u8(&mut buf)?;
                let message_type =
                    SmMessageType::try_from(raw).map_err(|_| CodecError::UnknownMessageType(raw))?;
                Ok(NasMessage::Sm(SmMessage::decode_body(
                    pdu_session_id,
                    pti,
                    message_type,
                    &mut buf,
                )?))
            }
            Err(_) => Err(CodecError::UnknownEpd(epd)),
        }
    }
}

impl From<MmMessage> for NasMessage {
    fn from(msg: MmMessage) -> Self {
        NasMessage::Mm(msg)
    }
}

impl From<SmMessage> for NasMessage {
    fn from(msg: SmMessage) -> Self {
        NasMessage::Sm(msg)
    }
}

/// Security header type of a 5GMM PDU; 5GSM PDUs are never protected on
/// their own.
pub fn security_header_type(data: &[u8]) -> CodecResult<SecurityHeaderType> {
    match data {
        [0x7E, octet, ..] => SecurityHeaderType::try_from(octet & 0x0F)
            .map_err(|_| CodecError::InvalidValue(format!("security header type {}", octet & 0x0F))),
        [epd, ..] if *epd == u8::from(ExtendedProtocolDiscriminator::SessionManagement) => {
            Ok(SecurityHeaderType::NotProtected)
        }
        [epd, ..] => Err(CodecError::UnknownEpd(*epd)),
        [] => Err(CodecError::BufferTooShort {
            expected: 1,
            actual: 0,
        }),
    }
}
