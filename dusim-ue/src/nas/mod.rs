//! NAS layer of the UE
//!
//! - `mm`: 5GMM registration, authentication and security mode control
//! - `sm`: 5GSM PDU session management
//!
//! Handlers are synchronous and run under the context lock; whatever they
//! need to send is collected in an [`Outbox`] and queued for the uplink
//! sender once the handler returns.

pub mod mm;
pub mod sm;

use bytes::Bytes;
use dusim_common::{log_nas_message, log_rrc_message, Direction};
use dusim_nas::{
    security_header_type, CodecError, MmMessage, NasDirection, NasMessage, SecurityError,
    SecurityHeaderType, SECURED_HEADER_LEN,
};
use dusim_rrc::UlDcchMessage;
use tracing::warn;

use crate::context::UeContext;
use crate::error::Result;
use crate::ue::UeEvent;

/// Uplink RRC PDUs and UE events produced by one handler invocation.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    pub(crate) uplink: Vec<Bytes>,
    pub(crate) events: Vec<UeEvent>,
}

impl Outbox {
    /// Queues a NAS PDU in an UL Information Transfer.
    pub(crate) fn nas(&mut self, pdu: Vec<u8>) -> Result<()> {
        self.rrc(UlDcchMessage::UlInformationTransfer {
            dedicated_nas_message: pdu,
        })
    }

    pub(crate) fn rrc(&mut self, msg: UlDcchMessage) -> Result<()> {
        let bytes = msg.encode()?;
        log_rrc_message(Direction::Tx, msg.name(), &bytes);
        self.uplink.push(bytes);
        Ok(())
    }

    pub(crate) fn event(&mut self, event: UeEvent) {
        self.events.push(event);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.uplink.is_empty() && self.events.is_empty()
    }
}

impl UeContext {
    /// Encodes an uplink NAS message. Protected header types are applied
    /// only when the security context is active.
    pub(crate) fn encode_uplink(
        &mut self,
        msg: impl Into<NasMessage>,
        header_type: SecurityHeaderType,
    ) -> Result<Vec<u8>> {
        let msg = msg.into();
        let name = msg.name();
        let plain = msg.encode()?;

        let pdu = if header_type.is_protected() && self.security.is_active() {
            self.security.protect(&plain, header_type, NasDirection::Uplink)?
        } else {
            if header_type.is_protected() {
                warn!("No active NAS security context, sending {} unprotected", name);
            }
            plain
        };
        log_nas_message(Direction::Tx, &name, &pdu);
        Ok(pdu)
    }

    /// Shorthand for an uplink 5GMM message queued on `out`.
    pub(crate) fn send_mm(
        &mut self,
        msg: MmMessage,
        header_type: SecurityHeaderType,
        out: &mut Outbox,
    ) -> Result<()> {
        let pdu = self.encode_uplink(msg, header_type)?;
        out.nas(pdu)
    }

    /// Unwraps a downlink NAS PDU into a plain message.
    ///
    /// A PDU carrying a new security context (Security Mode Command) is read
    /// past its security header; the context it establishes does not exist
    /// yet. Other protected PDUs must pass integrity verification.
    pub(crate) fn decode_downlink(&mut self, pdu: &[u8]) -> Result<NasMessage> {
        let header_type = security_header_type(pdu)?;
        let msg = match header_type {
            SecurityHeaderType::NotProtected => NasMessage::decode(pdu)?,
            SecurityHeaderType::IntegrityProtectedWithNewSecurityContext => {
                let plain = pdu.get(SECURED_HEADER_LEN..).ok_or(CodecError::BufferTooShort {
                    expected: SECURED_HEADER_LEN,
                    actual: pdu.len(),
                })?;
                NasMessage::decode(plain)?
            }
            _ if self.security.is_active() => {
                let plain = self.security.unprotect(pdu, NasDirection::Downlink)?;
                NasMessage::decode(&plain)?
            }
            _ => return Err(SecurityError::SecurityContextNotActive.into()),
        };
        log_nas_message(Direction::Rx, &msg.name(), pdu);
        Ok(msg)
    }
}
