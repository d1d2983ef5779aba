//! NAS (Non-Access Stratum) protocol library
//!
//! 5G NAS (3GPP TS 24.501) as used by the dusim UE:
//! - 5GMM messages for registration, authentication and security mode control
//! - 5GSM messages for PDU session establishment, modification and release
//! - the NAS security context that protects them
//!
//! # Example
//!
//! ```rust
//! use dusim_nas::{MmMessage, NasMessage};
//!
//! let bytes = NasMessage::Mm(MmMessage::RegistrationComplete).encode().unwrap();
//! assert_eq!(bytes, vec![0x7E, 0x00, 0x43]);
//! assert_eq!(NasMessage::decode(&bytes).unwrap(), NasMessage::Mm(MmMessage::RegistrationComplete));
//! ```

pub mod cause;
pub mod codec;
pub mod enums;
pub mod ies;
pub mod message;
pub mod mm;
pub mod security;
pub mod sm;

pub use codec::{CodecError, CodecResult};
pub use enums::{
    ExtendedProtocolDiscriminator, IdentityType, MmMessageType, PayloadContainerType,
    PduSessionType, RegistrationType, RequestType, SecurityHeaderType, SmMessageType,
};
pub use ies::{
    Dnn, GprsTimer3, Guti, MobileIdentity, NasKeySetIdentifier, PduAddress, SessionAmbr, Suci,
    UeSecurityCapability,
};
pub use message::{security_header_type, NasMessage};
pub use mm::MmMessage;
pub use security::{
    CipheringAlgorithm, IntegrityAlgorithm, NasCount, NasDirection, NasKeys,
    NasSecurityAlgorithms, NasSecurityContext, SecuredNasMessage, SecurityContextState,
    SecurityError, SECURED_HEADER_LEN,
};
pub use sm::{SmBody, SmMessage};

use thiserror::Error;

/// Errors surfaced by NAS processing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NasError {
    #[error("NAS codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("NAS security error: {0}")]
    Security(#[from] SecurityError),
}
