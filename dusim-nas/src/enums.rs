//! NAS protocol enumerations
//!
//! Based on 3GPP TS 24.501 specification

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Extended Protocol Discriminator (EPD)
/// 3GPP TS 24.501 Section 9.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ExtendedProtocolDiscriminator {
    /// 5GS Mobility Management messages
    MobilityManagement = 0x7E,
    /// 5GS Session Management messages
    SessionManagement = 0x2E,
}

/// Security Header Type
/// 3GPP TS 24.501 Section 9.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum SecurityHeaderType {
    /// Plain NAS message, not security protected
    #[default]
    NotProtected = 0x00,
    IntegrityProtected = 0x01,
    IntegrityProtectedAndCiphered = 0x02,
    IntegrityProtectedWithNewSecurityContext = 0x03,
    IntegrityProtectedAndCipheredWithNewSecurityContext = 0x04,
}

impl SecurityHeaderType {
    pub fn is_protected(&self) -> bool {
        !matches!(self, SecurityHeaderType::NotProtected)
    }

    pub fn is_ciphered(&self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedAndCiphered
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNewSecurityContext
        )
    }

    pub fn is_new_security_context(&self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedWithNewSecurityContext
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNewSecurityContext
        )
    }
}

/// 5GMM Message Type
/// 3GPP TS 24.501 Section 9.7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MmMessageType {
    RegistrationRequest = 0x41,
    RegistrationAccept = 0x42,
    RegistrationComplete = 0x43,
    RegistrationReject = 0x44,
    AuthenticationRequest = 0x56,
    AuthenticationResponse = 0x57,
    AuthenticationReject = 0x58,
    AuthenticationFailure = 0x59,
    IdentityRequest = 0x5B,
    IdentityResponse = 0x5C,
    SecurityModeCommand = 0x5D,
    SecurityModeComplete = 0x5E,
    SecurityModeReject = 0x5F,
    FiveGmmStatus = 0x64,
    UlNasTransport = 0x67,
    DlNasTransport = 0x68,
}

/// 5GSM Message Type
/// 3GPP TS 24.501 Section 9.7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SmMessageType {
    PduSessionEstablishmentRequest = 0xC1,
    PduSessionEstablishmentAccept = 0xC2,
    PduSessionEstablishmentReject = 0xC3,
    PduSessionModificationRequest = 0xC9,
    PduSessionModificationReject = 0xCA,
    PduSessionModificationCommand = 0xCB,
    PduSessionModificationComplete = 0xCC,
    PduSessionModificationCommandReject = 0xCD,
    PduSessionReleaseRequest = 0xD1,
    PduSessionReleaseReject = 0xD2,
    PduSessionReleaseCommand = 0xD3,
    PduSessionReleaseComplete = 0xD4,
    FiveGsmStatus = 0xD6,
}

/// Payload container type
/// 3GPP TS 24.501 Section 9.11.3.40
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum PayloadContainerType {
    #[default]
    N1SmInformation = 0x01,
    Sms = 0x02,
    LtePositioning = 0x03,
    SorTransparent = 0x04,
    UePolicy = 0x05,
    UeParametersUpdate = 0x06,
    Multiple = 0x0F,
}

/// Request type
/// 3GPP TS 24.501 Section 9.11.3.47
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum RequestType {
    #[default]
    InitialRequest = 0x01,
    ExistingPduSession = 0x02,
    InitialEmergencyRequest = 0x03,
    ExistingEmergencyPduSession = 0x04,
    ModificationRequest = 0x05,
}

/// PDU session type
/// 3GPP TS 24.501 Section 9.11.4.11
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum PduSessionType {
    #[default]
    Ipv4 = 0x01,
    Ipv6 = 0x02,
    Ipv4v6 = 0x03,
    Unstructured = 0x04,
    Ethernet = 0x05,
}

/// 5GS registration type
/// 3GPP TS 24.501 Section 9.11.3.7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum RegistrationType {
    #[default]
    InitialRegistration = 0x01,
    MobilityRegistrationUpdating = 0x02,
    PeriodicRegistrationUpdating = 0x03,
    EmergencyRegistration = 0x04,
}

/// Identity type requested by Identity Request
/// 3GPP TS 24.501 Section 9.11.3.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum IdentityType {
    NoIdentity = 0x00,
    #[default]
    Suci = 0x01,
    Guti = 0x02,
    Imei = 0x03,
    Tmsi = 0x04,
    Imeisv = 0x05,
}
