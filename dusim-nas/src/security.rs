//! NAS security context and message protection
//!
//! Security-protected 5GS NAS messages (3GPP TS 24.501 Section 9.1) have a
//! 7-octet header followed by the (possibly ciphered) plain message:
//!
//! ```text
//! | EPD | SHT | MAC (4) | SQN | plain NAS message ... |
//! ```
//!
//! The MAC is computed over `SQN || plain NAS message` after ciphering, with
//! bearer 0 and the NAS COUNT of the sending direction.
//!
//! The context starts in `Null`, moves to `Inactive` once authentication has
//! produced KAMF and becomes `Active` after the Security Mode Command has
//! selected algorithms and the NAS keys have been derived.

use dusim_crypto::kdf::{derive_knas_enc, derive_knas_int, KEY_128_SIZE, KEY_256_SIZE};
use dusim_crypto::{nea, nia};

use crate::enums::{ExtendedProtocolDiscriminator, SecurityHeaderType};
use crate::ies::NasKeySetIdentifier;

/// NAS bearer identity for integrity/ciphering, always 0 (TS 33.501).
pub const NAS_BEARER: u8 = 0;

/// Length of the security protected header.
pub const SECURED_HEADER_LEN: usize = 7;

/// Security-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("Invalid ciphering algorithm: 0x{0:02X}")]
    InvalidCipheringAlgorithm(u8),

    #[error("Invalid integrity algorithm: 0x{0:02X}")]
    InvalidIntegrityAlgorithm(u8),

    #[error("Invalid security header type: 0x{0:02X}")]
    InvalidSecurityHeaderType(u8),

    #[error("Invalid extended protocol discriminator: 0x{0:02X}")]
    InvalidEpd(u8),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("MAC verification failed")]
    MacVerificationFailed,

    #[error("Security context not established")]
    NoSecurityContext,

    #[error("Security context not active")]
    SecurityContextNotActive,

    #[error("NAS count overflow detected")]
    NasCountOverflow,

    #[error("Secured NAS message too short: {0} bytes")]
    MessageTooShort(usize),
}

/// 5G NAS ciphering algorithm (TS 24.501 Section 9.11.3.34)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CipheringAlgorithm {
    /// 5G-EA0 (null ciphering)
    #[default]
    Nea0 = 0x00,
    /// 128-5G-EA1 (SNOW3G based)
    Nea1 = 0x01,
    /// 128-5G-EA2 (AES based)
    Nea2 = 0x02,
    /// 128-5G-EA3 (ZUC based)
    Nea3 = 0x03,
}

impl CipheringAlgorithm {
    /// Whether this simulator implements the algorithm.
    pub fn is_supported(&self) -> bool {
        matches!(self, CipheringAlgorithm::Nea0 | CipheringAlgorithm::Nea2)
    }
}

impl TryFrom<u8> for CipheringAlgorithm {
    type Error = SecurityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CipheringAlgorithm::Nea0),
            0x01 => Ok(CipheringAlgorithm::Nea1),
            0x02 => Ok(CipheringAlgorithm::Nea2),
            0x03 => Ok(CipheringAlgorithm::Nea3),
            _ => Err(SecurityError::InvalidCipheringAlgorithm(value)),
        }
    }
}

/// 5G NAS integrity protection algorithm (TS 24.501 Section 9.11.3.34)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum IntegrityAlgorithm {
    /// 5G-IA0 (null integrity)
    #[default]
    Nia0 = 0x00,
    /// 128-5G-IA1 (SNOW3G based)
    Nia1 = 0x01,
    /// 128-5G-IA2 (AES based)
    Nia2 = 0x02,
    /// 128-5G-IA3 (ZUC based)
    Nia3 = 0x03,
}

impl IntegrityAlgorithm {
    pub fn is_supported(&self) -> bool {
        matches!(self, IntegrityAlgorithm::Nia0 | IntegrityAlgorithm::Nia2)
    }
}

impl TryFrom<u8> for IntegrityAlgorithm {
    type Error = SecurityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(IntegrityAlgorithm::Nia0),
            0x01 => Ok(IntegrityAlgorithm::Nia1),
            0x02 => Ok(IntegrityAlgorithm::Nia2),
            0x03 => Ok(IntegrityAlgorithm::Nia3),
            _ => Err(SecurityError::InvalidIntegrityAlgorithm(value)),
        }
    }
}

/// Selected NAS security algorithms, as carried in the Security Mode Command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NasSecurityAlgorithms {
    pub ciphering: CipheringAlgorithm,
    pub integrity: IntegrityAlgorithm,
}

impl NasSecurityAlgorithms {
    pub fn new(ciphering: CipheringAlgorithm, integrity: IntegrityAlgorithm) -> Self {
        Self {
            ciphering,
            integrity,
        }
    }

    /// Ciphering in the high nibble, integrity in the low nibble.
    pub fn encode(&self) -> u8 {
        ((self.ciphering as u8) << 4) | (self.integrity as u8)
    }

    pub fn decode(value: u8) -> Result<Self, SecurityError> {
        Ok(Self {
            ciphering: CipheringAlgorithm::try_from((value >> 4) & 0x0F)?,
            integrity: IntegrityAlgorithm::try_from(value & 0x0F)?,
        })
    }

    pub fn is_supported(&self) -> bool {
        self.ciphering.is_supported() && self.integrity.is_supported()
    }
}

/// State of the NAS security context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityContextState {
    /// No security context exists
    #[default]
    Null,
    /// Authentication in progress
    Establishing,
    /// KAMF available, algorithms not yet selected
    Inactive,
    /// NAS keys derived, messages are protected
    Active,
}

/// Keys of the 5G key hierarchy held by a NAS security context
///
/// ```text
/// CK, IK
///    └── KAUSF
///           └── KSEAF
///                  └── KAMF
///                         ├── KNASint
///                         └── KNASenc
/// ```
#[derive(Debug, Clone, Default)]
pub struct NasKeys {
    pub kausf: Option<[u8; KEY_256_SIZE]>,
    pub kseaf: Option<[u8; KEY_256_SIZE]>,
    pub kamf: Option<[u8; KEY_256_SIZE]>,
    pub knas_int: Option<[u8; KEY_128_SIZE]>,
    pub knas_enc: Option<[u8; KEY_128_SIZE]>,
}

impl NasKeys {
    /// Overwrites every key with zeros before dropping it.
    pub fn clear(&mut self) {
        for key in [&mut self.kausf, &mut self.kseaf, &mut self.kamf].into_iter().flatten() {
            key.fill(0);
        }
        for key in [&mut self.knas_int, &mut self.knas_enc].into_iter().flatten() {
            key.fill(0);
        }
        *self = Self::default();
    }
}

/// NAS COUNT: 16-bit overflow counter and 8-bit sequence number
/// (TS 24.501 Section 4.4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NasCount {
    pub overflow: u16,
    pub sqn: u8,
}

impl NasCount {
    pub fn new(overflow: u16, sqn: u8) -> Self {
        Self { overflow, sqn }
    }

    /// `[0x00][overflow_high][overflow_low][sqn]`
    pub fn to_u32(&self) -> u32 {
        ((self.overflow as u32) << 8) | (self.sqn as u32)
    }

    pub fn increment(&mut self) -> Result<(), SecurityError> {
        if self.sqn == 0xFF && self.overflow == 0xFFFF {
            return Err(SecurityError::NasCountOverflow);
        }
        self.sqn = self.sqn.wrapping_add(1);
        if self.sqn == 0 {
            self.overflow = self.overflow.wrapping_add(1);
        }
        Ok(())
    }

    /// Estimates the full count of a received message from its 8-bit SQN.
    pub fn estimate_from_sqn(&self, received_sqn: u8) -> NasCount {
        let overflow = if self.sqn > received_sqn {
            self.overflow.wrapping_add(1)
        } else {
            self.overflow
        };
        NasCount::new(overflow, received_sqn)
    }
}

/// Direction bit used by NIA/NEA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NasDirection {
    /// UE to network
    Uplink = 0,
    /// Network to UE
    Downlink = 1,
}

/// A security protected NAS message split into its header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuredNasMessage {
    pub epd: ExtendedProtocolDiscriminator,
    pub security_header_type: SecurityHeaderType,
    pub mac: [u8; 4],
    pub sequence_number: u8,
    /// Plain NAS message, ciphered if the header type says so
    pub payload: Vec<u8>,
}

impl SecuredNasMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SECURED_HEADER_LEN + self.payload.len());
        out.push(self.epd.into());
        out.push(u8::from(self.security_header_type) & 0x0F);
        out.extend_from_slice(&self.mac);
        out.push(self.sequence_number);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, SecurityError> {
        if data.len() < SECURED_HEADER_LEN {
            return Err(SecurityError::MessageTooShort(data.len()));
        }
        let epd = ExtendedProtocolDiscriminator::try_from(data[0])
            .map_err(|_| SecurityError::InvalidEpd(data[0]))?;
        let security_header_type = SecurityHeaderType::try_from(data[1] & 0x0F)
            .map_err(|_| SecurityError::InvalidSecurityHeaderType(data[1]))?;
        let mut mac = [0u8; 4];
        mac.copy_from_slice(&data[2..6]);
        Ok(Self {
            epd,
            security_header_type,
            mac,
            sequence_number: data[6],
            payload: data[SECURED_HEADER_LEN..].to_vec(),
        })
    }
}

/// NAS security context shared by the UE and, in tests, the network side.
#[derive(Debug, Clone, Default)]
pub struct NasSecurityContext {
    state: SecurityContextState,
    ng_ksi: NasKeySetIdentifier,
    keys: NasKeys,
    algorithms: NasSecurityAlgorithms,
    uplink_count: NasCount,
    downlink_count: NasCount,
}

impl NasSecurityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context created by a successful authentication: KAMF present, no
    /// algorithms selected yet.
    pub fn from_kamf(ng_ksi: NasKeySetIdentifier, keys: NasKeys) -> Self {
        Self {
            state: SecurityContextState::Inactive,
            ng_ksi,
            keys,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SecurityContextState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SecurityContextState::Active
    }

    pub fn ng_ksi(&self) -> NasKeySetIdentifier {
        self.ng_ksi
    }

    pub fn keys(&self) -> &NasKeys {
        &self.keys
    }

    pub fn algorithms(&self) -> NasSecurityAlgorithms {
        self.algorithms
    }

    pub fn uplink_count(&self) -> NasCount {
        self.uplink_count
    }

    pub fn downlink_count(&self) -> NasCount {
        self.downlink_count
    }

    pub fn begin_establishing(&mut self) {
        self.state = SecurityContextState::Establishing;
    }

    /// Derives KNASenc/KNASint from KAMF for the selected algorithms and
    /// activates the context with fresh NAS counts.
    pub fn activate(&mut self, algorithms: NasSecurityAlgorithms) -> Result<(), SecurityError> {
        if !algorithms.is_supported() {
            return Err(SecurityError::UnsupportedAlgorithm(format!(
                "{:?}/{:?}",
                algorithms.ciphering, algorithms.integrity
            )));
        }
        let kamf = self.keys.kamf.ok_or(SecurityError::NoSecurityContext)?;
        self.keys.knas_enc = Some(derive_knas_enc(&kamf, algorithms.ciphering as u8));
        self.keys.knas_int = Some(derive_knas_int(&kamf, algorithms.integrity as u8));
        self.algorithms = algorithms;
        self.uplink_count = NasCount::default();
        self.downlink_count = NasCount::default();
        self.state = SecurityContextState::Active;
        Ok(())
    }

    /// Clears keys and counters, back to `Null`.
    pub fn reset(&mut self) {
        self.keys.clear();
        *self = Self::default();
    }

    fn count_mut(&mut self, direction: NasDirection) -> &mut NasCount {
        match direction {
            NasDirection::Uplink => &mut self.uplink_count,
            NasDirection::Downlink => &mut self.downlink_count,
        }
    }

    fn nas_keys(&self) -> Result<([u8; KEY_128_SIZE], [u8; KEY_128_SIZE]), SecurityError> {
        match (self.keys.knas_int, self.keys.knas_enc) {
            (Some(int), Some(enc)) => Ok((int, enc)),
            _ => Err(SecurityError::NoSecurityContext),
        }
    }

    fn mac(
        &self,
        key: &[u8; KEY_128_SIZE],
        count: NasCount,
        direction: NasDirection,
        sqn: u8,
        payload: &[u8],
    ) -> Result<[u8; 4], SecurityError> {
        let mut data = Vec::with_capacity(1 + payload.len());
        data.push(sqn);
        data.extend_from_slice(payload);
        nia::compute_mac(
            self.algorithms.integrity as u8,
            count.to_u32(),
            NAS_BEARER,
            direction as u8,
            key,
            &data,
        )
        .map_err(|e| SecurityError::UnsupportedAlgorithm(e.to_string()))
    }

    /// Protects a plain NAS message sent in `direction`, consuming one count.
    pub fn protect(
        &mut self,
        plain: &[u8],
        security_header_type: SecurityHeaderType,
        direction: NasDirection,
    ) -> Result<Vec<u8>, SecurityError> {
        if !self.is_active() {
            return Err(SecurityError::SecurityContextNotActive);
        }
        if !security_header_type.is_protected() {
            return Err(SecurityError::InvalidSecurityHeaderType(security_header_type.into()));
        }
        let (knas_int, knas_enc) = self.nas_keys()?;
        let count = *self.count_mut(direction);

        let mut payload = plain.to_vec();
        if security_header_type.is_ciphered() {
            nea::apply_cipher(
                self.algorithms.ciphering as u8,
                count.to_u32(),
                NAS_BEARER,
                direction as u8,
                &knas_enc,
                &mut payload,
            )
            .map_err(|e| SecurityError::UnsupportedAlgorithm(e.to_string()))?;
        }
        let mac = self.mac(&knas_int, count, direction, count.sqn, &payload)?;
        self.count_mut(direction).increment()?;

        Ok(SecuredNasMessage {
            epd: ExtendedProtocolDiscriminator::MobilityManagement,
            security_header_type,
            mac,
            sequence_number: count.sqn,
            payload,
        }
        .encode())
    }

    /// Verifies and deciphers a protected NAS message received in
    /// `direction`, returning the plain message.
    pub fn unprotect(&mut self, data: &[u8], direction: NasDirection) -> Result<Vec<u8>, SecurityError> {
        if !self.is_active() {
            return Err(SecurityError::SecurityContextNotActive);
        }
        let secured = SecuredNasMessage::decode(data)?;
        let (knas_int, knas_enc) = self.nas_keys()?;
        let count = self.count_mut(direction).estimate_from_sqn(secured.sequence_number);

        let expected = self.mac(&knas_int, count, direction, secured.sequence_number, &secured.payload)?;
        if self.algorithms.integrity != IntegrityAlgorithm::Nia0 && expected != secured.mac {
            return Err(SecurityError::MacVerificationFailed);
        }

        let mut payload = secured.payload;
        if secured.security_header_type.is_ciphered() {
            nea::apply_cipher(
                self.algorithms.ciphering as u8,
                count.to_u32(),
                NAS_BEARER,
                direction as u8,
                &knas_enc,
                &mut payload,
            )
            .map_err(|e| SecurityError::UnsupportedAlgorithm(e.to_string()))?;
        }
        *self.count_mut(direction) = count;
        Ok(payload)
    }
}
