//! NAS integrity algorithms (3GPP TS 33.501 Annex D.3)

use aes::Aes128;
use cmac::{Cmac, Mac};

use crate::CryptoError;

pub const KEY_SIZE: usize = 16;
pub const MAC_SIZE: usize = 4;

/// NIA0: null integrity, MAC is all zeros.
pub fn nia0_compute_mac() -> [u8; MAC_SIZE] {
    [0u8; MAC_SIZE]
}

/// NIA2 (128-EIA2): AES-CMAC over `COUNT || BEARER || DIRECTION || 0^26 || MESSAGE`,
/// truncated to 32 bits.
pub fn nia2_compute_mac(
    count: u32,
    bearer: u8,
    direction: u8,
    key: &[u8; KEY_SIZE],
    data: &[u8],
) -> [u8; MAC_SIZE] {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("AES-128 CMAC key is 16 bytes"));
    mac.update(&count.to_be_bytes());
    mac.update(&[((bearer & 0x1F) << 3) | ((direction & 0x01) << 2), 0, 0, 0]);
    mac.update(data);

    let full = mac.finalize().into_bytes();
    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&full[..MAC_SIZE]);
    out
}

/// Computes a NAS MAC with the algorithm identified by `algorithm_id`.
pub fn compute_mac(
    algorithm_id: u8,
    count: u32,
    bearer: u8,
    direction: u8,
    key: &[u8; KEY_SIZE],
    data: &[u8],
) -> Result<[u8; MAC_SIZE], CryptoError> {
    match algorithm_id {
        0 => Ok(nia0_compute_mac()),
        2 => Ok(nia2_compute_mac(count, bearer, direction, key, data)),
        other => Err(CryptoError::UnsupportedIntegrityAlgorithm(other)),
    }
}
