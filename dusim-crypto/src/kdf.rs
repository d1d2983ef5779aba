//! 5G key derivation (3GPP TS 33.501 Annex A, TS 33.220 Annex B.2)
//!
//! Every derivation is `HMAC-SHA-256(Key, S)` with
//! `S = FC || P0 || L0 || P1 || L1 || ...`, each `Li` a 2-octet length.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;

use crate::CryptoError;

pub const KEY_128_SIZE: usize = 16;
pub const KEY_256_SIZE: usize = 32;

/// FC values from TS 33.501 Annex A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FcValue {
    /// KAUSF from CK, IK (A.2)
    Kausf = 0x6A,
    /// RES* / XRES* (A.4)
    ResStar = 0x6B,
    /// KSEAF from KAUSF (A.6)
    Kseaf = 0x6C,
    /// KAMF from KSEAF (A.7)
    Kamf = 0x6D,
    /// NAS algorithm keys (A.8)
    AlgorithmKey = 0x69,
}

/// Algorithm type distinguisher for A.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlgorithmTypeDistinguisher {
    NasEnc = 0x01,
    NasInt = 0x02,
}

pub fn hmac_sha256(key: &[u8], input: &[u8]) -> [u8; KEY_256_SIZE] {
    // HMAC accepts keys of any length
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any size"));
    mac.update(input);
    let mut output = [0u8; KEY_256_SIZE];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

/// Generic KDF over `FC || P0 || L0 || ...`.
pub fn calculate_kdf_key(key: &[u8], fc: FcValue, parameters: &[&[u8]]) -> [u8; KEY_256_SIZE] {
    let mut input = Vec::with_capacity(1 + parameters.iter().map(|p| p.len() + 2).sum::<usize>());
    input.push(fc as u8);
    for param in parameters {
        input.extend_from_slice(param);
        input.extend_from_slice(&(param.len() as u16).to_be_bytes());
    }
    hmac_sha256(key, &input)
}

fn ck_ik(ck: &[u8; KEY_128_SIZE], ik: &[u8; KEY_128_SIZE]) -> [u8; KEY_256_SIZE] {
    let mut key = [0u8; KEY_256_SIZE];
    key[..KEY_128_SIZE].copy_from_slice(ck);
    key[KEY_128_SIZE..].copy_from_slice(ik);
    key
}

/// KAUSF = KDF(CK || IK, 0x6A, SN name, SQN XOR AK)
pub fn derive_kausf(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    sn_name: &[u8],
    sqn_xor_ak: &[u8; 6],
) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(&ck_ik(ck, ik), FcValue::Kausf, &[sn_name, sqn_xor_ak])
}

/// KSEAF = KDF(KAUSF, 0x6C, SN name)
pub fn derive_kseaf(kausf: &[u8; KEY_256_SIZE], sn_name: &[u8]) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(kausf, FcValue::Kseaf, &[sn_name])
}

/// KAMF = KDF(KSEAF, 0x6D, SUPI, ABBA)
pub fn derive_kamf(kseaf: &[u8; KEY_256_SIZE], supi: &[u8], abba: &[u8]) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(kseaf, FcValue::Kamf, &[supi, abba])
}

/// NAS algorithm key: the low 128 bits of KDF(KAMF, 0x69, distinguisher, alg id).
pub fn derive_nas_key(
    kamf: &[u8; KEY_256_SIZE],
    distinguisher: AlgorithmTypeDistinguisher,
    algorithm_id: u8,
) -> [u8; KEY_128_SIZE] {
    let out = calculate_kdf_key(
        kamf,
        FcValue::AlgorithmKey,
        &[&[distinguisher as u8], &[algorithm_id]],
    );
    let mut key = [0u8; KEY_128_SIZE];
    key.copy_from_slice(&out[KEY_128_SIZE..]);
    key
}

pub fn derive_knas_enc(kamf: &[u8; KEY_256_SIZE], algorithm_id: u8) -> [u8; KEY_128_SIZE] {
    derive_nas_key(kamf, AlgorithmTypeDistinguisher::NasEnc, algorithm_id)
}

pub fn derive_knas_int(kamf: &[u8; KEY_256_SIZE], algorithm_id: u8) -> [u8; KEY_128_SIZE] {
    derive_nas_key(kamf, AlgorithmTypeDistinguisher::NasInt, algorithm_id)
}

/// RES* = low 128 bits of KDF(CK || IK, 0x6B, SN name, RAND, RES)
pub fn derive_res_star(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    sn_name: &[u8],
    rand: &[u8; KEY_128_SIZE],
    res: &[u8],
) -> [u8; KEY_128_SIZE] {
    let out = calculate_kdf_key(&ck_ik(ck, ik), FcValue::ResStar, &[sn_name, rand, res]);
    let mut res_star = [0u8; KEY_128_SIZE];
    res_star.copy_from_slice(&out[KEY_128_SIZE..]);
    res_star
}

/// Character-string KDF parameters are NFKC-normalised UTF-8 (Annex B.2.1.2).
pub fn encode_kdf_string(s: &str) -> Vec<u8> {
    s.nfkc().collect::<String>().into_bytes()
}

/// Serving network name, `5G:mnc<MNC>.mcc<MCC>.3gppnetwork.org`, with the
/// MNC padded to three digits (TS 24.501 9.12.1).
pub fn serving_network_name(mcc: u16, mnc: u16) -> String {
    format!("5G:mnc{mnc:03}.mcc{mcc:03}.3gppnetwork.org")
}

/// Validates that an algorithm identifier is one this crate implements.
pub fn check_integrity_algorithm(id: u8) -> Result<(), CryptoError> {
    match id {
        0 | 2 => Ok(()),
        other => Err(CryptoError::UnsupportedIntegrityAlgorithm(other)),
    }
}

pub fn check_ciphering_algorithm(id: u8) -> Result<(), CryptoError> {
    match id {
        0 | 2 => Ok(()),
        other => Err(CryptoError::UnsupportedCipheringAlgorithm(other)),
    }
}
