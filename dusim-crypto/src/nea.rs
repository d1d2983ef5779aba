//! NAS ciphering algorithms (3GPP TS 33.501 Annex D.2)
//!
//! NEA2 is AES-128 in counter mode, so encryption and decryption are the
//! same keystream application.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::CryptoError;

pub const KEY_SIZE: usize = 16;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Initial counter block: `COUNT || BEARER || DIRECTION || 0^90`.
fn nea2_iv(count: u32, bearer: u8, direction: u8) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&count.to_be_bytes());
    iv[4] = ((bearer & 0x1F) << 3) | ((direction & 0x01) << 2);
    iv
}

/// NEA2 (128-EEA2) applied in place.
pub fn nea2_apply(count: u32, bearer: u8, direction: u8, key: &[u8; KEY_SIZE], data: &mut [u8]) {
    let iv = nea2_iv(count, bearer, direction);
    let mut cipher = Aes128Ctr::new(key.into(), &iv.into());
    cipher.apply_keystream(data);
}

/// Ciphers or deciphers `data` in place with the algorithm identified by
/// `algorithm_id`. NEA0 leaves the data untouched.
pub fn apply_cipher(
    algorithm_id: u8,
    count: u32,
    bearer: u8,
    direction: u8,
    key: &[u8; KEY_SIZE],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    match algorithm_id {
        0 => Ok(()),
        2 => {
            nea2_apply(count, bearer, direction, key, data);
            Ok(())
        }
        other => Err(CryptoError::UnsupportedCipheringAlgorithm(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nea2_3gpp_test_set_1_first_block() {
        // TS 33.401 Annex C.1, 128-EEA2 Test Set 1 (first 16 bytes)
        let key: [u8; 16] = hex::decode("d3c5d592327fb11c4035c6680af8c6d1")
            .expect("hex")
            .try_into()
            .expect("length");
        let mut data = hex::decode("981ba6824c1bfb1ab485472029b71d80").expect("hex");

        nea2_apply(0x398a59b4, 0x15, 1, &key, &mut data);
        assert_eq!(hex::encode(&data), "e9fed8a63d155304d71df20bf3e82214");

        nea2_apply(0x398a59b4, 0x15, 1, &key, &mut data);
        assert_eq!(hex::encode(&data), "981ba6824c1bfb1ab485472029b71d80");
    }

    #[test]
    fn test_apply_cipher_dispatch() {
        let key = [0x2bu8; 16];
        let mut data = b"plain".to_vec();
        apply_cipher(0, 0, 0, 0, &key, &mut data).expect("nea0");
        assert_eq!(data, b"plain");

        assert!(apply_cipher(1, 0, 0, 0, &key, &mut data).is_err());
        assert_eq!(data, b"plain");
    }
}
