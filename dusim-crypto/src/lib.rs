//! Cryptographic functions for dusim
//!
//! - Milenage f1-f5* (3GPP TS 35.206)
//! - 5G key derivation (3GPP TS 33.501 Annex A)
//! - NAS integrity (NIA0, NIA2) and ciphering (NEA0, NEA2)

pub mod kdf;
pub mod milenage;
pub mod nea;
pub mod nia;

pub use milenage::{compute_opc, Milenage};

use thiserror::Error;

/// Errors raised by the algorithm selectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("unsupported integrity algorithm NIA{0}")]
    UnsupportedIntegrityAlgorithm(u8),

    #[error("unsupported ciphering algorithm NEA{0}")]
    UnsupportedCipheringAlgorithm(u8),
}
