//! UE error types

use dusim_nas::{CodecError, NasError, SecurityError};
use thiserror::Error;

/// Errors returned by UE triggers and setup
#[derive(Debug, Error)]
pub enum UeError {
    #[error("Configuration error: {0}")]
    Config(#[from] dusim_common::Error),

    #[error("No free PDU session id")]
    NoFreePduSessionId,

    #[error("PDU session {0} not found")]
    SessionNotFound(u8),

    #[error("PDU session {psi} is {state}, expected {expected}")]
    InvalidSessionState {
        psi: u8,
        state: String,
        expected: &'static str,
    },

    #[error("UE is not registered (state {0})")]
    NotRegistered(String),

    #[error("RRC connection rejected (wait time {0}s)")]
    RrcRejected(u8),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("RRC encoding failed: {0}")]
    RrcCodec(#[from] dusim_rrc::RrcCodecError),

    #[error(transparent)]
    Nas(#[from] NasError),
}

impl From<CodecError> for UeError {
    fn from(e: CodecError) -> Self {
        UeError::Nas(NasError::Codec(e))
    }
}

impl From<SecurityError> for UeError {
    fn from(e: SecurityError) -> Self {
        UeError::Nas(NasError::Security(e))
    }
}

pub type Result<T> = std::result::Result<T, UeError>;
