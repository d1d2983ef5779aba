//! Error types for the DU

use thiserror::Error;

use crate::du::DuState;
use crate::handover::HandoverRole;

/// Errors raised by an F1 transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("SCTP connection not established")]
    NotConnected,

    #[error("Transport already connected")]
    AlreadyConnected,

    #[error("Failed to resolve CU-CP address {0}")]
    Resolve(String),

    #[error("SCTP error: {0}")]
    Sctp(#[from] dusim_sctp::SctpError),

    #[error("Transport closed")]
    Closed,
}

/// Errors raised by the DU.
#[derive(Debug, Error)]
pub enum DuError {
    #[error("Configuration error: {0}")]
    Config(#[from] dusim_common::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid DU state: expected {expected}, got {actual}")]
    InvalidState { expected: DuState, actual: DuState },

    #[error("Not a handover target (role {0})")]
    NotHandoverTarget(HandoverRole),

    #[error("No UE channel")]
    NoUeChannel,

    #[error("F1AP encoding failed: {0}")]
    Encode(#[from] dusim_f1ap::F1apCodecError),
}

pub type Result<T> = std::result::Result<T, DuError>;
