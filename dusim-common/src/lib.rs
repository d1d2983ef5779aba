//! Common types and utilities for dusim
//!
//! This crate provides the configuration structures, identifiers, error type
//! and logging helpers shared by the DU and UE crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{CellConfig, DuConfig, HandoverConfig, PlmnConfig, SimConfig, UeConfig, UeOpKey};
pub use error::Error;
pub use logging::{
    format_hex_compact, format_hex_dump, init_logging, init_logging_with_filter,
    log_f1ap_message, log_nas_message, log_protocol_message, log_rrc_message, Direction, HexDump,
    LogLevel,
};
pub use types::{NrCgi, Plmn, SNssai};
