//! RRC (Radio Resource Control) protocol library
//!
//! Compact binary codec for the RRC messages exchanged between the simulated
//! UE and DU (3GPP TS 38.331), the CellGroupConfig carried in F1AP
//! containers and the MAC random access response (TS 38.321).
//!
//! # Modules
//!
//! - `codec` - channel markers, errors and field helpers
//! - `messages` - UL/DL CCCH and DCCH messages
//! - `cell_group` - CellGroupConfig
//! - `measurement` - MeasurementReport results
//! - `mac` - Random Access Response

pub mod cell_group;
pub mod codec;
pub mod mac;
pub mod measurement;
pub mod messages;

pub use cell_group::{CellGroupConfig, ReconfigurationWithSync, SpCellConfig};
pub use codec::{LogicalChannel, RrcCodecError};
pub use mac::RandomAccessResponse;
pub use measurement::{
    rsrp_from_dbm, rsrp_to_dbm, rsrq_from_db, rsrq_to_db, CellResults, MeasurementReport,
    NeighborCellResult, ServingCellResult,
};
pub use messages::{
    channel_of, DlCcchMessage, DlDcchMessage, EstablishmentCause, RrcReconfiguration, RrcSetup,
    RrcSetupComplete, RrcSetupRequest, UlCcchMessage, UlDcchMessage, UE_IDENTITY_MASK,
};
