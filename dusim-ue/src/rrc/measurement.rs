//! Measurement reporting (TS 38.331 Section 5.5.5)
//!
//! The UE has no radio; reports carry fixed values that put the neighbor
//! 5 dB above the serving cell, enough to cross a 3 dB A3 offset.

use dusim_rrc::{CellResults, MeasurementReport, NeighborCellResult, ServingCellResult};

pub const MEAS_ID: u8 = 1;
pub const SERVING_RSRP_DBM: i32 = -80;
pub const SERVING_RSRQ_DB: i32 = -10;
pub const NEIGHBOR_PCI: u16 = 2;
pub const NEIGHBOR_RSRP_DBM: i32 = -75;
pub const NEIGHBOR_RSRQ_DB: i32 = -10;

/// Report with one serving cell and one neighbor.
pub fn simulated_report() -> MeasurementReport {
    MeasurementReport {
        meas_id: MEAS_ID,
        serving_cells: vec![ServingCellResult {
            serv_cell_id: 0,
            results: CellResults::from_dbm(SERVING_RSRP_DBM, SERVING_RSRQ_DB),
        }],
        neighbor_cells: vec![NeighborCellResult {
            pci: Some(NEIGHBOR_PCI),
            results: CellResults::from_dbm(NEIGHBOR_RSRP_DBM, NEIGHBOR_RSRQ_DB),
        }],
    }
}
