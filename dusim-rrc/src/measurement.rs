//! MeasurementReport contents (TS 38.331 Section 6.2.2, MeasResults)
//!
//! RSRP is reported as an index 0..=127 with `dBm = index - 156`; RSRQ as
//! an index with `dB = index - 87`.

use bytes::{BufMut, BytesMut};

use crate::codec::{get_u16, get_u8, put_count, Result};

const RSRP_OFFSET: i32 = 156;
const RSRQ_OFFSET: i32 = 87;

/// Converts an RSRP index to dBm.
pub fn rsrp_to_dbm(index: u8) -> i32 {
    index as i32 - RSRP_OFFSET
}

/// Converts dBm to an RSRP index, clamped to the reportable range.
pub fn rsrp_from_dbm(dbm: i32) -> u8 {
    (dbm + RSRP_OFFSET).clamp(0, 127) as u8
}

pub fn rsrq_to_db(index: u8) -> i32 {
    index as i32 - RSRQ_OFFSET
}

pub fn rsrq_from_db(db: i32) -> u8 {
    (db + RSRQ_OFFSET).clamp(0, 127) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellResults {
    pub rsrp: Option<u8>,
    pub rsrq: Option<u8>,
}

impl CellResults {
    pub fn from_dbm(rsrp_dbm: i32, rsrq_db: i32) -> Self {
        Self {
            rsrp: Some(rsrp_from_dbm(rsrp_dbm)),
            rsrq: Some(rsrq_from_db(rsrq_db)),
        }
    }

    pub fn rsrp_dbm(&self) -> Option<i32> {
        self.rsrp.map(rsrp_to_dbm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServingCellResult {
    pub serv_cell_id: u8,
    pub results: CellResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborCellResult {
    pub pci: Option<u16>,
    pub results: CellResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeasurementReport {
    pub meas_id: u8,
    pub serving_cells: Vec<ServingCellResult>,
    pub neighbor_cells: Vec<NeighborCellResult>,
}

impl MeasurementReport {
    /// RSRP of the first serving cell in dBm.
    pub fn serving_rsrp_dbm(&self) -> Option<i32> {
        self.serving_cells.first().and_then(|s| s.results.rsrp_dbm())
    }

    pub(crate) fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.meas_id);
        put_count(buf, "serving cells", self.serving_cells.len())?;
        for serving in &self.serving_cells {
            buf.put_u8(serving.serv_cell_id);
            encode_results(buf, &serving.results, 0);
        }
        put_count(buf, "neighbor cells", self.neighbor_cells.len())?;
        for neighbor in &self.neighbor_cells {
            let flags = if neighbor.pci.is_some() { 0x04 } else { 0 };
            encode_results(buf, &neighbor.results, flags);
            if let Some(pci) = neighbor.pci {
                buf.put_u16(pci);
            }
        }
        Ok(())
    }

    pub(crate) fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        let meas_id = get_u8(buf)?;
        let serving_count = get_u8(buf)?;
        let mut serving_cells = Vec::with_capacity(serving_count as usize);
        for _ in 0..serving_count {
            let serv_cell_id = get_u8(buf)?;
            let (results, _) = decode_results(buf)?;
            serving_cells.push(ServingCellResult {
                serv_cell_id,
                results,
            });
        }
        let neighbor_count = get_u8(buf)?;
        let mut neighbor_cells = Vec::with_capacity(neighbor_count as usize);
        for _ in 0..neighbor_count {
            let (results, flags) = decode_results(buf)?;
            let pci = if flags & 0x04 != 0 {
                Some(get_u16(buf)?)
            } else {
                None
            };
            neighbor_cells.push(NeighborCellResult { pci, results });
        }
        Ok(Self {
            meas_id,
            serving_cells,
            neighbor_cells,
        })
    }
}

// flags: bit0 RSRP present, bit1 RSRQ present, bit2 PCI present (neighbors)
fn encode_results(buf: &mut BytesMut, results: &CellResults, extra_flags: u8) {
    let mut flags = extra_flags;
    if results.rsrp.is_some() {
        flags |= 0x01;
    }
    if results.rsrq.is_some() {
        flags |= 0x02;
    }
    buf.put_u8(flags);
    if let Some(rsrp) = results.rsrp {
        buf.put_u8(rsrp);
    }
    if let Some(rsrq) = results.rsrq {
        buf.put_u8(rsrq);
    }
}

fn decode_results(buf: &mut &[u8]) -> Result<(CellResults, u8)> {
    let flags = get_u8(buf)?;
    let rsrp = if flags & 0x01 != 0 { Some(get_u8(buf)?) } else { None };
    let rsrq = if flags & 0x02 != 0 { Some(get_u8(buf)?) } else { None };
    Ok((CellResults { rsrp, rsrq }, flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_mapping() {
        assert_eq!(rsrp_from_dbm(-80), 76);
        assert_eq!(rsrp_to_dbm(76), -80);
        assert_eq!(rsrq_from_db(-10), 77);
        assert_eq!(rsrp_from_dbm(-200), 0);
        assert_eq!(rsrp_from_dbm(0), 127);
    }

    #[test]
    fn test_report_with_partial_neighbors() {
        let report = MeasurementReport {
            meas_id: 1,
            serving_cells: vec![ServingCellResult {
                serv_cell_id: 0,
                results: CellResults::from_dbm(-80, -10),
            }],
            neighbor_cells: vec![
                NeighborCellResult {
                    pci: None,
                    results: CellResults::from_dbm(-60, -10),
                },
                NeighborCellResult {
                    pci: Some(2),
                    results: CellResults { rsrp: Some(81), rsrq: None },
                },
            ],
        };
        let mut buf = BytesMut::new();
        report.encode_into(&mut buf).expect("encode");
        let mut slice = &buf[..];
        let decoded = MeasurementReport::decode_from(&mut slice).expect("decode");
        assert!(slice.is_empty());
        assert_eq!(decoded, report);
        assert_eq!(decoded.serving_rsrp_dbm(), Some(-80));
        assert_eq!(decoded.neighbor_cells[1].results.rsrp_dbm(), Some(-75));
    }
}
