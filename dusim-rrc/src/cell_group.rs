//! CellGroupConfig (TS 38.331 Section 6.3.2), reduced to the fields the
//! DU/UE exchange: the cell group id and, for handover, the
//! reconfigurationWithSync of the special cell.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{get_bool, get_u16, get_u8, put_bool, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconfigurationWithSync {
    /// C-RNTI the UE uses in the target cell
    pub new_ue_identity: u16,
    pub target_pci: u16,
    /// Supervision timer T304 in milliseconds
    pub t304_ms: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpCellConfig {
    pub reconfiguration_with_sync: Option<ReconfigurationWithSync>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellGroupConfig {
    pub cell_group_id: u8,
    pub sp_cell_config: Option<SpCellConfig>,
}

impl CellGroupConfig {
    /// Master cell group with no special cell configuration.
    pub fn master() -> Self {
        Self::default()
    }

    /// Cell group ordering a synchronous reconfiguration towards `target_pci`.
    pub fn with_sync(new_ue_identity: u16, target_pci: u16) -> Self {
        Self {
            cell_group_id: 0,
            sp_cell_config: Some(SpCellConfig {
                reconfiguration_with_sync: Some(ReconfigurationWithSync {
                    new_ue_identity,
                    target_pci,
                    t304_ms: 1000,
                }),
            }),
        }
    }

    pub fn reconfiguration_with_sync(&self) -> Option<&ReconfigurationWithSync> {
        self.sp_cell_config
            .as_ref()
            .and_then(|sp| sp.reconfiguration_with_sync.as_ref())
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u8(self.cell_group_id);
        put_bool(&mut buf, self.sp_cell_config.is_some());
        if let Some(sp) = &self.sp_cell_config {
            put_bool(&mut buf, sp.reconfiguration_with_sync.is_some());
            if let Some(sync) = &sp.reconfiguration_with_sync {
                buf.put_u16(sync.new_ue_identity);
                buf.put_u16(sync.target_pci);
                buf.put_u16(sync.t304_ms);
            }
        }
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let cell_group_id = get_u8(&mut buf)?;
        let sp_cell_config = if get_bool(&mut buf)? {
            let reconfiguration_with_sync = if get_bool(&mut buf)? {
                Some(ReconfigurationWithSync {
                    new_ue_identity: get_u16(&mut buf)?,
                    target_pci: get_u16(&mut buf)?,
                    t304_ms: get_u16(&mut buf)?,
                })
            } else {
                None
            };
            Some(SpCellConfig {
                reconfiguration_with_sync,
            })
        } else {
            None
        };
        Ok(Self {
            cell_group_id,
            sp_cell_config,
        })
    }
}
