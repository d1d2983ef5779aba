//! MAC Random Access Response (Msg2) payload, TS 38.321 Section 6.2.3
//!
//! `| 0x40 | TA | UL grant (3) | Temporary C-RNTI (2) |`

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{ensure, RrcCodecError, Result};

const RAR_HEADER: u8 = 0x40;
pub const RAR_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomAccessResponse {
    pub timing_advance: u8,
    pub ul_grant: [u8; 3],
    pub temporary_c_rnti: u16,
}

impl RandomAccessResponse {
    /// RAR with zero timing advance and an empty grant.
    pub fn new(temporary_c_rnti: u16) -> Self {
        Self {
            timing_advance: 0,
            ul_grant: [0; 3],
            temporary_c_rnti,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RAR_LEN);
        buf.put_u8(RAR_HEADER);
        buf.put_u8(self.timing_advance);
        buf.put_slice(&self.ul_grant);
        buf.put_u16(self.temporary_c_rnti);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure(data, RAR_LEN)?;
        if data[0] != RAR_HEADER {
            return Err(RrcCodecError::InvalidValue(format!(
                "RAR header 0x{:02X}",
                data[0]
            )));
        }
        Ok(Self {
            timing_advance: data[1],
            ul_grant: [data[2], data[3], data[4]],
            temporary_c_rnti: u16::from_be_bytes([data[5], data[6]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rar_layout() {
        let rar = RandomAccessResponse::new(0x4601);
        assert_eq!(rar.encode().as_ref(), &[0x40, 0, 0, 0, 0, 0x46, 0x01]);
        assert_eq!(RandomAccessResponse::decode(&rar.encode()).expect("decode"), rar);
        assert!(RandomAccessResponse::decode(&[0x41, 0, 0, 0, 0, 0, 1]).is_err());
        assert!(RandomAccessResponse::decode(&[0x40, 0]).is_err());
    }
}
