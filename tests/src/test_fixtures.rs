//! Test fixtures and configuration helpers
//!
//! Builds the [`SimConfig`] of a test DU/UE pair. The subscriber matches
//! what [`MockCu`](crate::MockCu) provisions by default.

use dusim_common::{
    CellConfig, DuConfig, HandoverConfig, PlmnConfig, SimConfig, UeConfig,
};

pub const TEST_MCC: &str = "208";
pub const TEST_MNC: &str = "93";
pub const TEST_MSIN: &str = "0000000001";
pub const TEST_KEY: &str = "8baf473f2f8fd09487cccbd7097c6862";
pub const TEST_OPC: &str = "8e27b6af0e692e750f32667a3b14605d";
pub const TEST_AMF: &str = "8000";

/// PCI of the source cell in handover scenarios
pub const SOURCE_PCI: u16 = 1;
/// PCI of the target cell; matches the neighbor the UE reports
pub const TARGET_PCI: u16 = 2;

/// Builder for a test [`SimConfig`].
#[derive(Debug, Clone)]
pub struct TestConfig {
    config: SimConfig,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfig {
    pub fn new() -> Self {
        let plmn = PlmnConfig::new(TEST_MCC, TEST_MNC);
        Self {
            config: SimConfig {
                du: DuConfig {
                    id: 1,
                    name: "du-1".to_string(),
                    cucp_address: "127.0.0.1".to_string(),
                    cucp_port: 38472,
                    local_address: String::new(),
                    local_port: 0,
                    plmn: plmn.clone(),
                    cell: CellConfig {
                        pci: SOURCE_PCI,
                        tac: "000001".to_string(),
                    },
                    handover: HandoverConfig::default(),
                },
                ue: test_subscriber(),
            },
        }
    }

    /// DU `id` serving `pci`.
    pub fn with_du(mut self, id: u64, pci: u16) -> Self {
        self.config.du.id = id;
        self.config.du.name = format!("du-{id}");
        self.config.du.cell.pci = pci;
        self
    }

    pub fn with_handover_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.du.handover.timeout_ms = timeout_ms;
        self
    }

    pub fn with_a3_offset_db(mut self, offset: i32) -> Self {
        self.config.du.handover.a3_offset_db = offset;
        self
    }

    pub fn build(self) -> SimConfig {
        self.config
    }
}

/// The subscriber every test UE uses.
pub fn test_subscriber() -> UeConfig {
    UeConfig {
        msin: TEST_MSIN.to_string(),
        supi: String::new(),
        key: TEST_KEY.to_string(),
        op: String::new(),
        opc: TEST_OPC.to_string(),
        amf: TEST_AMF.to_string(),
        plmn: PlmnConfig::new(TEST_MCC, TEST_MNC),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TestConfig::new().build();
        config.validate().expect("valid");
        assert_eq!(config.ue.supi(), "imsi-208930000000001");
    }

    #[test]
    fn test_builder() {
        let config = TestConfig::new()
            .with_du(2, TARGET_PCI)
            .with_handover_timeout_ms(100)
            .with_a3_offset_db(6)
            .build();
        assert_eq!(config.du.name, "du-2");
        assert_eq!(config.du.cell.pci, 2);
        assert_eq!(config.du.handover.timeout_ms, 100);
        assert_eq!(config.du.handover.a3_offset_db, 6);
        config.validate().expect("valid");
    }
}
