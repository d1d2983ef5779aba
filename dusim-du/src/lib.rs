//! Simulated gNB-DU for dusim
//!
//! The DU sits between a simulated UE and a real (or mock) CU-CP:
//!
//! - `transport`: the F1-C link ([`SctpTransport`], [`ChannelTransport`])
//! - `f1ap`: F1 Setup and UE context procedures (TS 38.473)
//! - `router`: uplink RRC wrapping and measurement-driven handover
//! - `handover`: source/target handover state machine and A3 evaluation
//! - `rach`: contention-free random access on the handover target
//! - `du`: the [`Du`] handle and its lifecycle
//!
//! # Example
//!
//! ```rust,no_run
//! use dusim_common::SimConfig;
//! use dusim_du::{Du, SctpTransport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SimConfig::load("config/config.yml")?;
//! let transport = SctpTransport::new(&config.du.cucp_address, config.du.cucp_port);
//! let du = Du::with_transport(config, transport)?;
//! du.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod du;
pub mod error;
mod f1ap;
pub mod handover;
pub mod rach;
mod router;
pub mod transport;

pub use du::{Du, DuState, UeChannels, UeF1apIds, UE_CHANNEL_CAPACITY};
pub use error::{DuError, TransportError};
pub use handover::{evaluate_a3, A3Candidate, HandoverContext, HandoverRole, HandoverState};
pub use rach::{RachContext, RachState};
pub use router::SRB1;
pub use transport::{ChannelTransport, CuEndpoint, F1Transport, SctpTransport};

#[cfg(test)]
pub(crate) mod test_support {
    use dusim_common::{CellConfig, DuConfig, HandoverConfig, PlmnConfig, SimConfig, UeConfig};

    pub fn test_config() -> SimConfig {
        SimConfig {
            du: DuConfig {
                id: 1,
                name: "du-1".to_string(),
                cucp_address: "127.0.0.1".to_string(),
                cucp_port: 38472,
                local_address: "127.0.0.1".to_string(),
                local_port: 38473,
                plmn: PlmnConfig::new("208", "93"),
                cell: CellConfig {
                    pci: 1,
                    tac: "000001".to_string(),
                },
                handover: HandoverConfig::default(),
            },
            ue: UeConfig {
                msin: "0000000001".to_string(),
                supi: String::new(),
                key: "8baf473f2f8fd09487cccbd7097c6862".to_string(),
                op: String::new(),
                opc: "8e27b6af0e692e750f32667a3b14605d".to_string(),
                amf: "8000".to_string(),
                plmn: PlmnConfig::new("208", "93"),
            },
        }
    }
}
