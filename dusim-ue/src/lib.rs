//! Simulated UE for dusim
//!
//! The UE talks RRC to the DU over a pair of byte channels and runs the NAS
//! procedures end to end with the core:
//!
//! - `auth`: 5G-AKA (Milenage, SQN handling, key derivation to KAMF)
//! - `nas`: 5GMM registration and 5GSM PDU session management
//! - `rrc`: RRC message handling and measurement reporting
//! - `ue`: the [`Ue`] handle, its tasks and the user-facing triggers
//!
//! # Example
//!
//! ```rust,no_run
//! use dusim_common::UeConfig;
//! use dusim_ue::Ue;
//! use tokio::sync::mpsc;
//!
//! # async fn run(config: UeConfig) {
//! let (uplink_tx, _uplink_rx) = mpsc::channel(100);
//! let (_downlink_tx, downlink_rx) = mpsc::channel(100);
//! if let Some(ue) = Ue::create(uplink_tx, downlink_rx, &config).await {
//!     ue.trigger_measurement().await.ok();
//! }
//! # }
//! ```

pub mod auth;
pub mod context;
pub mod error;
pub mod nas;
pub mod rrc;
pub mod ue;

pub use auth::{AuthContext, AuthOutcome, Sqn};
pub use context::{RegistrationState, UeContext};
pub use error::UeError;
pub use nas::sm::{PduSession, PduSessionState, PduSessionTable, SmUplink, DEFAULT_DNN};
pub use rrc::{RrcContext, RrcState};
pub use ue::{Ue, UeEvent};
