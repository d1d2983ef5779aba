//! F1AP (F1 Application Protocol) library
//!
//! The subset of TS 38.473 the simulated DU needs toward a CU-CP: F1 Setup,
//! RRC message transfer, and the UE context setup, modification and release
//! procedures. PDUs use a compact binary layout rather than ASN.1 APER.
//!
//! # Example
//!
//! ```rust
//! use dusim_f1ap::{F1apMessage, UeContextReleaseComplete};
//!
//! let msg = F1apMessage::UeContextReleaseComplete(UeContextReleaseComplete {
//!     gnb_cu_ue_f1ap_id: 1,
//!     gnb_du_ue_f1ap_id: 0,
//! });
//! let bytes = msg.encode()?;
//! assert_eq!(F1apMessage::decode(&bytes)?, msg);
//! # Ok::<(), dusim_f1ap::F1apCodecError>(())
//! ```

pub mod codec;
pub mod ies;
pub mod messages;

pub use codec::{procedure_code, F1apCodecError, PduType, F1AP_PPID};
pub use ies::{Cause, CuToDuRrcInformation, DuToCuRrcInformation, ServedCellInformation};
pub use messages::*;
