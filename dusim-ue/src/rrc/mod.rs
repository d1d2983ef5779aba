//! RRC layer of the UE (TS 38.331)
//!
//! Downlink PDUs arrive from the DU as DL-CCCH, DL-DCCH or a MAC Random
//! Access Response. NAS carried in DL Information Transfer or RRC
//! Reconfiguration is handed to the NAS layer.

pub mod measurement;
pub mod state;

pub use state::{RrcContext, RrcState};

use dusim_common::{log_rrc_message, Direction};
use dusim_nas::NasMessage;
use dusim_rrc::{
    channel_of, DlCcchMessage, DlDcchMessage, LogicalChannel, RandomAccessResponse,
    RrcReconfiguration, UlDcchMessage,
};
use tracing::{debug, error, info, warn};

use crate::nas::Outbox;
use crate::ue::{lock, UeShared};

/// Queues an RRC answer. Downlink handling carries on if it cannot be
/// encoded.
fn reply(out: &mut Outbox, msg: UlDcchMessage) {
    let name = msg.name();
    if let Err(e) = out.rrc(msg) {
        error!("Cannot send {}: {}", name, e);
    }
}

impl UeShared {
    /// Handles one downlink PDU from the DU.
    pub(crate) fn handle_downlink(&self, pdu: &[u8], out: &mut Outbox) {
        match channel_of(pdu) {
            Ok(LogicalChannel::DlDcch) => match DlDcchMessage::decode(pdu) {
                Ok(msg) => {
                    log_rrc_message(Direction::Rx, msg.name(), pdu);
                    self.handle_dl_dcch(msg, out);
                }
                Err(e) => error!("Failed to decode DL-DCCH message: {}", e),
            },
            Ok(LogicalChannel::DlCcch) => match DlCcchMessage::decode(pdu) {
                Ok(DlCcchMessage::RrcSetup(_)) => {
                    warn!("RRC Setup received while connected, ignored");
                }
                Ok(DlCcchMessage::RrcReject { wait_time }) => {
                    warn!("RRC Reject received, wait time {}s", wait_time);
                }
                Err(e) => error!("Failed to decode DL-CCCH message: {}", e),
            },
            Ok(channel) => warn!("Unexpected downlink PDU on {:?}", channel),
            Err(_) => match RandomAccessResponse::decode(pdu) {
                Ok(rar) => {
                    info!(
                        "Received Msg2 (RAR): temporary C-RNTI {}, TA {}",
                        rar.temporary_c_rnti, rar.timing_advance
                    );
                    lock(&self.rrc).c_rnti = Some(rar.temporary_c_rnti);
                }
                Err(e) => error!("Unrecognised downlink PDU ({} bytes): {}", pdu.len(), e),
            },
        }
    }

    fn handle_dl_dcch(&self, msg: DlDcchMessage, out: &mut Outbox) {
        match msg {
            DlDcchMessage::DlInformationTransfer {
                dedicated_nas_message,
            } => self.handle_nas_pdu(&dedicated_nas_message, out),
            DlDcchMessage::RrcReconfiguration(reconfig) => self.handle_reconfiguration(reconfig, out),
            DlDcchMessage::RrcRelease { transaction_id } => {
                info!("RRC Release received (transaction {})", transaction_id);
                lock(&self.rrc).set_state(RrcState::Idle);
            }
            DlDcchMessage::SecurityModeCommand {
                transaction_id,
                ciphering_algorithm,
                integrity_algorithm,
            } => {
                info!(
                    "AS Security Mode Command: NEA{} / NIA{}",
                    ciphering_algorithm, integrity_algorithm
                );
                reply(out, UlDcchMessage::SecurityModeComplete { transaction_id });
            }
        }
    }

    fn handle_reconfiguration(&self, reconfig: RrcReconfiguration, out: &mut Outbox) {
        let cell_group = match reconfig.cell_group() {
            Ok(cell_group) => cell_group,
            Err(e) => {
                error!("Invalid CellGroupConfig in RRC Reconfiguration: {}", e);
                return;
            }
        };

        if let Some(sync) = cell_group
            .as_ref()
            .and_then(|cg| cg.reconfiguration_with_sync())
        {
            info!(
                "Handover command: target PCI {}, new C-RNTI {}, T304 {}ms",
                sync.target_pci, sync.new_ue_identity, sync.t304_ms
            );
            info!("Sending Msg1 (contention-free preamble) to PCI {}", sync.target_pci);
            info!("Msg2 (RAR) expected from target cell");
            {
                let mut rrc = lock(&self.rrc);
                rrc.c_rnti = Some(sync.new_ue_identity);
                rrc.serving_pci = Some(sync.target_pci);
            }
            reply(
                out,
                UlDcchMessage::RrcReconfigurationComplete {
                    transaction_id: reconfig.transaction_id,
                },
            );
            return;
        }

        for nas in &reconfig.dedicated_nas_message_list {
            self.handle_nas_pdu(nas, out);
        }
        reply(
            out,
            UlDcchMessage::RrcReconfigurationComplete {
                transaction_id: reconfig.transaction_id,
            },
        );
    }

    /// Runs a downlink NAS PDU through 5GMM and, for DL NAS Transport,
    /// 5GSM.
    pub(crate) fn handle_nas_pdu(&self, pdu: &[u8], out: &mut Outbox) {
        let sm = {
            let mut context = lock(&self.context);
            match context.decode_downlink(pdu) {
                Ok(NasMessage::Mm(mm)) => context.handle_mm(mm, out),
                Ok(NasMessage::Sm(sm)) => {
                    warn!("5GSM message {:?} outside DL NAS Transport", sm.message_type());
                    None
                }
                Err(e) => {
                    error!("Discarding downlink NAS PDU: {}", e);
                    None
                }
            }
        };

        let Some(sm) = sm else {
            return;
        };
        debug!("5GSM {:?} for PDU session {}", sm.message_type(), sm.pdu_session_id);
        let reply = lock(&self.sessions).handle_sm(sm);
        if let Some(reply) = reply {
            if let Err(e) = lock(&self.context).send_sm(reply, out) {
                error!("Failed to send 5GSM reply: {}", e);
            }
        }
    }
}
