//! Uplink RRC routing
//!
//! Every PDU from the UE is peeked at before it goes to the CU: measurement
//! reports feed the A3 check and RRC Reconfiguration Complete closes a
//! handover. The first PDU of a link opens the UE's F1 context with Initial
//! UL RRC Message Transfer; the rest ride UL RRC Message Transfer on SRB1.

use std::sync::Arc;

use bytes::Bytes;
use dusim_common::{log_rrc_message, Direction};
use dusim_f1ap::{F1apMessage, InitialUlRrcMessageTransfer, RrcMessageTransfer};
use dusim_rrc::{channel_of, CellGroupConfig, LogicalChannel, MeasurementReport, UlDcchMessage};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::du::DuShared;
use crate::handover::evaluate_a3;

pub const SRB1: u8 = 1;

pub(crate) async fn run_uplink(shared: Arc<DuShared>, mut uplink: mpsc::Receiver<Bytes>) {
    debug!("UE uplink router started");
    while let Some(pdu) = uplink.recv().await {
        shared.route_uplink(pdu).await;
    }
    warn!("UE uplink channel closed");
}

impl DuShared {
    async fn route_uplink(self: &Arc<Self>, pdu: Bytes) {
        self.inspect_uplink(&pdu).await;

        let ids = self.ids();
        if self.take_initial() {
            info!(
                "Sending Initial UL RRC Message Transfer (DU-UE-ID {}, C-RNTI {})",
                ids.gnb_du_ue_f1ap_id, ids.c_rnti
            );
            let msg = F1apMessage::InitialUlRrcMessageTransfer(InitialUlRrcMessageTransfer {
                gnb_du_ue_f1ap_id: ids.gnb_du_ue_f1ap_id,
                nr_cgi: self.nr_cgi,
                c_rnti: ids.c_rnti,
                rrc_container: pdu.to_vec(),
                du_to_cu_rrc_container: Some(CellGroupConfig::master().encode().to_vec()),
            });
            if let Err(e) = self.send_f1ap(msg).await {
                error!("Failed to send Initial UL RRC Message Transfer: {}", e);
            }
            return;
        }

        let cu_id = ids.gnb_cu_ue_f1ap_id.unwrap_or_else(|| {
            warn!("gNB-CU UE F1AP ID not known yet, using 0");
            0
        });
        self.send_ul_transfer(cu_id, ids.gnb_du_ue_f1ap_id, pdu).await;
    }

    async fn send_ul_transfer(&self, cu_id: u32, du_id: u32, pdu: Bytes) {
        debug!("Sending UL RRC Message Transfer ({} bytes)", pdu.len());
        let msg = F1apMessage::UlRrcMessageTransfer(RrcMessageTransfer {
            gnb_cu_ue_f1ap_id: cu_id,
            gnb_du_ue_f1ap_id: du_id,
            srb_id: SRB1,
            rrc_container: pdu.to_vec(),
        });
        if let Err(e) = self.send_f1ap(msg).await {
            error!("Failed to send UL RRC Message Transfer: {}", e);
        }
    }

    /// Peeks at UL-DCCH PDUs. Anything that does not decode is forwarded
    /// without comment.
    async fn inspect_uplink(self: &Arc<Self>, pdu: &[u8]) {
        if !matches!(channel_of(pdu), Ok(LogicalChannel::UlDcch)) {
            return;
        }
        let Ok(msg) = UlDcchMessage::decode(pdu) else {
            return;
        };
        log_rrc_message(Direction::Rx, msg.name(), pdu);
        match msg {
            UlDcchMessage::MeasurementReport(report) => self.handle_measurement_report(&report).await,
            UlDcchMessage::RrcReconfigurationComplete { transaction_id } => {
                debug!("RRC Reconfiguration Complete (transaction {})", transaction_id);
                self.handle_rrc_reconfiguration_complete();
            }
            _ => {}
        }
    }

    async fn handle_measurement_report(self: &Arc<Self>, report: &MeasurementReport) {
        info!(
            "Measurement Report (measId {}): serving {:?} dBm, {} neighbor(s)",
            report.meas_id,
            report.serving_rsrp_dbm(),
            report.neighbor_cells.len()
        );
        let offset = self.config.du.handover.a3_offset_db;
        if let Some(candidate) = evaluate_a3(report, offset) {
            self.trigger_handover(candidate).await;
        }
    }
}
