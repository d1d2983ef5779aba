//! F1AP procedures on the DU side (3GPP TS 38.473)
//!
//! The read loop decodes every inbound PDU and dispatches it; a PDU that
//! fails to decode or to handle is logged and dropped without affecting the
//! next one.

use std::sync::Arc;

use bytes::Bytes;
use dusim_common::{log_f1ap_message, Direction};
use dusim_f1ap::{
    Cause, DuToCuRrcInformation, F1SetupRequest, F1apMessage, ServedCellInformation,
    UeContextModificationConfirm, UeContextModificationRefuse, UeContextModificationRequest,
    UeContextModificationRequired, UeContextModificationResponse, UeContextReleaseCommand,
    UeContextReleaseComplete, UeContextSetupFailure, UeContextSetupRequest,
    UeContextSetupResponse,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::du::{lock, read, write, DuShared, DuState};
use crate::error::Result;
use crate::handover::{A3Candidate, HandoverRole, HandoverState};

/// Latest RRC version advertised in F1 Setup (3 bits)
const LATEST_RRC_VERSION: u8 = 0x06;

/// Inbound PDU loop. Ends when the transport closes.
pub(crate) async fn run_reader(shared: Arc<DuShared>, mut inbound: mpsc::Receiver<Bytes>) {
    info!("F1AP read loop started");
    while let Some(pdu) = inbound.recv().await {
        shared.handle_f1ap_pdu(&pdu).await;
    }
    if shared.state() == DuState::Active {
        error!("Connection closed by CU-CP");
        shared.set_state(DuState::Lost);
    }
    info!("F1AP read loop stopped");
}

pub(crate) fn f1_setup_request(shared: &DuShared) -> F1apMessage {
    let du = &shared.config.du;
    let plmn = shared.nr_cgi.plmn;
    // Validated at construction
    let tac = du.cell.tac_bytes().unwrap_or([0, 0, 1]);
    F1apMessage::F1SetupRequest(F1SetupRequest {
        transaction_id: 0,
        gnb_du_id: du.id,
        gnb_du_name: Some(du.name.clone()),
        served_cells: vec![ServedCellInformation {
            nr_cgi: shared.nr_cgi,
            nr_pci: du.cell.pci,
            five_gs_tac: tac,
            served_plmns: vec![plmn],
        }],
        rrc_version: LATEST_RRC_VERSION,
    })
}

fn empty_cell_group() -> DuToCuRrcInformation {
    DuToCuRrcInformation::new(Vec::new())
}

impl DuShared {
    pub(crate) async fn handle_f1ap_pdu(self: &Arc<Self>, pdu: &[u8]) {
        let msg = match F1apMessage::decode(pdu) {
            Ok(msg) => msg,
            Err(e) => {
                error!("Failed to decode F1AP PDU ({} bytes): {}", pdu.len(), e);
                return;
            }
        };
        log_f1ap_message(Direction::Rx, msg.name(), pdu);

        let result = match msg {
            F1apMessage::F1SetupResponse(rsp) => {
                info!(
                    "F1 Setup Response received (transaction {}, CU {:?}, {} cell(s) to activate)",
                    rsp.transaction_id,
                    rsp.gnb_cu_name,
                    rsp.cells_to_be_activated.len()
                );
                self.on_f1_setup_response();
                Ok(())
            }
            F1apMessage::F1SetupFailure(failure) => {
                error!("F1 Setup Failure: cause {}", failure.cause);
                self.set_state(DuState::Inactive);
                Ok(())
            }
            F1apMessage::DlRrcMessageTransfer(transfer) => {
                self.learn_cu_ue_f1ap_id(transfer.gnb_cu_ue_f1ap_id);
                info!(
                    "DL RRC Message Transfer on SRB{} ({} bytes)",
                    transfer.srb_id,
                    transfer.rrc_container.len()
                );
                self.forward_to_ue(Bytes::from(transfer.rrc_container)).await
            }
            F1apMessage::UeContextSetupRequest(req) => self.handle_ue_context_setup_request(req).await,
            F1apMessage::UeContextSetupResponse(rsp) => {
                info!(
                    "UE Context Setup Response: CU-UE-ID={}, DU-UE-ID={}",
                    rsp.gnb_cu_ue_f1ap_id, rsp.gnb_du_ue_f1ap_id
                );
                Ok(())
            }
            F1apMessage::UeContextModificationRequest(req) => {
                self.handle_ue_context_modification_request(req).await
            }
            F1apMessage::UeContextModificationConfirm(confirm) => {
                self.handle_ue_context_modification_confirm(confirm).await
            }
            F1apMessage::UeContextModificationRefuse(refuse) => {
                self.handle_ue_context_modification_refuse(refuse);
                Ok(())
            }
            F1apMessage::UeContextReleaseCommand(cmd) => {
                self.handle_ue_context_release_command(cmd).await
            }
            F1apMessage::UeContextSetupFailure(failure) => {
                warn!("Received UE Context Setup Failure: cause {}", failure.cause);
                Ok(())
            }
            other => {
                warn!("Unexpected F1AP message from CU-CP: {}", other.name());
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Failed to handle F1AP message: {}", e);
        }
    }

    async fn handle_ue_context_setup_request(
        self: &Arc<Self>,
        req: UeContextSetupRequest,
    ) -> Result<()> {
        let armed = {
            let ho = read(&self.handover);
            ho.state == HandoverState::Preparation && ho.role != HandoverRole::Source
        };
        if req.is_handover() || armed {
            return self.handle_target_handover_setup(req).await;
        }

        info!(
            "UE Context Setup Request: CU-UE-ID={}, DU-UE-ID={:?}",
            req.gnb_cu_ue_f1ap_id, req.gnb_du_ue_f1ap_id
        );
        self.learn_cu_ue_f1ap_id(req.gnb_cu_ue_f1ap_id);
        let ids = {
            let mut ids = lock(&self.ids);
            if let Some(du_id) = req.gnb_du_ue_f1ap_id {
                ids.gnb_du_ue_f1ap_id = du_id;
            }
            *ids
        };

        if let Some(container) = req.rrc_container {
            info!("UE Context Setup Request carries an RRC container, forwarding to UE");
            if let Err(e) = self.forward_to_ue(Bytes::from(container)).await {
                error!("Cannot forward RRC container: {}", e);
            }
        }

        info!("Sending UE Context Setup Response");
        self.send_f1ap(F1apMessage::UeContextSetupResponse(UeContextSetupResponse {
            gnb_cu_ue_f1ap_id: req.gnb_cu_ue_f1ap_id,
            gnb_du_ue_f1ap_id: ids.gnb_du_ue_f1ap_id,
            du_to_cu_rrc_information: empty_cell_group(),
            c_rnti: Some(ids.c_rnti),
            requested_target_cell_global_id: Some(self.nr_cgi),
        }))
        .await
    }

    async fn handle_target_handover_setup(
        self: &Arc<Self>,
        req: UeContextSetupRequest,
    ) -> Result<()> {
        info!(
            "[TARGET DU] UE Context Setup Request (handover): CU-UE-ID={}",
            req.gnb_cu_ue_f1ap_id
        );
        let du_ue_id = {
            let mut ids = lock(&self.ids);
            if let Some(du_id) = req.gnb_du_ue_f1ap_id {
                ids.gnb_du_ue_f1ap_id = du_id;
            }
            ids.gnb_cu_ue_f1ap_id = Some(req.gnb_cu_ue_f1ap_id);
            ids.gnb_du_ue_f1ap_id
        };

        info!("[TARGET DU] Allocating C-RNTI and RACH resources");
        let Some(c_rnti) = self.allocate_c_rnti() else {
            error!("[TARGET DU] No C-RNTI available, rejecting handover");
            write(&self.handover).set_target_state(HandoverState::Failed);
            return self
                .send_f1ap(F1apMessage::UeContextSetupFailure(UeContextSetupFailure {
                    gnb_cu_ue_f1ap_id: req.gnb_cu_ue_f1ap_id,
                    gnb_du_ue_f1ap_id: Some(du_ue_id),
                    cause: Cause::MISC_NOT_ENOUGH_RESOURCES,
                }))
                .await;
        };

        {
            let mut ho = write(&self.handover);
            if ho.state != HandoverState::Preparation || !ho.is_target() {
                ho.set_target_state(HandoverState::Preparation);
            }
            ho.gnb_cu_ue_f1ap_id = Some(req.gnb_cu_ue_f1ap_id);
            ho.gnb_du_ue_f1ap_id = Some(du_ue_id);
            ho.new_c_rnti = Some(c_rnti);
        }

        if self.ensure_ue_link(true) {
            info!("[TARGET DU] UE context created for incoming handover");
        }
        if let Err(e) = self.start_rach_monitoring() {
            self.fail_target_handover();
            return Err(e);
        }

        info!("[TARGET DU] Sending UE Context Setup Response (new C-RNTI {})", c_rnti);
        let sent = self
            .send_f1ap(F1apMessage::UeContextSetupResponse(UeContextSetupResponse {
                gnb_cu_ue_f1ap_id: req.gnb_cu_ue_f1ap_id,
                gnb_du_ue_f1ap_id: du_ue_id,
                du_to_cu_rrc_information: empty_cell_group(),
                c_rnti: Some(c_rnti),
                requested_target_cell_global_id: Some(self.nr_cgi),
            }))
            .await;
        if sent.is_err() {
            error!("[TARGET DU] UE Context Setup Response not sent, handover failed");
            self.fail_target_handover();
        }
        sent
    }

    fn fail_target_handover(&self) {
        let mut ho = write(&self.handover);
        if ho.is_target() {
            ho.set_target_state(HandoverState::Failed);
        }
    }

    async fn handle_ue_context_modification_request(
        &self,
        req: UeContextModificationRequest,
    ) -> Result<()> {
        info!(
            "UE Context Modification Request: CU-UE-ID={}, DU-UE-ID={}",
            req.gnb_cu_ue_f1ap_id, req.gnb_du_ue_f1ap_id
        );
        self.learn_cu_ue_f1ap_id(req.gnb_cu_ue_f1ap_id);
        if let Some(container) = req.rrc_container {
            if let Err(e) = self.forward_to_ue(Bytes::from(container)).await {
                error!("Cannot forward RRC container: {}", e);
            }
        }
        self.send_f1ap(F1apMessage::UeContextModificationResponse(
            UeContextModificationResponse {
                gnb_cu_ue_f1ap_id: req.gnb_cu_ue_f1ap_id,
                gnb_du_ue_f1ap_id: req.gnb_du_ue_f1ap_id,
                du_to_cu_rrc_information: Some(empty_cell_group()),
            },
        ))
        .await
    }

    /// Handover command from the CU: the source enters EXECUTION and the
    /// UE gets the RRC Reconfiguration.
    async fn handle_ue_context_modification_confirm(
        &self,
        confirm: UeContextModificationConfirm,
    ) -> Result<()> {
        info!(
            "[SOURCE DU] UE Context Modification Confirm: CU-UE-ID={}, DU-UE-ID={}",
            confirm.gnb_cu_ue_f1ap_id, confirm.gnb_du_ue_f1ap_id
        );
        {
            let mut ho = write(&self.handover);
            if ho.is_source() && ho.state == HandoverState::Preparation {
                ho.set_source_state(HandoverState::Execution);
            } else {
                warn!(
                    "[SOURCE DU] Modification Confirm in role {} state {}",
                    ho.role, ho.state
                );
            }
        }

        match confirm.rrc_container {
            Some(container) => {
                info!("[SOURCE DU] Forwarding handover command to UE");
                let forwarded = self.forward_to_ue(Bytes::from(container)).await;
                if forwarded.is_err() {
                    error!("[SOURCE DU] Handover command not delivered, handover failed");
                    let mut ho = write(&self.handover);
                    if ho.is_source() {
                        ho.set_source_state(HandoverState::Failed);
                    }
                }
                forwarded
            }
            None => {
                warn!("[SOURCE DU] Modification Confirm without RRC container");
                Ok(())
            }
        }
    }

    fn handle_ue_context_modification_refuse(&self, refuse: UeContextModificationRefuse) {
        warn!("UE Context Modification Refuse: cause {}", refuse.cause);
        let mut ho = write(&self.handover);
        if ho.is_source() && ho.state == HandoverState::Preparation {
            ho.set_source_state(HandoverState::Failed);
        }
    }

    async fn handle_ue_context_release_command(&self, cmd: UeContextReleaseCommand) -> Result<()> {
        info!(
            "UE Context Release Command: CU-UE-ID={}, DU-UE-ID={}, cause {}",
            cmd.gnb_cu_ue_f1ap_id, cmd.gnb_du_ue_f1ap_id, cmd.cause
        );
        if let Some(container) = cmd.rrc_container {
            if let Err(e) = self.forward_to_ue(Bytes::from(container)).await {
                error!("Cannot forward RRC container: {}", e);
            }
        }
        self.reset_handover();
        self.send_f1ap(F1apMessage::UeContextReleaseComplete(UeContextReleaseComplete {
            gnb_cu_ue_f1ap_id: cmd.gnb_cu_ue_f1ap_id,
            gnb_du_ue_f1ap_id: cmd.gnb_du_ue_f1ap_id,
        }))
        .await
    }

    /// Source side of an A3-triggered handover: PREPARATION and a UE Context
    /// Modification Required naming the target cell.
    pub(crate) async fn trigger_handover(self: &Arc<Self>, candidate: A3Candidate) {
        let ids = self.ids();
        let epoch = {
            let mut ho = write(&self.handover);
            if !ho.is_idle() {
                return;
            }
            info!(
                "[SOURCE DU] A3 event: neighbor PCI {} at {} dBm vs serving {} dBm",
                candidate.pci, candidate.neighbor_rsrp_dbm, candidate.serving_rsrp_dbm
            );
            ho.set_source_state(HandoverState::Preparation);
            ho.target_cell_pci = Some(candidate.pci);
            ho.gnb_cu_ue_f1ap_id = ids.gnb_cu_ue_f1ap_id;
            ho.gnb_du_ue_f1ap_id = Some(ids.gnb_du_ue_f1ap_id);
            ho.arm()
        };
        self.arm_handover_timer(epoch);

        let required = F1apMessage::UeContextModificationRequired(UeContextModificationRequired {
            gnb_cu_ue_f1ap_id: ids.gnb_cu_ue_f1ap_id.unwrap_or_default(),
            gnb_du_ue_f1ap_id: ids.gnb_du_ue_f1ap_id,
            target_cell_pci: candidate.pci,
            du_to_cu_rrc_information: None,
            cause: Cause::RADIO_NETWORK_UNSPECIFIED,
        });
        info!(
            "[SOURCE DU] Sending UE Context Modification Required (target PCI {})",
            candidate.pci
        );
        if let Err(e) = self.send_f1ap(required).await {
            error!("[SOURCE DU] Handover request failed: {}", e);
            let mut ho = write(&self.handover);
            if ho.is_source() && ho.state == HandoverState::Preparation {
                ho.set_source_state(HandoverState::Failed);
            }
        }
    }
}
