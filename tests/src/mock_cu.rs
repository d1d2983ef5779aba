//! Mock gNB-CU with an embedded AMF for integration testing
//!
//! Sits on the CU end of a [`ChannelTransport`](dusim_du::ChannelTransport)
//! and answers the DU the way a CU-CP and core would for one UE:
//!
//! - F1 Setup, then RRC Setup for the UE's RRC Setup Request;
//! - 5G-AKA with a real Milenage vector for the provisioned subscriber;
//! - NAS Security Mode Command (NEA2/NIA2), Registration Accept;
//! - PDU session establishment, modification and release;
//! - handover: UE Context Modification Required is confirmed with an RRC
//!   Reconfiguration carrying reconfigurationWithSync.
//!
//! Everything the mock observes is recorded as a [`MockCuEvent`].

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use dusim_common::{NrCgi, Plmn, SNssai, UeConfig, UeOpKey};
use dusim_crypto::{kdf, Milenage};
use dusim_du::CuEndpoint;
use dusim_f1ap::{
    Cause, CuToDuRrcInformation, F1SetupResponse, F1apCodecError, F1apMessage,
    RrcMessageTransfer, UeContextModificationConfirm, UeContextModificationRefuse,
    UeContextModificationRequired, UeContextReleaseCommand, UeContextSetupRequest,
};
use dusim_nas::cause;
use dusim_nas::ies::AdditionalSecurityInformation;
use dusim_nas::mm::{
    AuthenticationRequest, DlNasTransport, RegistrationAccept, RegistrationRequest,
    SecurityModeCommand, UlNasTransport,
};
use dusim_nas::sm::{
    PduSessionEstablishmentAccept, PduSessionEstablishmentReject, PduSessionModificationCommand,
    PduSessionReleaseCommand,
};
use dusim_nas::{
    security_header_type, CipheringAlgorithm, CodecError, Dnn, GprsTimer3, Guti,
    IntegrityAlgorithm, MmMessage, MobileIdentity, NasDirection, NasKeySetIdentifier, NasKeys,
    NasMessage, NasSecurityAlgorithms, NasSecurityContext, PayloadContainerType, PduAddress,
    PduSessionType, SecurityError, SecurityHeaderType, SessionAmbr, SmBody, SmMessage,
    UeSecurityCapability,
};
use dusim_rrc::{
    channel_of, CellGroupConfig, DlCcchMessage, DlDcchMessage, LogicalChannel,
    RrcCodecError, RrcReconfiguration, RrcSetup, UlCcchMessage, UlDcchMessage,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::test_fixtures::test_subscriber;
use crate::test_utils::{wait_for_condition, TestResult, DEFAULT_POLL_INTERVAL};

/// SRB carrying CCCH messages
const SRB0: u8 = 0;
const SRB1: u8 = 1;
/// ABBA sent in every Authentication Request
const ABBA: [u8; 2] = [0x00, 0x00];
/// Increment between two authentication vectors (one SEQ step, IND 0)
const SQN_STEP: u64 = 0x20;
/// 5GS registration result: 3GPP access
const REGISTRATION_RESULT_3GPP: u8 = 0x01;

/// Mock CU errors
#[derive(Debug, Error)]
pub enum MockCuError {
    #[error("F1AP codec error: {0}")]
    F1ap(#[from] F1apCodecError),
    #[error("RRC codec error: {0}")]
    Rrc(#[from] RrcCodecError),
    #[error("NAS codec error: {0}")]
    Nas(#[from] CodecError),
    #[error("NAS security error: {0}")]
    Security(#[from] SecurityError),
    #[error("Configuration error: {0}")]
    Config(#[from] dusim_common::Error),
    #[error("DU link closed")]
    ChannelClosed,
    #[error("No served cell known yet")]
    NoServedCell,
}

/// Events recorded by the mock CU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCuEvent {
    F1SetupReceived { gnb_du_id: u64, nr_pci: u16 },
    InitialUlRrcMessage { gnb_du_ue_f1ap_id: u32, c_rnti: u16 },
    AuthenticationRequestSent { sqn: u64 },
    AuthenticationCompleted,
    /// RES* from the UE did not match the vector
    AuthenticationRejected,
    AuthenticationFailure { cause: u8 },
    SecurityModeCommandSent { ng_ksi: u8 },
    SecurityModeCompleted { retransmitted_request: bool },
    SecurityModeRejected { cause: u8 },
    RegistrationCompleted { supi: String },
    PduSessionEstablished { psi: u8, dnn: String },
    PduSessionRejected { psi: u8, cause: u8 },
    PduSessionModified { psi: u8 },
    PduSessionReleased { psi: u8 },
    MeasurementReport,
    HandoverRequired { target_pci: u16 },
    RrcReconfigurationComplete { transaction_id: u8 },
    UeContextSetupResponse { c_rnti: Option<u16> },
    UeContextSetupFailure { cause: Cause },
    UeContextModificationResponse,
    UeContextReleaseComplete,
}

/// How the mock answers UE Context Modification Required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverResponse {
    /// Confirm with a handover command for the given C-RNTI
    Confirm { new_c_rnti: u16 },
    Refuse,
    /// Never answer, letting the DU's supervision window run out
    Ignore,
}

/// Mock CU configuration
#[derive(Debug, Clone)]
pub struct MockCuConfig {
    pub cu_name: String,
    pub gnb_cu_ue_f1ap_id: u32,
    /// Subscriber the embedded AMF authenticates
    pub subscriber: UeConfig,
    /// Answer F1 Setup Request with a response (false: failure)
    pub accept_f1_setup: bool,
    /// ngKSI put in the Security Mode Command instead of the one used in
    /// authentication
    pub smc_ng_ksi: Option<NasKeySetIdentifier>,
    /// DNNs whose establishment is rejected
    pub rejected_dnns: Vec<String>,
    pub handover: HandoverResponse,
}

impl Default for MockCuConfig {
    fn default() -> Self {
        Self {
            cu_name: "mock-cu".to_string(),
            gnb_cu_ue_f1ap_id: 100,
            subscriber: test_subscriber(),
            accept_f1_setup: true,
            smc_ng_ksi: None,
            rejected_dnns: Vec::new(),
            handover: HandoverResponse::Confirm { new_c_rnti: 2 },
        }
    }
}

/// Vector of the authentication in progress
struct PendingAuth {
    res_star: [u8; 16],
    kamf: [u8; 32],
}

/// Mock CU state
struct MockCuState {
    gnb_du_ue_f1ap_id: Option<u32>,
    served_cells: Vec<NrCgi>,
    sqn: u64,
    ng_ksi: NasKeySetIdentifier,
    pending_auth: Option<PendingAuth>,
    ue_security_capability: Option<UeSecurityCapability>,
    nas: NasSecurityContext,
    registered: bool,
    /// Established sessions and their DNN
    sessions: BTreeMap<u8, String>,
    next_ue_address: u8,
    handover: HandoverResponse,
    events: Vec<MockCuEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock CU/AMF for integration testing
pub struct MockCu {
    worker: Arc<CuWorker>,
    task: JoinHandle<()>,
}

impl MockCu {
    /// Starts the mock on the CU end of a channel transport.
    pub fn start(endpoint: CuEndpoint, config: MockCuConfig) -> Self {
        let CuEndpoint { from_du, to_du } = endpoint;
        let worker = Arc::new(CuWorker {
            state: Mutex::new(MockCuState {
                gnb_du_ue_f1ap_id: None,
                served_cells: Vec::new(),
                sqn: 0,
                ng_ksi: NasKeySetIdentifier::new(false, 1),
                pending_auth: None,
                ue_security_capability: None,
                nas: NasSecurityContext::new(),
                registered: false,
                sessions: BTreeMap::new(),
                next_ue_address: 2,
                handover: config.handover,
                events: Vec::new(),
            }),
            config,
            to_du,
        });
        let task = tokio::spawn(worker.clone().run(from_du));
        Self { worker, task }
    }

    pub fn with_defaults(endpoint: CuEndpoint) -> Self {
        Self::start(endpoint, MockCuConfig::default())
    }

    /// Every event recorded so far, oldest first.
    pub fn events(&self) -> Vec<MockCuEvent> {
        lock(&self.worker.state).events.clone()
    }

    /// Waits until an event matching `predicate` has been recorded.
    pub async fn wait_for_event<F>(&self, predicate: F, timeout: Duration) -> TestResult<MockCuEvent>
    where
        F: Fn(&MockCuEvent) -> bool,
    {
        let find = || lock(&self.worker.state).events.iter().find(|e| predicate(e)).cloned();
        wait_for_condition(
            || {
                let found = find().is_some();
                async move { found }
            },
            timeout,
            DEFAULT_POLL_INTERVAL,
        )
        .await?;
        find().ok_or_else(|| "event vanished".into())
    }

    pub fn is_registered(&self) -> bool {
        lock(&self.worker.state).registered
    }

    /// Ids of the sessions the core considers established.
    pub fn sessions(&self) -> Vec<u8> {
        lock(&self.worker.state).sessions.keys().copied().collect()
    }

    pub fn set_handover_response(&self, response: HandoverResponse) {
        lock(&self.worker.state).handover = response;
    }

    /// Sends UE Context Setup Request for the served cell; with `handover`
    /// it carries HandoverPreparationInformation.
    pub async fn send_ue_context_setup_request(&self, handover: bool) -> Result<(), MockCuError> {
        let (du_id, sp_cell_id) = {
            let state = lock(&self.worker.state);
            let cell = state.served_cells.first().copied().ok_or(MockCuError::NoServedCell)?;
            (state.gnb_du_ue_f1ap_id, cell)
        };
        let cu_to_du = handover.then(|| CuToDuRrcInformation {
            cg_config_info: None,
            handover_preparation_information: Some(vec![0x00]),
        });
        self.worker
            .send(F1apMessage::UeContextSetupRequest(UeContextSetupRequest {
                gnb_cu_ue_f1ap_id: self.worker.config.gnb_cu_ue_f1ap_id,
                gnb_du_ue_f1ap_id: du_id,
                sp_cell_id,
                serv_cell_index: 0,
                cu_to_du_rrc_information: cu_to_du,
                rrc_container: None,
            }))
            .await
    }

    /// Sends UE Context Release Command, optionally with RRC Release.
    pub async fn send_ue_context_release(&self, rrc_release: bool) -> Result<(), MockCuError> {
        let du_id = lock(&self.worker.state).gnb_du_ue_f1ap_id.unwrap_or(0);
        let container = if rrc_release {
            Some(
                DlDcchMessage::RrcRelease { transaction_id: 0 }
                    .encode()?
                    .to_vec(),
            )
        } else {
            None
        };
        self.worker
            .send(F1apMessage::UeContextReleaseCommand(UeContextReleaseCommand {
                gnb_cu_ue_f1ap_id: self.worker.config.gnb_cu_ue_f1ap_id,
                gnb_du_ue_f1ap_id: du_id,
                cause: Cause::RADIO_NETWORK_UNSPECIFIED,
                rrc_container: container,
            }))
            .await
    }

    /// Sends a raw F1AP PDU to the DU.
    pub async fn send_raw(&self, pdu: Bytes) -> Result<(), MockCuError> {
        self.worker
            .to_du
            .send(pdu)
            .await
            .map_err(|_| MockCuError::ChannelClosed)
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for MockCu {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct CuWorker {
    config: MockCuConfig,
    state: Mutex<MockCuState>,
    to_du: mpsc::Sender<Bytes>,
}

impl CuWorker {
    async fn run(self: Arc<Self>, mut from_du: mpsc::Receiver<Bytes>) {
        while let Some(pdu) = from_du.recv().await {
            if let Err(e) = self.handle_f1ap(&pdu).await {
                warn!("Mock CU failed to handle PDU: {}", e);
            }
        }
        debug!("Mock CU: DU link closed");
    }

    fn record(&self, event: MockCuEvent) {
        debug!("Mock CU event: {:?}", event);
        lock(&self.state).events.push(event);
    }

    async fn send(&self, msg: F1apMessage) -> Result<(), MockCuError> {
        self.to_du
            .send(msg.encode()?)
            .await
            .map_err(|_| MockCuError::ChannelClosed)
    }

    fn du_ue_id(&self) -> u32 {
        lock(&self.state).gnb_du_ue_f1ap_id.unwrap_or(0)
    }

    async fn send_rrc(&self, srb_id: u8, container: Bytes) -> Result<(), MockCuError> {
        self.send(F1apMessage::DlRrcMessageTransfer(RrcMessageTransfer {
            gnb_cu_ue_f1ap_id: self.config.gnb_cu_ue_f1ap_id,
            gnb_du_ue_f1ap_id: self.du_ue_id(),
            srb_id,
            rrc_container: container.to_vec(),
        }))
        .await
    }

    async fn send_nas(&self, nas: Vec<u8>) -> Result<(), MockCuError> {
        let rrc = DlDcchMessage::DlInformationTransfer {
            dedicated_nas_message: nas,
        };
        self.send_rrc(SRB1, rrc.encode()?).await
    }

    async fn handle_f1ap(&self, pdu: &[u8]) -> Result<(), MockCuError> {
        let msg = F1apMessage::decode(pdu)?;
        debug!("Mock CU received {}", msg.name());

        match msg {
            F1apMessage::F1SetupRequest(req) => {
                let cells: Vec<NrCgi> = req.served_cells.iter().map(|c| c.nr_cgi).collect();
                let nr_pci = req.served_cells.first().map(|c| c.nr_pci).unwrap_or(0);
                lock(&self.state).served_cells = cells.clone();
                self.record(MockCuEvent::F1SetupReceived {
                    gnb_du_id: req.gnb_du_id,
                    nr_pci,
                });
                let answer = if self.config.accept_f1_setup {
                    F1apMessage::F1SetupResponse(F1SetupResponse {
                        transaction_id: req.transaction_id,
                        gnb_cu_name: Some(self.config.cu_name.clone()),
                        cells_to_be_activated: cells,
                    })
                } else {
                    F1apMessage::F1SetupFailure(dusim_f1ap::F1SetupFailure {
                        transaction_id: req.transaction_id,
                        cause: Cause::Misc(0),
                    })
                };
                self.send(answer).await
            }
            F1apMessage::InitialUlRrcMessageTransfer(initial) => {
                lock(&self.state).gnb_du_ue_f1ap_id = Some(initial.gnb_du_ue_f1ap_id);
                self.record(MockCuEvent::InitialUlRrcMessage {
                    gnb_du_ue_f1ap_id: initial.gnb_du_ue_f1ap_id,
                    c_rnti: initial.c_rnti,
                });
                self.handle_initial_rrc(&initial.rrc_container).await
            }
            F1apMessage::UlRrcMessageTransfer(transfer) => {
                self.handle_ul_dcch(&transfer.rrc_container).await
            }
            F1apMessage::UeContextModificationRequired(required) => {
                self.handle_modification_required(required).await
            }
            F1apMessage::UeContextSetupResponse(rsp) => {
                self.record(MockCuEvent::UeContextSetupResponse { c_rnti: rsp.c_rnti });
                Ok(())
            }
            F1apMessage::UeContextSetupFailure(failure) => {
                self.record(MockCuEvent::UeContextSetupFailure {
                    cause: failure.cause,
                });
                Ok(())
            }
            F1apMessage::UeContextModificationResponse(_) => {
                self.record(MockCuEvent::UeContextModificationResponse);
                Ok(())
            }
            F1apMessage::UeContextReleaseComplete(_) => {
                self.record(MockCuEvent::UeContextReleaseComplete);
                Ok(())
            }
            other => {
                warn!("Mock CU ignoring {}", other.name());
                Ok(())
            }
        }
    }

    async fn handle_initial_rrc(&self, container: &[u8]) -> Result<(), MockCuError> {
        if channel_of(container)? != LogicalChannel::UlCcch {
            warn!("Initial UL RRC message is not UL-CCCH");
            return Ok(());
        }
        let UlCcchMessage::RrcSetupRequest(request) = UlCcchMessage::decode(container)?;
        info!(
            "Mock CU: RRC Setup Request (cause {:?}), answering RRC Setup",
            request.establishment_cause
        );
        let setup = DlCcchMessage::RrcSetup(RrcSetup {
            transaction_id: 0,
            master_cell_group: CellGroupConfig::master().encode().to_vec(),
        });
        self.send_rrc(SRB0, setup.encode()?).await
    }

    async fn handle_ul_dcch(&self, container: &[u8]) -> Result<(), MockCuError> {
        match UlDcchMessage::decode(container)? {
            UlDcchMessage::RrcSetupComplete(complete) => {
                self.handle_nas(&complete.dedicated_nas_message).await
            }
            UlDcchMessage::UlInformationTransfer {
                dedicated_nas_message,
            } => self.handle_nas(&dedicated_nas_message).await,
            UlDcchMessage::MeasurementReport(_) => {
                self.record(MockCuEvent::MeasurementReport);
                Ok(())
            }
            UlDcchMessage::RrcReconfigurationComplete { transaction_id } => {
                self.record(MockCuEvent::RrcReconfigurationComplete { transaction_id });
                Ok(())
            }
            UlDcchMessage::SecurityModeComplete { .. } => Ok(()),
        }
    }

    async fn handle_modification_required(
        &self,
        required: UeContextModificationRequired,
    ) -> Result<(), MockCuError> {
        self.record(MockCuEvent::HandoverRequired {
            target_pci: required.target_cell_pci,
        });
        let response = lock(&self.state).handover;
        match response {
            HandoverResponse::Confirm { new_c_rnti } => {
                let command = DlDcchMessage::RrcReconfiguration(RrcReconfiguration {
                    transaction_id: 1,
                    secondary_cell_group: Some(
                        CellGroupConfig::with_sync(new_c_rnti, required.target_cell_pci)
                            .encode()
                            .to_vec(),
                    ),
                    dedicated_nas_message_list: Vec::new(),
                });
                self.send(F1apMessage::UeContextModificationConfirm(
                    UeContextModificationConfirm {
                        gnb_cu_ue_f1ap_id: required.gnb_cu_ue_f1ap_id,
                        gnb_du_ue_f1ap_id: required.gnb_du_ue_f1ap_id,
                        rrc_container: Some(command.encode()?.to_vec()),
                    },
                ))
                .await
            }
            HandoverResponse::Refuse => {
                self.send(F1apMessage::UeContextModificationRefuse(
                    UeContextModificationRefuse {
                        gnb_cu_ue_f1ap_id: required.gnb_cu_ue_f1ap_id,
                        gnb_du_ue_f1ap_id: required.gnb_du_ue_f1ap_id,
                        cause: Cause::RADIO_NETWORK_UNSPECIFIED,
                    },
                ))
                .await
            }
            HandoverResponse::Ignore => Ok(()),
        }
    }

    /// Decodes an uplink NAS PDU, removing protection when it has any.
    fn decode_uplink_nas(&self, pdu: &[u8]) -> Result<NasMessage, MockCuError> {
        match security_header_type(pdu)? {
            SecurityHeaderType::NotProtected => Ok(NasMessage::decode(pdu)?),
            _ => {
                let plain = lock(&self.state).nas.unprotect(pdu, NasDirection::Uplink)?;
                Ok(NasMessage::decode(&plain)?)
            }
        }
    }

    /// Encodes a downlink 5GMM message, protected unless `header` is
    /// NotProtected.
    fn encode_downlink(
        &self,
        msg: MmMessage,
        header: SecurityHeaderType,
    ) -> Result<Vec<u8>, MockCuError> {
        let plain = NasMessage::Mm(msg).encode()?;
        if header == SecurityHeaderType::NotProtected {
            return Ok(plain);
        }
        Ok(lock(&self.state)
            .nas
            .protect(&plain, header, NasDirection::Downlink)?)
    }

    async fn handle_nas(&self, pdu: &[u8]) -> Result<(), MockCuError> {
        let NasMessage::Mm(msg) = self.decode_uplink_nas(pdu)? else {
            warn!("Mock AMF: 5GSM message outside UL NAS Transport");
            return Ok(());
        };
        debug!("Mock AMF received {:?}", msg.message_type());

        match msg {
            MmMessage::RegistrationRequest(request) => self.start_authentication(request).await,
            MmMessage::AuthenticationResponse(response) => {
                self.handle_authentication_response(response.res_star).await
            }
            MmMessage::AuthenticationFailure(failure) => {
                self.record(MockCuEvent::AuthenticationFailure {
                    cause: failure.cause,
                });
                Ok(())
            }
            MmMessage::SecurityModeComplete(complete) => {
                self.record(MockCuEvent::SecurityModeCompleted {
                    retransmitted_request: complete.nas_message_container.is_some(),
                });
                self.send_registration_accept().await
            }
            MmMessage::SecurityModeReject(reject) => {
                self.record(MockCuEvent::SecurityModeRejected {
                    cause: reject.cause,
                });
                Ok(())
            }
            MmMessage::RegistrationComplete => {
                lock(&self.state).registered = true;
                self.record(MockCuEvent::RegistrationCompleted {
                    supi: self.config.subscriber.supi(),
                });
                Ok(())
            }
            MmMessage::UlNasTransport(transport) => self.handle_ul_nas_transport(transport).await,
            other => {
                warn!("Mock AMF ignoring {:?}", other.message_type());
                Ok(())
            }
        }
    }

    /// Builds the next authentication vector and sends Authentication
    /// Request.
    async fn start_authentication(&self, request: RegistrationRequest) -> Result<(), MockCuError> {
        let subscriber = &self.config.subscriber;
        let key = subscriber.key_bytes()?;
        let milenage = match subscriber.op_key()? {
            UeOpKey::Opc(opc) => Milenage::new(&key, &opc),
            UeOpKey::Op(op) => Milenage::new_with_op(&key, &op),
        };
        let amf = subscriber.amf_bytes()?;
        let plmn: Plmn = subscriber.plmn()?;
        let supi = subscriber.supi();
        let supi_digits = supi.strip_prefix("imsi-").unwrap_or(&supi).to_string();

        let rand: [u8; 16] = rand::random();
        let (sqn, ng_ksi) = {
            let mut state = lock(&self.state);
            state.sqn += SQN_STEP;
            state.ue_security_capability = request.ue_security_capability;
            (state.sqn, state.ng_ksi)
        };
        let sqn_bytes: [u8; 6] = {
            let b = sqn.to_be_bytes();
            [b[2], b[3], b[4], b[5], b[6], b[7]]
        };

        let (res, ak) = milenage.f2_f5(&rand);
        let ck = milenage.f3(&rand);
        let ik = milenage.f4(&rand);
        let (mac_a, _) = milenage.f1(&rand, &sqn_bytes, &amf);
        let mut sqn_xor_ak = [0u8; 6];
        for (i, byte) in sqn_xor_ak.iter_mut().enumerate() {
            *byte = sqn_bytes[i] ^ ak[i];
        }
        let mut autn = [0u8; 16];
        autn[..6].copy_from_slice(&sqn_xor_ak);
        autn[6..8].copy_from_slice(&amf);
        autn[8..].copy_from_slice(&mac_a);

        let snn = kdf::encode_kdf_string(&kdf::serving_network_name(plmn.mcc, plmn.mnc));
        let kausf = kdf::derive_kausf(&ck, &ik, &snn, &sqn_xor_ak);
        let kseaf = kdf::derive_kseaf(&kausf, &snn);
        let kamf = kdf::derive_kamf(&kseaf, supi_digits.as_bytes(), &ABBA);
        let res_star = kdf::derive_res_star(&ck, &ik, &snn, &rand, &res);
        lock(&self.state).pending_auth = Some(PendingAuth { res_star, kamf });

        info!("Mock AMF: Authentication Request for {} (SQN {:#x})", supi, sqn);
        let nas = self.encode_downlink(
            MmMessage::AuthenticationRequest(AuthenticationRequest {
                ng_ksi,
                abba: ABBA.to_vec(),
                rand: Some(rand),
                autn: Some(autn),
            }),
            SecurityHeaderType::NotProtected,
        )?;
        self.record(MockCuEvent::AuthenticationRequestSent { sqn });
        self.send_nas(nas).await
    }

    async fn handle_authentication_response(
        &self,
        res_star: Option<[u8; 16]>,
    ) -> Result<(), MockCuError> {
        let Some(pending) = lock(&self.state).pending_auth.take() else {
            warn!("Mock AMF: Authentication Response without a pending vector");
            return Ok(());
        };
        if res_star != Some(pending.res_star) {
            warn!("Mock AMF: RES* mismatch, rejecting");
            self.record(MockCuEvent::AuthenticationRejected);
            let nas = self.encode_downlink(
                MmMessage::AuthenticationReject,
                SecurityHeaderType::NotProtected,
            )?;
            return self.send_nas(nas).await;
        }
        self.record(MockCuEvent::AuthenticationCompleted);

        let algorithms =
            NasSecurityAlgorithms::new(CipheringAlgorithm::Nea2, IntegrityAlgorithm::Nia2);
        let (auth_ksi, capability) = {
            let mut state = lock(&self.state);
            let keys = NasKeys {
                kamf: Some(pending.kamf),
                ..NasKeys::default()
            };
            state.nas = NasSecurityContext::from_kamf(state.ng_ksi, keys);
            state.nas.activate(algorithms)?;
            (
                state.ng_ksi,
                state.ue_security_capability.unwrap_or_default(),
            )
        };
        let ng_ksi = self.config.smc_ng_ksi.unwrap_or(auth_ksi);

        let nas = self.encode_downlink(
            MmMessage::SecurityModeCommand(SecurityModeCommand {
                selected_algorithms: algorithms,
                ng_ksi,
                replayed_ue_security_capability: capability,
                imeisv_requested: true,
                additional_security_information: Some(AdditionalSecurityInformation {
                    retransmission_requested: true,
                    horizontal_derivation: false,
                }),
            }),
            SecurityHeaderType::IntegrityProtectedWithNewSecurityContext,
        )?;
        self.record(MockCuEvent::SecurityModeCommandSent {
            ng_ksi: ng_ksi.encode(),
        });
        self.send_nas(nas).await
    }

    async fn send_registration_accept(&self) -> Result<(), MockCuError> {
        let plmn = self.config.subscriber.plmn()?;
        let guti = Guti {
            plmn,
            amf_region_id: 0xCA,
            amf_set_id: 0x3F8,
            amf_pointer: 0,
            tmsi: rand::random(),
        };
        let nas = self.encode_downlink(
            MmMessage::RegistrationAccept(RegistrationAccept {
                registration_result: REGISTRATION_RESULT_3GPP,
                guti: Some(MobileIdentity::Guti(guti)),
                t3512: Some(GprsTimer3(0x21)),
            }),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
        )?;
        self.send_nas(nas).await
    }

    async fn handle_ul_nas_transport(&self, transport: UlNasTransport) -> Result<(), MockCuError> {
        if transport.payload_container_type != PayloadContainerType::N1SmInformation {
            warn!("Mock AMF: unsupported payload container");
            return Ok(());
        }
        let NasMessage::Sm(sm) = NasMessage::decode(&transport.payload)? else {
            warn!("Mock AMF: UL NAS Transport without 5GSM payload");
            return Ok(());
        };
        let psi = sm.pdu_session_id;
        let pti = sm.pti;

        let reply = match sm.body {
            SmBody::EstablishmentRequest(_) => {
                let dnn = transport
                    .dnn
                    .map(|d| d.0)
                    .unwrap_or_else(|| "internet".to_string());
                Some(self.establishment_answer(psi, dnn))
            }
            SmBody::ModificationRequest(_) => Some(SmBody::ModificationCommand(
                PduSessionModificationCommand {
                    session_ambr: Some(session_ambr()),
                    ..PduSessionModificationCommand::default()
                },
            )),
            SmBody::ModificationComplete => {
                self.record(MockCuEvent::PduSessionModified { psi });
                None
            }
            SmBody::ReleaseRequest(_) => Some(SmBody::ReleaseCommand(PduSessionReleaseCommand {
                cause: cause::sm::REGULAR_DEACTIVATION,
                back_off_timer: None,
            })),
            SmBody::ReleaseComplete(_) => {
                lock(&self.state).sessions.remove(&psi);
                self.record(MockCuEvent::PduSessionReleased { psi });
                None
            }
            other => {
                warn!("Mock SMF ignoring {:?}", other);
                None
            }
        };

        let Some(body) = reply else {
            return Ok(());
        };
        let payload = NasMessage::Sm(SmMessage::new(psi, pti, body)).encode()?;
        let nas = self.encode_downlink(
            MmMessage::DlNasTransport(DlNasTransport {
                payload_container_type: PayloadContainerType::N1SmInformation,
                payload,
                pdu_session_id: Some(psi),
                cause: None,
                back_off_timer: None,
            }),
            SecurityHeaderType::IntegrityProtectedAndCiphered,
        )?;
        self.send_nas(nas).await
    }

    fn establishment_answer(&self, psi: u8, dnn: String) -> SmBody {
        if self.config.rejected_dnns.iter().any(|d| *d == dnn) {
            let cause = cause::sm::MISSING_OR_UNKNOWN_DNN;
            self.record(MockCuEvent::PduSessionRejected { psi, cause });
            return SmBody::EstablishmentReject(PduSessionEstablishmentReject {
                cause,
                back_off_timer: None,
                allowed_ssc_mode: None,
            });
        }

        let address = {
            let mut state = lock(&self.state);
            let host = state.next_ue_address;
            state.next_ue_address = state.next_ue_address.wrapping_add(1);
            state.sessions.insert(psi, dnn.clone());
            Ipv4Addr::new(10, 45, 0, host)
        };
        self.record(MockCuEvent::PduSessionEstablished {
            psi,
            dnn: dnn.clone(),
        });
        SmBody::EstablishmentAccept(PduSessionEstablishmentAccept {
            pdu_session_type: PduSessionType::Ipv4,
            ssc_mode: 1,
            authorized_qos_rules: vec![0x01, 0x00, 0x06, 0x31, 0x01, 0x01, 0xFF, 0x01, 0x01],
            session_ambr: session_ambr(),
            cause: None,
            pdu_address: Some(PduAddress::Ipv4(address)),
            s_nssai: Some(SNssai::new(1, None)),
            qos_flow_descriptions: None,
            dnn: Some(Dnn::new(dnn)),
        })
    }
}

/// 100 Mbps each way (unit 6: 1 Mbps)
fn session_ambr() -> SessionAmbr {
    SessionAmbr {
        downlink_unit: 0x06,
        downlink: 100,
        uplink_unit: 0x06,
        uplink: 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dusim_du::ChannelTransport;
    use dusim_du::F1Transport;

    #[tokio::test]
    async fn test_answers_f1_setup() {
        let (transport, endpoint) = ChannelTransport::pair();
        let cu = MockCu::with_defaults(endpoint);
        let mut inbound = transport.connect().await.expect("connect");

        let request = F1apMessage::F1SetupRequest(dusim_f1ap::F1SetupRequest {
            transaction_id: 3,
            gnb_du_id: 7,
            gnb_du_name: None,
            served_cells: Vec::new(),
            rrc_version: 6,
        });
        transport
            .send(request.encode().expect("encode"))
            .await
            .expect("send");

        let pdu = inbound.recv().await.expect("response");
        let F1apMessage::F1SetupResponse(rsp) = F1apMessage::decode(&pdu).expect("decode") else {
            panic!("expected F1 Setup Response");
        };
        assert_eq!(rsp.transaction_id, 3);
        assert_eq!(
            cu.events(),
            vec![MockCuEvent::F1SetupReceived {
                gnb_du_id: 7,
                nr_pci: 0
            }]
        );
    }
}
