//! DU lifecycle and shared state
//!
//! A [`Du`] serves one cell and one UE. Its tasks (F1AP read loop, uplink
//! router, handover timers, UE bring-up) share a [`DuShared`] through an
//! `Arc`; every piece of mutable state sits behind its own `std::sync` lock
//! and no lock is held across an `.await`.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bytes::Bytes;
use dusim_common::{log_f1ap_message, Direction, NrCgi, SimConfig};
use dusim_f1ap::F1apMessage;
use dusim_ue::Ue;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{DuError, Result};
use crate::handover::{HandoverContext, HandoverRole, HandoverState};
use crate::rach::{RachContext, RachState};
use crate::transport::F1Transport;

/// Capacity of the DU <-> UE RRC channels.
pub const UE_CHANNEL_CAPACITY: usize = 100;
/// gNB-DU UE F1AP ID of the UE until the CU assigns one.
pub const DEFAULT_DU_UE_F1AP_ID: u32 = 0;
/// C-RNTI of the UE attached at start-up.
pub const DEFAULT_C_RNTI: u16 = 1;
/// Highest C-RNTI outside the reserved range (TS 38.321 Table 7.1-1).
const MAX_C_RNTI: u16 = 0xFFEF;

/// F1 interface state of the DU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DuState {
    #[default]
    Inactive,
    Active,
    /// The F1 link dropped while active
    Lost,
}

impl fmt::Display for DuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuState::Inactive => write!(f, "DU_INACTIVE"),
            DuState::Active => write!(f, "DU_ACTIVE"),
            DuState::Lost => write!(f, "DU_LOST"),
        }
    }
}

/// F1AP identifiers and C-RNTI of the served UE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeF1apIds {
    pub gnb_du_ue_f1ap_id: u32,
    /// Learned from the first CU message about the UE
    pub gnb_cu_ue_f1ap_id: Option<u32>,
    pub c_rnti: u16,
}

impl Default for UeF1apIds {
    fn default() -> Self {
        Self {
            gnb_du_ue_f1ap_id: DEFAULT_DU_UE_F1AP_ID,
            gnb_cu_ue_f1ap_id: None,
            c_rnti: DEFAULT_C_RNTI,
        }
    }
}

/// UE side of the DU <-> UE RRC channels.
#[derive(Debug)]
pub struct UeChannels {
    /// RRC PDUs from the UE to the DU
    pub uplink: mpsc::Sender<Bytes>,
    /// RRC PDUs (and the RAR) from the DU to the UE
    pub downlink: mpsc::Receiver<Bytes>,
}

struct UeLink {
    downlink: mpsc::Sender<Bytes>,
    initial_sent: bool,
    /// UE ends not yet handed to a UE
    parked: Option<UeChannels>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

pub(crate) struct DuShared {
    pub(crate) config: SimConfig,
    pub(crate) nr_cgi: NrCgi,
    transport: Option<Arc<dyn F1Transport>>,
    state: Mutex<DuState>,
    pub(crate) handover: RwLock<HandoverContext>,
    pub(crate) rach: Mutex<Option<RachContext>>,
    pub(crate) ids: Mutex<UeF1apIds>,
    link: Mutex<Option<UeLink>>,
    ue: Mutex<Option<Arc<Ue>>>,
    next_c_rnti: AtomicU16,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DuShared {
    fn new(config: SimConfig, transport: Option<Arc<dyn F1Transport>>) -> Result<Self> {
        config.validate()?;
        let nr_cgi = config.du.nr_cgi()?;
        Ok(Self {
            config,
            nr_cgi,
            transport,
            state: Mutex::new(DuState::Inactive),
            handover: RwLock::new(HandoverContext::new()),
            rach: Mutex::new(None),
            ids: Mutex::new(UeF1apIds::default()),
            link: Mutex::new(None),
            ue: Mutex::new(None),
            next_c_rnti: AtomicU16::new(DEFAULT_C_RNTI + 1),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn state(&self) -> DuState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: DuState) {
        let mut current = lock(&self.state);
        if *current != state {
            info!("DU state transition: {} -> {}", *current, state);
            *current = state;
        }
    }

    /// Spawns a task owned by the DU; aborted on stop or drop.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(task);
                let mut tasks = lock(&self.tasks);
                tasks.retain(|t| !t.is_finished());
                tasks.push(task);
            }
            Err(_) => warn!("No tokio runtime, DU task not started"),
        }
    }

    fn abort_tasks(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }

    pub(crate) fn ids(&self) -> UeF1apIds {
        *lock(&self.ids)
    }

    pub(crate) fn learn_cu_ue_f1ap_id(&self, id: u32) {
        let mut ids = lock(&self.ids);
        if ids.gnb_cu_ue_f1ap_id != Some(id) {
            debug!("gNB-CU UE F1AP ID: {:?} -> {}", ids.gnb_cu_ue_f1ap_id, id);
            ids.gnb_cu_ue_f1ap_id = Some(id);
        }
    }

    /// Encodes and sends one F1AP PDU. Without a transport the send is
    /// skipped and reported as success.
    pub(crate) async fn send_f1ap(&self, msg: F1apMessage) -> Result<()> {
        let pdu = msg.encode()?;
        let Some(transport) = &self.transport else {
            info!("F1 client not available, skipping send of {} (headless)", msg.name());
            return Ok(());
        };
        log_f1ap_message(Direction::Tx, msg.name(), &pdu);
        transport.send(pdu).await?;
        Ok(())
    }

    /// Creates the UE channels and the uplink router if they do not exist
    /// yet. `initial_sent` marks the UE as already known to the CU, so its
    /// first uplink message is not wrapped as Initial UL RRC Message
    /// Transfer; it also applies to an existing link. Returns true when the
    /// channels were created.
    pub(crate) fn ensure_ue_link(self: &Arc<Self>, initial_sent: bool) -> bool {
        let mut link = lock(&self.link);
        if let Some(existing) = link.as_mut() {
            existing.initial_sent |= initial_sent;
            return false;
        }
        let (uplink_tx, uplink_rx) = mpsc::channel(UE_CHANNEL_CAPACITY);
        let (downlink_tx, downlink_rx) = mpsc::channel(UE_CHANNEL_CAPACITY);
        *link = Some(UeLink {
            downlink: downlink_tx,
            initial_sent,
            parked: Some(UeChannels {
                uplink: uplink_tx,
                downlink: downlink_rx,
            }),
        });
        drop(link);

        info!("UE channels created (capacity {})", UE_CHANNEL_CAPACITY);
        self.spawn(crate::router::run_uplink(self.clone(), uplink_rx));
        true
    }

    pub(crate) fn take_ue_channels(&self) -> Option<UeChannels> {
        lock(&self.link).as_mut().and_then(|link| link.parked.take())
    }

    /// True exactly once per link: for the message that opens the UE's
    /// F1 context.
    pub(crate) fn take_initial(&self) -> bool {
        match lock(&self.link).as_mut() {
            Some(link) if !link.initial_sent => {
                link.initial_sent = true;
                true
            }
            _ => false,
        }
    }

    fn downlink(&self) -> Option<mpsc::Sender<Bytes>> {
        lock(&self.link).as_ref().map(|link| link.downlink.clone())
    }

    /// Delivers an RRC container (or RAR) to the UE.
    pub(crate) async fn forward_to_ue(&self, pdu: Bytes) -> Result<()> {
        let downlink = self.downlink().ok_or(DuError::NoUeChannel)?;
        downlink.send(pdu).await.map_err(|_| DuError::NoUeChannel)
    }

    pub(crate) fn allocate_c_rnti(&self) -> Option<u16> {
        let c_rnti = self.next_c_rnti.fetch_add(1, Ordering::Relaxed);
        (c_rnti != 0 && c_rnti <= MAX_C_RNTI).then_some(c_rnti)
    }

    /// Starts the supervision window for the handover epoch `epoch`.
    pub(crate) fn arm_handover_timer(self: &Arc<Self>, epoch: u64) {
        let timeout_ms = self.config.du.handover.timeout_ms;
        if timeout_ms == 0 {
            return;
        }
        let shared = Arc::downgrade(self);
        self.spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if write(&shared.handover).expire(epoch) {
                if let Some(rach) = lock(&shared.rach).take() {
                    warn!(
                        "Discarding RACH context in state {} after {:?}",
                        rach.state,
                        rach.elapsed()
                    );
                }
            }
        });
    }

    pub(crate) fn start_rach_monitoring(self: &Arc<Self>) -> Result<()> {
        let epoch = {
            let mut ho = write(&self.handover);
            if !ho.is_target() {
                return Err(DuError::NotHandoverTarget(ho.role));
            }
            if ho.state != HandoverState::Preparation {
                warn!(
                    "[TARGET DU] Starting RACH monitoring in state {} (expected PREPARATION)",
                    ho.state
                );
            }
            ho.set_target_state(HandoverState::Execution);
            ho.arm()
        };
        info!("[TARGET DU] RACH Window Open, waiting for dedicated preamble");
        self.arm_handover_timer(epoch);
        Ok(())
    }

    pub(crate) async fn simulate_rach_reception(&self) -> Result<()> {
        let temporary_c_rnti = {
            let ho = read(&self.handover);
            if !ho.is_target() {
                return Err(DuError::NotHandoverTarget(ho.role));
            }
            ho.new_c_rnti
        }
        .unwrap_or_else(|| self.ids().c_rnti);

        let rach = RachContext::on_preamble(temporary_c_rnti);
        info!(
            "[TARGET DU] Msg1 received: preamble {}, RA-RNTI {}",
            rach.preamble_id, rach.ra_rnti
        );
        let rar = rach.random_access_response();
        *lock(&self.rach) = Some(rach);

        if let Err(e) = self.forward_to_ue(rar).await {
            warn!("[TARGET DU] Cannot send RAR: {}", e);
            return Ok(());
        }
        if let Some(rach) = lock(&self.rach).as_mut() {
            rach.state = RachState::RarSent;
        }
        info!(
            "[TARGET DU] Msg2 (RAR) sent with temporary C-RNTI {}. Msg1 & Msg2 completed, waiting for Msg3",
            temporary_c_rnti
        );
        Ok(())
    }

    /// RRC Reconfiguration Complete from the UE: Msg3 on the target, the
    /// end of execution on the source.
    pub(crate) fn handle_rrc_reconfiguration_complete(&self) {
        let mut ho = write(&self.handover);
        match (ho.role, ho.state) {
            (HandoverRole::Target, HandoverState::Execution) => {
                info!("[TARGET DU] Msg3 (RRC Reconfiguration Complete) received");
                ho.rach_completed = true;
                ho.set_target_state(HandoverState::Completed);
                drop(ho);
                if let Some(rach) = lock(&self.rach).as_mut() {
                    rach.state = RachState::Completed;
                    info!("[TARGET DU] RACH completed in {:?}", rach.elapsed());
                }
            }
            (HandoverRole::Source, HandoverState::Execution) => {
                info!("[SOURCE DU] UE confirmed the handover command");
                ho.set_source_state(HandoverState::Completed);
            }
            (role, state) => {
                debug!(
                    "RRC Reconfiguration Complete outside handover (role {}, state {})",
                    role, state
                );
            }
        }
    }

    pub(crate) fn reset_handover(&self) {
        write(&self.handover).reset();
        lock(&self.rach).take();
    }

    /// F1 Setup Response: the cell is active and the UE can be brought up.
    pub(crate) fn on_f1_setup_response(self: &Arc<Self>) {
        self.set_state(DuState::Active);
        self.ensure_ue_link(false);
        if lock(&self.ue).is_some() {
            return;
        }
        let Some(channels) = self.take_ue_channels() else {
            debug!("UE channels already handed out, not creating a UE");
            return;
        };

        let shared = self.clone();
        let config = self.config.ue.clone();
        self.spawn(async move {
            info!("Initialising UE {}", config.supi());
            match Ue::create(channels.uplink, channels.downlink, &config).await {
                Some(ue) => {
                    info!("UE {} attached to cell {}", ue.supi(), shared.config.du.cell.pci);
                    *lock(&shared.ue) = Some(Arc::new(ue));
                }
                None => error!("UE failed to establish an RRC connection"),
            }
        });
    }
}

/// Simulated gNB-DU.
pub struct Du {
    pub(crate) shared: Arc<DuShared>,
}

impl Du {
    /// Creates a headless DU: F1AP sends are skipped.
    pub fn new(config: SimConfig) -> Result<Self> {
        Ok(Self {
            shared: Arc::new(DuShared::new(config, None)?),
        })
    }

    pub fn with_transport(config: SimConfig, transport: impl F1Transport + 'static) -> Result<Self> {
        let transport: Arc<dyn F1Transport> = Arc::new(transport);
        Ok(Self {
            shared: Arc::new(DuShared::new(config, Some(transport))?),
        })
    }

    /// Connects to the CU-CP, starts the F1AP read loop and sends F1 Setup
    /// Request.
    pub async fn start(&self) -> Result<()> {
        let actual = self.state();
        if actual != DuState::Inactive {
            return Err(DuError::InvalidState {
                expected: DuState::Inactive,
                actual,
            });
        }

        let du = &self.shared.config.du;
        info!(
            "Starting DU {} ({}), cell PCI {}, NR-CGI {:#011x}",
            du.id, du.name, du.cell.pci, self.shared.nr_cgi.nr_cell_id
        );

        match &self.shared.transport {
            Some(transport) => {
                let inbound = transport.connect().await?;
                self.shared
                    .spawn(crate::f1ap::run_reader(self.shared.clone(), inbound));
            }
            None => info!("No F1 transport configured, running headless"),
        }

        // The answer to the request may be handled before send returns
        self.shared.set_state(DuState::Active);
        let request = crate::f1ap::f1_setup_request(&self.shared);
        if let Err(e) = self.shared.send_f1ap(request).await {
            error!("Failed to send F1 Setup Request: {}", e);
            self.shutdown().await;
            self.shared.set_state(DuState::Inactive);
            return Err(e);
        }
        Ok(())
    }

    /// Stops the UE, closes the F1 link and aborts every DU task.
    pub async fn stop(&self) {
        info!("Stopping DU {}", self.shared.config.du.id);
        self.shutdown().await;
        self.shared.set_state(DuState::Inactive);
    }

    async fn shutdown(&self) {
        if let Some(ue) = lock(&self.shared.ue).take() {
            ue.shutdown();
        }
        self.shared.abort_tasks();
        if let Some(transport) = &self.shared.transport {
            transport.close().await;
        }
        lock(&self.shared.link).take();
    }

    pub fn state(&self) -> DuState {
        self.shared.state()
    }

    /// Consistent copy of the handover context.
    pub fn handover(&self) -> HandoverContext {
        read(&self.shared.handover).clone()
    }

    pub fn reset_handover(&self) {
        self.shared.reset_handover();
    }

    /// Arms this DU as handover target in `state`.
    pub fn set_target_handover_state(&self, state: HandoverState) {
        write(&self.shared.handover).set_target_state(state);
    }

    /// Opens the RACH window on the target: EXECUTION and a running
    /// supervision timer. Does not wait for the UE.
    pub fn start_rach_monitoring(&self) -> Result<()> {
        self.shared.start_rach_monitoring()
    }

    /// Acts as if the dedicated preamble was detected and answers with a
    /// RAR on the UE downlink.
    pub async fn simulate_rach_reception(&self) -> Result<()> {
        self.shared.simulate_rach_reception().await
    }

    pub fn rach(&self) -> Option<RachContext> {
        lock(&self.shared.rach).clone()
    }

    /// The UE brought up after F1 Setup, once its RRC connection exists.
    pub fn ue(&self) -> Option<Arc<Ue>> {
        lock(&self.shared.ue).clone()
    }

    /// Hands out the UE ends of the RRC channels, creating them if needed.
    /// Returns `None` once they were taken (by this call or by the UE
    /// created after F1 Setup).
    pub fn take_ue_channels(&self) -> Option<UeChannels> {
        self.shared.ensure_ue_link(false);
        self.shared.take_ue_channels()
    }

    pub fn ue_f1ap_ids(&self) -> UeF1apIds {
        self.shared.ids()
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    /// Dispatches one inbound F1AP PDU as the read loop would.
    pub async fn handle_f1ap_pdu(&self, pdu: &[u8]) {
        self.shared.handle_f1ap_pdu(pdu).await;
    }
}

impl Drop for Du {
    fn drop(&mut self) {
        if let Some(ue) = lock(&self.shared.ue).take() {
            ue.shutdown();
        }
        self.shared.abort_tasks();
    }
}

impl fmt::Debug for Du {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Du")
            .field("id", &self.shared.config.du.id)
            .field("state", &self.state())
            .field("handover", &self.handover())
            .finish()
    }
}
