//! UE handle and its tasks
//!
//! [`Ue::create`] performs RRC connection establishment synchronously and
//! runs three tasks:
//!
//! - the uplink sender, which forwards queued PDUs to the DU in order;
//! - the downlink listener, which decodes every PDU from the DU and runs it
//!   through RRC, 5GMM and 5GSM;
//! - the event task, which reacts to [`UeEvent`]s (registration complete
//!   opens the default PDU session).
//!
//! All uplink traffic, from triggers and from the listener, is encoded and
//! queued under one lock so NAS COUNT order matches send order. The lock is
//! never held while waiting on a channel.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use dusim_common::{log_rrc_message, Direction, UeConfig};
use dusim_rrc::{
    DlCcchMessage, EstablishmentCause, RrcSetup, RrcSetupComplete, RrcSetupRequest,
    UlCcchMessage, UlDcchMessage, UE_IDENTITY_MASK,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context::{RegistrationState, UeContext};
use crate::error::{Result, UeError};
use crate::nas::sm::{PduSession, PduSessionTable, DEFAULT_DNN};
use crate::nas::Outbox;
use crate::rrc::measurement::simulated_report;
use crate::rrc::{RrcContext, RrcState};

/// Capacity of the UE event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 100;
/// PLMN index reported in RRC Setup Complete
const SELECTED_PLMN_IDENTITY: u8 = 1;

/// Events raised by protocol handlers for the UE event task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeEvent {
    RegistrationCompleted,
}

/// Locks a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared between the UE handle and its tasks.
pub(crate) struct UeShared {
    pub(crate) context: Mutex<UeContext>,
    pub(crate) sessions: Mutex<PduSessionTable>,
    pub(crate) rrc: Mutex<RrcContext>,
    /// Ordered queue drained by the uplink sender task
    uplink: mpsc::UnboundedSender<Bytes>,
    events: mpsc::Sender<UeEvent>,
    registration: watch::Sender<RegistrationState>,
    tx_lock: Mutex<()>,
}

impl UeShared {
    fn enqueue(&self, pdu: Bytes) -> Result<()> {
        self.uplink.send(pdu).map_err(|_| UeError::ChannelClosed)
    }

    /// Runs `build` and queues its uplink PDUs under the uplink lock, then
    /// publishes the registration state and raises the events.
    async fn transmit<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(&Self, &mut Outbox) -> Result<()>,
    {
        let events = {
            let _order = lock(&self.tx_lock);
            let mut out = Outbox::default();
            build(self, &mut out)?;
            for pdu in out.uplink {
                self.enqueue(pdu)?;
            }
            out.events
        };

        let state = lock(&self.context).registration_state();
        self.registration.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        for event in events {
            if self.events.send(event).await.is_err() {
                debug!("UE event task gone, dropping {:?}", event);
            }
        }
        Ok(())
    }

    async fn trigger_custom_session(&self, dnn: &str) -> Result<()> {
        self.transmit(|shared, out| {
            let uplink = lock(&shared.sessions).establish(dnn)?;
            lock(&shared.context).send_sm(uplink, out)
        })
        .await
    }
}

/// A simulated UE attached to one DU.
pub struct Ue {
    shared: Arc<UeShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Ue {
    /// Establishes the RRC connection and starts registration.
    ///
    /// Sends RRC Setup Request, waits for RRC Setup, answers with RRC Setup
    /// Complete carrying the Registration Request and spawns the UE tasks.
    /// Returns `None` if the downlink closes first or the setup fails.
    pub async fn create(
        uplink_tx: mpsc::Sender<Bytes>,
        downlink_rx: mpsc::Receiver<Bytes>,
        config: &UeConfig,
    ) -> Option<Ue> {
        match Self::try_create(uplink_tx, downlink_rx, config).await {
            Ok(ue) => Some(ue),
            Err(e) => {
                error!("UE creation failed: {}", e);
                None
            }
        }
    }

    /// Like [`Ue::create`], reporting why creation failed.
    pub async fn try_create(
        uplink_tx: mpsc::Sender<Bytes>,
        mut downlink_rx: mpsc::Receiver<Bytes>,
        config: &UeConfig,
    ) -> Result<Ue> {
        let context = UeContext::new(config)?;
        info!("Creating UE {}", context.supi);

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (registration, _) = watch::channel(RegistrationState::Deregistered);
        let shared = Arc::new(UeShared {
            context: Mutex::new(context),
            sessions: Mutex::new(PduSessionTable::new()),
            rrc: Mutex::new(RrcContext::default()),
            uplink: queue_tx,
            events: event_tx,
            registration,
            tx_lock: Mutex::new(()),
        });
        let uplink_task = tokio::spawn(run_uplink(queue_rx, uplink_tx));

        let request = UlCcchMessage::RrcSetupRequest(RrcSetupRequest {
            ue_identity: rand::random::<u64>() & UE_IDENTITY_MASK,
            establishment_cause: EstablishmentCause::MoSignalling,
        });
        let bytes = request.encode();
        log_rrc_message(Direction::Tx, request.name(), &bytes);
        if let Err(e) = shared.enqueue(bytes) {
            uplink_task.abort();
            return Err(e);
        }

        let connected = async {
            let setup = wait_for_rrc_setup(&mut downlink_rx).await?;
            lock(&shared.rrc).set_state(RrcState::Connected);
            shared
                .transmit(|shared, out| {
                    let nas = lock(&shared.context).build_registration_request()?;
                    out.rrc(UlDcchMessage::RrcSetupComplete(RrcSetupComplete {
                        transaction_id: setup.transaction_id,
                        selected_plmn_identity: SELECTED_PLMN_IDENTITY,
                        dedicated_nas_message: nas,
                    }))
                })
                .await
        };
        if let Err(e) = connected.await {
            uplink_task.abort();
            return Err(e);
        }

        let downlink_task = tokio::spawn(run_downlink(shared.clone(), downlink_rx));
        let event_task = tokio::spawn(run_events(shared.clone(), event_rx));

        Ok(Ue {
            shared,
            tasks: Mutex::new(vec![uplink_task, downlink_task, event_task]),
        })
    }

    /// Sends a fresh Registration Request in UL Information Transfer.
    pub async fn trigger_registration(&self) -> Result<()> {
        self.shared
            .transmit(|shared, out| {
                let nas = lock(&shared.context).build_registration_request()?;
                out.nas(nas)
            })
            .await
    }

    /// Establishes a PDU session to the "internet" DNN.
    pub async fn trigger_default_session(&self) -> Result<()> {
        self.shared.trigger_custom_session(DEFAULT_DNN).await
    }

    /// Establishes a PDU session to `dnn` on the lowest free session id.
    pub async fn trigger_custom_session(&self, dnn: &str) -> Result<()> {
        self.shared.trigger_custom_session(dnn).await
    }

    pub async fn trigger_release_session(&self, psi: u8) -> Result<()> {
        self.shared
            .transmit(|shared, out| {
                let uplink = lock(&shared.sessions).release(psi)?;
                lock(&shared.context).send_sm(uplink, out)
            })
            .await
    }

    /// Requests release of every ACTIVE session.
    pub async fn trigger_release_all(&self) -> Result<()> {
        self.shared
            .transmit(|shared, out| {
                let requests = lock(&shared.sessions).release_all();
                if requests.is_empty() {
                    info!("No active PDU session to release");
                }
                let mut context = lock(&shared.context);
                for uplink in requests {
                    context.send_sm(uplink, out)?;
                }
                Ok(())
            })
            .await
    }

    pub async fn trigger_modify_session(&self, psi: u8) -> Result<()> {
        self.shared
            .transmit(|shared, out| {
                let uplink = lock(&shared.sessions).modify(psi)?;
                lock(&shared.context).send_sm(uplink, out)
            })
            .await
    }

    /// Sends a MeasurementReport with the simulated serving and neighbor
    /// cell results.
    pub async fn trigger_measurement(&self) -> Result<()> {
        self.shared
            .transmit(|_, out| out.rrc(UlDcchMessage::MeasurementReport(simulated_report())))
            .await
    }

    /// Snapshot of PDU session `psi`.
    pub fn get_pdu_session(&self, psi: u8) -> Option<PduSession> {
        lock(&self.shared.sessions).get(psi).cloned()
    }

    pub fn pdu_session_count(&self) -> usize {
        lock(&self.shared.sessions).len()
    }

    pub fn registration_state(&self) -> RegistrationState {
        lock(&self.shared.context).registration_state()
    }

    /// Watch channel following the registration state.
    pub fn registration_watch(&self) -> watch::Receiver<RegistrationState> {
        self.shared.registration.subscribe()
    }

    pub fn supi(&self) -> String {
        lock(&self.shared.context).supi.clone()
    }

    pub fn is_security_active(&self) -> bool {
        lock(&self.shared.context).security.is_active()
    }

    pub fn rrc_context(&self) -> RrcContext {
        *lock(&self.shared.rrc)
    }

    /// Stops the UE tasks.
    pub fn shutdown(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

impl Drop for Ue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Ue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ue")
            .field("supi", &self.supi())
            .field("registration_state", &self.registration_state())
            .finish()
    }
}

async fn wait_for_rrc_setup(downlink_rx: &mut mpsc::Receiver<Bytes>) -> Result<RrcSetup> {
    loop {
        let pdu = downlink_rx.recv().await.ok_or(UeError::ChannelClosed)?;
        match DlCcchMessage::decode(&pdu) {
            Ok(DlCcchMessage::RrcSetup(setup)) => {
                log_rrc_message(Direction::Rx, "RRCSetup", &pdu);
                return Ok(setup);
            }
            Ok(DlCcchMessage::RrcReject { wait_time }) => {
                return Err(UeError::RrcRejected(wait_time));
            }
            Err(e) => warn!("Ignoring downlink PDU while waiting for RRC Setup: {}", e),
        }
    }
}

/// Forwards queued uplink PDUs to the DU, one at a time and in order.
async fn run_uplink(mut queue: mpsc::UnboundedReceiver<Bytes>, uplink: mpsc::Sender<Bytes>) {
    while let Some(pdu) = queue.recv().await {
        if uplink.send(pdu).await.is_err() {
            warn!("DU uplink closed");
            break;
        }
    }
    debug!("UE uplink sender stopped");
}

async fn run_downlink(shared: Arc<UeShared>, mut downlink_rx: mpsc::Receiver<Bytes>) {
    while let Some(pdu) = downlink_rx.recv().await {
        let result = shared
            .transmit(|shared, out| {
                shared.handle_downlink(&pdu, out);
                Ok(())
            })
            .await;
        if let Err(e) = result {
            warn!("UE uplink unavailable: {}", e);
            break;
        }
    }
    info!("UE downlink listener stopped");
}

async fn run_events(shared: Arc<UeShared>, mut event_rx: mpsc::Receiver<UeEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            UeEvent::RegistrationCompleted => {
                info!("Registration complete, establishing default PDU session");
                if let Err(e) = shared.trigger_custom_session(DEFAULT_DNN).await {
                    error!("Default PDU session failed: {}", e);
                }
            }
        }
    }
    debug!("UE event task stopped");
}
