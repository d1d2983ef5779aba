//! F1-C transport
//!
//! The DU only needs three things from the link to the CU-CP: connect and
//! get a stream of inbound PDUs, send a PDU, close. [`SctpTransport`] is the
//! real link; [`ChannelTransport`] is an in-memory pair used by tests and by
//! anything embedding a CU in the same process.

use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use dusim_f1ap::F1AP_PPID;
use dusim_sctp::{SctpConfig, SctpConnection};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::TransportError;

/// Capacity of the inbound PDU channels.
pub const TRANSPORT_CHANNEL_CAPACITY: usize = 100;

type Result<T> = std::result::Result<T, TransportError>;

/// Link between the DU and a CU-CP carrying encoded F1AP PDUs.
#[async_trait]
pub trait F1Transport: Send + Sync {
    /// Opens the link and returns the inbound PDU stream.
    async fn connect(&self) -> Result<mpsc::Receiver<Bytes>>;

    /// Sends one PDU. Fails with [`TransportError::NotConnected`] before
    /// [`connect`](Self::connect).
    async fn send(&self, pdu: Bytes) -> Result<()>;

    async fn close(&self);
}

/// F1-C over SCTP (PPID 62).
pub struct SctpTransport {
    remote: String,
    local: Option<SocketAddr>,
    config: SctpConfig,
    connection: tokio::sync::Mutex<Option<SctpConnection>>,
}

impl SctpTransport {
    pub fn new(address: &str, port: u16) -> Self {
        Self::with_config(address, port, SctpConfig::default())
    }

    pub fn with_config(address: &str, port: u16, config: SctpConfig) -> Self {
        Self {
            remote: format!("{address}:{port}"),
            local: None,
            config,
            connection: tokio::sync::Mutex::new(None),
        }
    }

    /// Binds the association to `local` instead of an ephemeral port.
    pub fn bind(mut self, local: SocketAddr) -> Self {
        self.local = Some(local);
        self
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host(&self.remote)
            .await
            .map_err(|_| TransportError::Resolve(self.remote.clone()))?
            .next()
            .ok_or_else(|| TransportError::Resolve(self.remote.clone()))
    }
}

#[async_trait]
impl F1Transport for SctpTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<Bytes>> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        let remote = self.resolve().await?;
        let (conn, mut inbound) = match self.local {
            Some(local) => {
                SctpConnection::connect_with_local(local, remote, self.config.clone()).await?
            }
            None => SctpConnection::connect(remote, self.config.clone()).await?,
        };
        info!("SCTP connection established to CU-CP at {}", remote);
        *connection = Some(conn);

        let (tx, rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(msg) = inbound.recv().await {
                if msg.ppid != F1AP_PPID {
                    error!("Wrong PPID: {}", msg.ppid);
                    continue;
                }
                if tx.send(msg.data).await.is_err() {
                    break;
                }
            }
            debug!("SCTP inbound forwarder stopped");
        });
        Ok(rx)
    }

    async fn send(&self, pdu: Bytes) -> Result<()> {
        let connection = self.connection.lock().await;
        let conn = connection.as_ref().ok_or(TransportError::NotConnected)?;
        conn.send(pdu).await?;
        Ok(())
    }

    async fn close(&self) {
        let conn = self.connection.lock().await.take();
        if let Some(conn) = conn {
            info!("Closing SCTP connection to {}", conn.remote_addr());
            conn.close().await;
        }
    }
}

/// Far end of a [`ChannelTransport`], held by whoever plays the CU-CP.
#[derive(Debug)]
pub struct CuEndpoint {
    /// PDUs sent by the DU
    pub from_du: mpsc::Receiver<Bytes>,
    /// PDUs delivered to the DU's read loop
    pub to_du: mpsc::Sender<Bytes>,
}

/// In-memory transport.
pub struct ChannelTransport {
    to_cu: Mutex<Option<mpsc::Sender<Bytes>>>,
    pending: mpsc::Sender<Bytes>,
    inbound: Mutex<Option<mpsc::Receiver<Bytes>>>,
}

impl ChannelTransport {
    /// Creates a transport and the endpoint the CU side uses.
    pub fn pair() -> (Self, CuEndpoint) {
        let (to_cu_tx, to_cu_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);
        let (to_du_tx, to_du_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);
        let transport = Self {
            to_cu: Mutex::new(None),
            pending: to_cu_tx,
            inbound: Mutex::new(Some(to_du_rx)),
        };
        let endpoint = CuEndpoint {
            from_du: to_cu_rx,
            to_du: to_du_tx,
        };
        (transport, endpoint)
    }
}

#[async_trait]
impl F1Transport for ChannelTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<Bytes>> {
        let inbound = self
            .inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(TransportError::AlreadyConnected)?;
        *self.to_cu.lock().unwrap_or_else(|e| e.into_inner()) = Some(self.pending.clone());
        Ok(inbound)
    }

    async fn send(&self, pdu: Bytes) -> Result<()> {
        let tx = self
            .to_cu
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(TransportError::NotConnected)?;
        tx.send(pdu).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        self.to_cu.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}
