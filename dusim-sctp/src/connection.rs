//! Background task owning an [`SctpAssociation`].
//!
//! Outbound PDUs arrive on a command channel; inbound user messages are
//! forwarded to the receiver returned by [`SctpConnection::connect`].

use bytes::Bytes;
use std::{net::SocketAddr, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::association::{ReceivedMessage, Result, SctpAssociation, SctpConfig, SctpError};

const CHANNEL_CAPACITY: usize = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

enum Command {
    Send {
        stream_id: u16,
        data: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    Close,
}

/// Handle to an association running on its own task
pub struct SctpConnection {
    commands: mpsc::Sender<Command>,
    task: Option<JoinHandle<()>>,
    remote_addr: SocketAddr,
}

impl SctpConnection {
    /// Establishes the association and starts its I/O task.
    pub async fn connect(
        remote_addr: SocketAddr,
        config: SctpConfig,
    ) -> Result<(Self, mpsc::Receiver<ReceivedMessage>)> {
        let association = SctpAssociation::connect(remote_addr, config).await?;
        Ok(Self::spawn(association, remote_addr))
    }

    /// Like [`connect`](Self::connect) but binds to `local_addr` first.
    pub async fn connect_with_local(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        config: SctpConfig,
    ) -> Result<(Self, mpsc::Receiver<ReceivedMessage>)> {
        let association =
            SctpAssociation::connect_with_local(local_addr, remote_addr, config).await?;
        Ok(Self::spawn(association, remote_addr))
    }

    fn spawn(
        association: SctpAssociation,
        remote_addr: SocketAddr,
    ) -> (Self, mpsc::Receiver<ReceivedMessage>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (msg_tx, msg_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let task = tokio::spawn(run(association, cmd_rx, msg_tx));

        (
            Self {
                commands: cmd_tx,
                task: Some(task),
                remote_addr,
            },
            msg_rx,
        )
    }

    /// Sends one PDU on stream 0.
    pub async fn send(&self, data: Bytes) -> Result<()> {
        self.send_on_stream(0, data).await
    }

    pub async fn send_on_stream(&self, stream_id: u16, data: Bytes) -> Result<()> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Send {
                stream_id,
                data,
                reply,
            })
            .await
            .map_err(|_| SctpError::AssociationClosed)?;
        result.await.map_err(|_| SctpError::AssociationClosed)?
    }

    /// Shuts the association down and waits for the I/O task to finish.
    pub async fn close(mut self) {
        let _ = self.commands.send(Command::Close).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("SCTP task ended abnormally: {}", e);
            }
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// True while the I/O task is alive.
    pub fn is_open(&self) -> bool {
        !self.commands.is_closed()
    }
}

async fn run(
    mut association: SctpAssociation,
    mut commands: mpsc::Receiver<Command>,
    inbound: mpsc::Sender<ReceivedMessage>,
) {
    info!("SCTP I/O task started for {}", association.remote_addr());

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Send { stream_id, data, reply }) => {
                    let result = association.send(stream_id, &data).await;
                    let _ = reply.send(result);
                }
                Some(Command::Close) | None => {
                    if let Err(e) = association.shutdown().await {
                        warn!("SCTP shutdown failed: {}", e);
                    }
                    break;
                }
            },
            polled = association.poll(POLL_INTERVAL) => match polled {
                Ok(Some(msg)) => {
                    debug!("Forwarding {} bytes from stream {}", msg.data.len(), msg.stream_id);
                    if inbound.send(msg).await.is_err() {
                        debug!("Inbound receiver dropped, closing association");
                        let _ = association.shutdown().await;
                        break;
                    }
                }
                Ok(None) => {}
                Err(SctpError::AssociationClosed) => {
                    info!("SCTP association closed by peer");
                    break;
                }
                Err(e) => {
                    error!("SCTP receive error: {}", e);
                    break;
                }
            },
        }
    }

    info!("SCTP I/O task stopped");
}
