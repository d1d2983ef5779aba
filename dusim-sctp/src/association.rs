//! SCTP association management for F1AP transport.

use bytes::Bytes;
use sctp_proto::{
    Association, AssociationHandle, ClientConfig, DatagramEvent, Endpoint, EndpointConfig, Event,
    Payload, PayloadProtocolIdentifier, TransportConfig, Transmit,
};
use std::{
    collections::VecDeque,
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{net::UdpSocket, time::timeout};
use tracing::{debug, info, trace, warn};

/// F1AP Payload Protocol Identifier (TS 38.472)
pub const F1AP_PPID: u32 = 62;
/// Default number of SCTP streams
pub const DEFAULT_NUM_STREAMS: u16 = 2;
/// Default maximum message size (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65536;
/// Default receive buffer size (256KB)
pub const DEFAULT_RECEIVE_BUFFER_SIZE: u32 = 262144;

/// SCTP association errors
#[derive(Debug, Error)]
pub enum SctpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Association closed")]
    AssociationClosed,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, SctpError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Closed,
    Connecting,
    Established,
    ShuttingDown,
}

/// Configuration for an SCTP association
#[derive(Debug, Clone)]
pub struct SctpConfig {
    pub max_outbound_streams: u16,
    pub max_inbound_streams: u16,
    pub max_message_size: u32,
    pub max_receive_buffer_size: u32,
    pub connect_timeout: Duration,
    pub rto_initial_ms: u64,
    pub rto_min_ms: u64,
    pub rto_max_ms: u64,
}

impl Default for SctpConfig {
    fn default() -> Self {
        Self {
            max_outbound_streams: DEFAULT_NUM_STREAMS,
            max_inbound_streams: DEFAULT_NUM_STREAMS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(5),
            rto_initial_ms: 3000,
            rto_min_ms: 1000,
            rto_max_ms: 60000,
        }
    }
}

/// A user message delivered by the association
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub stream_id: u16,
    pub data: Bytes,
    pub ppid: u32,
}

/// Client side SCTP association over a UDP socket
pub struct SctpAssociation {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    endpoint: Endpoint,
    handle: AssociationHandle,
    association: Association,
    state: AssociationState,
    pending_transmits: VecDeque<Transmit>,
    inbound: VecDeque<ReceivedMessage>,
    /// Streams opened locally or accepted from the peer
    streams: Vec<u16>,
    config: SctpConfig,
}

impl SctpAssociation {
    /// Connects to `remote_addr` from an ephemeral local port.
    pub async fn connect(remote_addr: SocketAddr, config: SctpConfig) -> Result<Self> {
        let local_addr = if remote_addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        Self::connect_with_local(local_addr, remote_addr, config).await
    }

    pub async fn connect_with_local(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        config: SctpConfig,
    ) -> Result<Self> {
        info!("Connecting to SCTP endpoint at {}", remote_addr);

        let socket = UdpSocket::bind(local_addr).await?;
        let actual_local = socket.local_addr()?;
        debug!("Bound to local address: {}", actual_local);

        let mut endpoint = Endpoint::new(Arc::new(EndpointConfig::new()), None);

        let transport_config = TransportConfig::default()
            .with_max_num_outbound_streams(config.max_outbound_streams)
            .with_max_num_inbound_streams(config.max_inbound_streams)
            .with_max_message_size(config.max_message_size)
            .with_max_receive_buffer_size(config.max_receive_buffer_size)
            .with_rto_initial_ms(config.rto_initial_ms)
            .with_rto_min_ms(config.rto_min_ms)
            .with_rto_max_ms(config.rto_max_ms);

        let mut client_config = ClientConfig::new();
        client_config.transport = Arc::new(transport_config);

        let (handle, association) = endpoint
            .connect(client_config, remote_addr)
            .map_err(|e| SctpError::ConnectionFailed(e.to_string()))?;

        let mut assoc = Self {
            socket,
            remote_addr,
            local_addr: actual_local,
            endpoint,
            handle,
            association,
            state: AssociationState::Connecting,
            pending_transmits: VecDeque::new(),
            inbound: VecDeque::new(),
            streams: Vec::new(),
            config,
        };

        assoc.perform_handshake().await?;
        Ok(assoc)
    }

    /// Runs the INIT / INIT-ACK / COOKIE exchange until established or the
    /// connect timeout expires.
    async fn perform_handshake(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.connect_timeout;

        while self.state == AssociationState::Connecting {
            if Instant::now() > deadline {
                return Err(SctpError::Timeout("connection handshake timed out".into()));
            }

            self.flush_transmits().await?;
            self.poll_events();

            if !self.association.is_handshaking() {
                self.state = AssociationState::Established;
                info!("SCTP association established with {}", self.remote_addr);
                return Ok(());
            }

            match timeout(Duration::from_millis(100), self.handle_incoming()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error handling incoming packet: {}", e),
                Err(_) => trace!("Receive timeout, continuing handshake"),
            }
        }

        if self.state == AssociationState::Established {
            Ok(())
        } else {
            Err(SctpError::ConnectionFailed(format!(
                "association with {} lost during handshake",
                self.remote_addr
            )))
        }
    }

    async fn handle_incoming(&mut self) -> Result<()> {
        let mut buf = vec![0u8; self.config.max_receive_buffer_size as usize];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        trace!("Received {} bytes from {}", len, from);

        if let Some((handle, event)) =
            self.endpoint.handle(Instant::now(), from, None, None, Bytes::from(buf))
        {
            if handle == self.handle {
                match event {
                    DatagramEvent::AssociationEvent(assoc_event) => {
                        self.association.handle_event(assoc_event);
                    }
                    DatagramEvent::NewAssociation(_) => {
                        debug!("Ignoring new association event (client mode)");
                    }
                }
            }
        }
        Ok(())
    }

    fn poll_events(&mut self) {
        while let Some(event) = self.association.poll() {
            match event {
                Event::Connected => {
                    debug!("Association connected event");
                    self.state = AssociationState::Established;
                }
                Event::AssociationLost { reason } => {
                    warn!("Association lost: {}", reason);
                    self.state = AssociationState::Closed;
                }
                Event::Stream(stream_event) => trace!("Stream event: {:?}", stream_event),
                Event::DatagramReceived => trace!("Datagram received event"),
            }
        }

        if let Some(deadline) = self.association.poll_timeout() {
            let now = Instant::now();
            if now >= deadline {
                self.association.handle_timeout(now);
            }
        }

        self.drain_streams();

        while let Some(transmit) = self.association.poll_transmit(Instant::now()) {
            self.pending_transmits.push_back(transmit);
        }
        while let Some(transmit) = self.endpoint.poll_transmit() {
            self.pending_transmits.push_back(transmit);
        }
    }

    /// Moves every readable user message into the inbound queue.
    fn drain_streams(&mut self) {
        while let Some(stream) = self.association.accept_stream() {
            let stream_id = stream.stream_identifier();
            debug!("Accepted stream {}", stream_id);
            if !self.streams.contains(&stream_id) {
                self.streams.push(stream_id);
            }
        }

        for i in 0..self.streams.len() {
            let stream_id = self.streams[i];
            let Ok(mut stream) = self.association.stream(stream_id) else {
                continue;
            };
            while let Ok(Some(chunks)) = stream.read() {
                let len = chunks.len();
                let Some(ppid) = inbound_ppid(chunks.ppi) else {
                    warn!(
                        "Dropping {} bytes on stream {} with non-F1AP PPID {:?}",
                        len, stream_id, chunks.ppi
                    );
                    continue;
                };
                if len == 0 {
                    continue;
                }
                let mut buf = vec![0u8; len];
                if chunks.read(&mut buf).is_ok() {
                    debug!("Received {} bytes on stream {} with PPID {}", len, stream_id, ppid);
                    self.inbound.push_back(ReceivedMessage {
                        stream_id,
                        data: Bytes::from(buf),
                        ppid,
                    });
                }
            }
        }
    }

    async fn flush_transmits(&mut self) -> Result<()> {
        while let Some(transmit) = self.pending_transmits.pop_front() {
            match &transmit.payload {
                Payload::RawEncode(chunks) => {
                    for chunk in chunks {
                        self.socket.send_to(chunk, transmit.remote).await?;
                        trace!("Sent {} bytes to {}", chunk.len(), transmit.remote);
                    }
                }
                Payload::PartialDecode(_) => trace!("Skipping PartialDecode payload for transmit"),
            }
        }
        Ok(())
    }

    /// Sends `data` on `stream_id` with the F1AP PPID.
    pub async fn send(&mut self, stream_id: u16, data: &[u8]) -> Result<()> {
        self.send_with_ppid(stream_id, data, F1AP_PPID).await
    }

    pub async fn send_with_ppid(&mut self, stream_id: u16, data: &[u8], ppid: u32) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(SctpError::InvalidState("association not established".into()));
        }

        let ppi = PayloadProtocolIdentifier::from(ppid);
        let mut stream = if self.streams.contains(&stream_id) {
            self.association.stream(stream_id)
        } else {
            self.streams.push(stream_id);
            self.association.open_stream(stream_id, ppi)
        }
        .map_err(|e| SctpError::StreamError(e.to_string()))?;
        stream
            .write_with_ppi(data, ppi)
            .map_err(|e| SctpError::StreamError(e.to_string()))?;
        debug!("Queued {} bytes on stream {} with PPID {}", data.len(), stream_id, ppid);

        self.poll_events();
        self.flush_transmits().await
    }

    /// Waits up to `wait` for network activity and returns the next user
    /// message, if any.
    pub async fn poll(&mut self, wait: Duration) -> Result<Option<ReceivedMessage>> {
        if let Some(msg) = self.inbound.pop_front() {
            return Ok(Some(msg));
        }
        if self.state == AssociationState::Closed {
            return Err(SctpError::AssociationClosed);
        }

        match timeout(wait, self.handle_incoming()).await {
            Ok(result) => result?,
            Err(_) => trace!("No SCTP traffic within {:?}", wait),
        }
        self.poll_events();
        self.flush_transmits().await?;

        Ok(self.inbound.pop_front())
    }

    /// Graceful SHUTDOWN, bounded to five seconds.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == AssociationState::Closed {
            return Ok(());
        }

        info!("Initiating SCTP shutdown");
        self.state = AssociationState::ShuttingDown;

        let _ = self.association.shutdown();
        self.poll_events();
        self.flush_transmits().await?;

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && !self.association.is_closed() {
            let _ = timeout(Duration::from_millis(100), self.handle_incoming()).await;
            self.poll_events();
            self.flush_transmits().await?;
        }

        self.state = AssociationState::Closed;
        info!("SCTP shutdown complete");
        Ok(())
    }

    /// Aborts the association without the shutdown exchange.
    pub fn close(&mut self) {
        if self.state != AssociationState::Closed {
            let _ = self.association.close();
            self.state = AssociationState::Closed;
        }
    }

    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// PPID reported for an inbound chunk, or `None` when it cannot be F1AP.
///
/// sctp-proto only keeps the WebRTC identifiers (50..=57) and folds every
/// other value into `Unknown`, so F1AP (62) always arrives as `Unknown`.
fn inbound_ppid(ppi: PayloadProtocolIdentifier) -> Option<u32> {
    match ppi {
        PayloadProtocolIdentifier::Unknown => Some(F1AP_PPID),
        PayloadProtocolIdentifier::Dcep
        | PayloadProtocolIdentifier::String
        | PayloadProtocolIdentifier::Binary
        | PayloadProtocolIdentifier::StringEmpty
        | PayloadProtocolIdentifier::BinaryEmpty => None,
    }
}

impl Drop for SctpAssociation {
    fn drop(&mut self) {
        self.close();
    }
}
