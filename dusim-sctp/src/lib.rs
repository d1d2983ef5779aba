//! SCTP transport for the F1-C interface
//!
//! Wraps `sctp-proto`'s sans-IO association with tokio UDP sockets
//! (SCTP-over-UDP). [`SctpAssociation`] is the low level association;
//! [`SctpConnection`] moves it onto a background task so that sending and
//! receiving can happen from different tasks.
//!
//! # Example
//!
//! ```rust,no_run
//! use dusim_sctp::{SctpConfig, SctpConnection};
//!
//! async fn connect_to_cu() -> Result<(), Box<dyn std::error::Error>> {
//!     let cu_addr = "127.0.0.1:38472".parse()?;
//!     let (conn, mut inbound) = SctpConnection::connect(cu_addr, SctpConfig::default()).await?;
//!
//!     conn.send(bytes::Bytes::from_static(b"F1AP PDU")).await?;
//!     if let Some(msg) = inbound.recv().await {
//!         println!("received {} bytes on stream {}", msg.data.len(), msg.stream_id);
//!     }
//!     conn.close().await;
//!     Ok(())
//! }
//! ```

pub mod association;
pub mod connection;

pub use association::{
    AssociationState, ReceivedMessage, SctpAssociation, SctpConfig, SctpError,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_NUM_STREAMS, DEFAULT_RECEIVE_BUFFER_SIZE, F1AP_PPID,
};
pub use connection::SctpConnection;
